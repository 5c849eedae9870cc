use std::collections::HashMap;
use std::f64::consts::PI;

use log::{info, warn};

use super::types::{
	Criticality, Edge, EdgeStatus, GraphData, Node, NodeStatus, Position, TrafficLevel, Viewport,
};

/// Radius of the ring new nodes are seeded on.
pub const SEED_RADIUS: f64 = 100.0;

/// What ingestion had to repair or discard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
	/// Nodes dropped for an empty or duplicate id.
	pub dropped_nodes: usize,
	/// Links dropped for a missing endpoint.
	pub dropped_edges: usize,
	/// Nodes that received a synthetic start position.
	pub seeded_positions: usize,
}

/// Owns the canonical, unfiltered topology.
#[derive(Clone, Debug, Default)]
pub struct GraphStore {
	nodes: Vec<Node>,
	edges: Vec<Edge>,
	index: HashMap<String, usize>,
}

impl GraphStore {
	/// Validates raw records into a store.
	///
	/// Dangling links and nodes without a usable id are dropped and logged.
	/// Nodes without finite coordinates are spread evenly on a ring around
	/// the viewport center.
	pub fn ingest(data: &GraphData, viewport: &Viewport) -> (Self, IngestReport) {
		let mut store = Self::default();
		let mut report = IngestReport::default();

		for record in &data.nodes {
			let id = record.id.trim();
			if id.is_empty() {
				warn!("dropping node without id (name: {:?})", record.name);
				report.dropped_nodes += 1;
				continue;
			}
			if store.index.contains_key(id) {
				warn!("dropping duplicate node {id}");
				report.dropped_nodes += 1;
				continue;
			}

			let position = match (record.x, record.y) {
				(Some(x), Some(y)) => Position::new(x, y),
				_ => Position::new(f64::NAN, f64::NAN),
			};
			let pin = match (record.fx, record.fy) {
				(Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some(Position::new(x, y)),
				_ => None,
			};
			let node = Node {
				id: id.to_string(),
				name: record.name.clone().unwrap_or_else(|| id.to_string()),
				app_id: record.app_id.clone(),
				tier: record.tier.clone(),
				kind: record.kind.clone(),
				component_type: record.component_type.clone(),
				status: record.status.as_deref().map(NodeStatus::from).unwrap_or_default(),
				criticality: record
					.criticality
					.as_deref()
					.map(Criticality::from)
					.unwrap_or_default(),
				ip: record.ip.clone(),
				cpu: record.cpu.filter(|c| c.is_finite()),
				traffic: record.traffic.as_deref().map(TrafficLevel::from).unwrap_or_default(),
				color: record.color.clone(),
				layer: record.layer.map(|l| l.min(3)),
				position: pin.unwrap_or(position),
				velocity: Position::default(),
				pin,
			};
			store.insert_node(node);
		}

		report.seeded_positions = store.seed_positions(viewport.center());

		for (i, record) in data.links.iter().enumerate() {
			let (source, target) = (record.source.trim(), record.target.trim());
			if !(store.index.contains_key(source) && store.index.contains_key(target)) {
				warn!("dropping link {source} -> {target}: endpoint not found");
				report.dropped_edges += 1;
				continue;
			}
			store.edges.push(Edge {
				id: record
					.id
					.clone()
					.unwrap_or_else(|| format!("{source}->{target}#{i}")),
				source: source.to_string(),
				target: target.to_string(),
				protocol: record.protocol.clone().unwrap_or_else(|| "TCP".into()),
				port: record.port,
				bandwidth: record.bandwidth.filter(|b| b.is_finite()).unwrap_or(0.0),
				status: record.status.as_deref().map(EdgeStatus::from).unwrap_or_default(),
			});
		}

		info!(
			"ingested {} nodes, {} links ({} nodes dropped, {} links dropped)",
			store.nodes.len(),
			store.edges.len(),
			report.dropped_nodes,
			report.dropped_edges
		);
		(store, report)
	}

	/// Builds a store from already-typed records, with the same validation.
	pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>, viewport: &Viewport) -> Self {
		let mut store = Self::default();
		for node in nodes {
			if node.id.is_empty() || store.index.contains_key(&node.id) {
				warn!("dropping node with empty or duplicate id {:?}", node.id);
				continue;
			}
			store.insert_node(node);
		}
		store.seed_positions(viewport.center());
		for edge in edges {
			if store.index.contains_key(&edge.source) && store.index.contains_key(&edge.target) {
				store.edges.push(edge);
			} else {
				warn!("dropping link {}: endpoint not found", edge.id);
			}
		}
		store
	}

	fn insert_node(&mut self, node: Node) {
		self.index.insert(node.id.clone(), self.nodes.len());
		self.nodes.push(node);
	}

	/// Places every node lacking a finite position evenly on a ring around
	/// `center`. Returns how many were placed.
	pub fn seed_positions(&mut self, center: Position) -> usize {
		let missing: Vec<usize> = (0..self.nodes.len())
			.filter(|&i| !self.nodes[i].position.is_finite())
			.collect();
		let count = missing.len();
		for (k, &i) in missing.iter().enumerate() {
			let angle = (k as f64) * 2.0 * PI / count as f64;
			self.nodes[i].position = Position::new(
				center.x + SEED_RADIUS * angle.cos(),
				center.y + SEED_RADIUS * angle.sin(),
			);
		}
		count
	}

	/// All nodes in ingestion order.
	pub fn nodes(&self) -> &[Node] {
		&self.nodes
	}

	/// Mutable access for layout; only positional state should change.
	pub fn nodes_mut(&mut self) -> &mut [Node] {
		&mut self.nodes
	}

	/// All valid links in ingestion order.
	pub fn edges(&self) -> &[Edge] {
		&self.edges
	}

	/// Store index of a node id.
	pub fn index_of(&self, id: &str) -> Option<usize> {
		self.index.get(id).copied()
	}

	/// Node by id.
	pub fn node(&self, id: &str) -> Option<&Node> {
		self.index_of(id).map(|i| &self.nodes[i])
	}

	/// Mutable node by id.
	pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
		self.index_of(id).map(move |i| &mut self.nodes[i])
	}

	/// Current position of a node, when it is finite.
	pub fn position(&self, id: &str) -> Option<Position> {
		self.node(id).map(|n| n.position).filter(Position::is_finite)
	}

	#[allow(missing_docs)]
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	#[allow(missing_docs)]
	pub fn edge_count(&self) -> usize {
		self.edges.len()
	}

	#[allow(missing_docs)]
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}
