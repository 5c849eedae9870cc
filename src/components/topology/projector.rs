//! Pure mapping from the visible subgraph to drawable shapes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::filter::VisibleSubgraph;
use super::store::GraphStore;
use super::types::{EdgeStatus, Node, NodeStatus, Position, TrafficLevel, Viewport};

/// Radius of a node with no traffic bonus.
pub const BASE_NODE_RADIUS: f64 = 8.0;

/// Fill for inactive nodes.
pub const INACTIVE_COLOR: &str = "#ef4444";
/// Fill for nodes at or above [`CPU_CRITICAL`].
pub const CPU_CRITICAL_COLOR: &str = "#dc2626";
/// Fill for nodes at or above [`CPU_WARNING`].
pub const CPU_WARNING_COLOR: &str = "#f59e0b";
/// Fill when nothing else applies.
pub const DEFAULT_NODE_COLOR: &str = "#64748b";
/// Particle color for unknown protocols.
pub const DEFAULT_PARTICLE_COLOR: &str = "#e2e8f0";

/// CPU percentage at or above which a node is drawn in the red zone.
pub const CPU_CRITICAL: f64 = 90.0;
/// CPU percentage at or above which a node is drawn amber.
pub const CPU_WARNING: f64 = 75.0;

/// Category keyword to fill color; first substring match wins.
const CATEGORY_PALETTE: &[(&str, &str)] = &[
	("database", "#8b5cf6"),
	("db", "#8b5cf6"),
	("cache", "#f472b6"),
	("queue", "#fb923c"),
	("load", "#22d3ee"),
	("gateway", "#22d3ee"),
	("api", "#34d399"),
	("web", "#3b82f6"),
	("frontend", "#3b82f6"),
	("service", "#10b981"),
	("storage", "#a78bfa"),
	("monitor", "#facc15"),
];

const PROTOCOL_COLORS: &[(&str, &str)] = &[
	("HTTP", "#60a5fa"),
	("HTTPS", "#34d399"),
	("GRPC", "#a78bfa"),
	("TCP", "#fbbf24"),
	("UDP", "#f472b6"),
	("SQL", "#c084fc"),
	("AMQP", "#fb923c"),
	("REDIS", "#f87171"),
];

/// Independent overlay toggles. None of them affects layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
	/// Node names.
	pub show_labels: bool,
	/// Node addresses.
	pub show_ip_labels: bool,
	/// `protocol:port` at edge midpoints.
	pub show_edge_labels: bool,
	/// Traffic particles.
	pub show_traffic: bool,
}

impl Default for DisplayOptions {
	fn default() -> Self {
		Self {
			show_labels: true,
			show_ip_labels: false,
			show_edge_labels: false,
			show_traffic: true,
		}
	}
}

/// Names one of the [`DisplayOptions`] flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisplayOption {
	#[allow(missing_docs)]
	Labels,
	#[allow(missing_docs)]
	IpLabels,
	#[allow(missing_docs)]
	EdgeLabels,
	#[allow(missing_docs)]
	Traffic,
}

impl DisplayOptions {
	/// Reads one flag.
	pub fn get(&self, option: DisplayOption) -> bool {
		match option {
			DisplayOption::Labels => self.show_labels,
			DisplayOption::IpLabels => self.show_ip_labels,
			DisplayOption::EdgeLabels => self.show_edge_labels,
			DisplayOption::Traffic => self.show_traffic,
		}
	}

	/// Writes one flag.
	pub fn set(&mut self, option: DisplayOption, on: bool) {
		match option {
			DisplayOption::Labels => self.show_labels = on,
			DisplayOption::IpLabels => self.show_ip_labels = on,
			DisplayOption::EdgeLabels => self.show_edge_labels = on,
			DisplayOption::Traffic => self.show_traffic = on,
		}
	}
}

/// One link ready to stroke.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeShape {
	#[allow(missing_docs)]
	pub id: String,
	#[allow(missing_docs)]
	pub from: Position,
	#[allow(missing_docs)]
	pub to: Position,
	/// Stroke width from the bandwidth bucket.
	pub width: f64,
	/// Degraded links are dashed.
	pub dashed: bool,
	/// Both endpoints are highlighted.
	pub highlighted: bool,
	/// Present when edge labels are on.
	pub label: Option<String>,
}

/// One node ready to fill.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeShape {
	#[allow(missing_docs)]
	pub id: String,
	#[allow(missing_docs)]
	pub center: Position,
	#[allow(missing_docs)]
	pub radius: f64,
	#[allow(missing_docs)]
	pub fill: String,
	/// Part of the current selection.
	pub highlighted: bool,
	/// Present when labels are on.
	pub label: Option<String>,
	/// Present when IP labels are on and the node has an address.
	pub ip_label: Option<String>,
}

/// Everything the renderer needs for one frame, minus particles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
	#[allow(missing_docs)]
	pub edges: Vec<EdgeShape>,
	#[allow(missing_docs)]
	pub nodes: Vec<NodeShape>,
}

impl Scene {
	/// Nothing passed the filter; the renderer shows a notice instead.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

/// `>800 -> 3`, `>400 -> 2`, otherwise `1`.
pub fn edge_width(bandwidth: f64) -> f64 {
	if bandwidth > 800.0 {
		3.0
	} else if bandwidth > 400.0 {
		2.0
	} else {
		1.0
	}
}

/// Base radius plus the traffic bonus.
pub fn node_radius(node: &Node) -> f64 {
	BASE_NODE_RADIUS
		+ match node.traffic {
			TrafficLevel::High => 4.0,
			TrafficLevel::Medium => 2.0,
			TrafficLevel::Low => 0.0,
		}
}

/// Fill color cascade: inactive, CPU red zone, category keyword, explicit
/// color, default.
pub fn node_fill(node: &Node) -> &str {
	if node.status == NodeStatus::Inactive {
		return INACTIVE_COLOR;
	}
	match node.cpu {
		Some(cpu) if cpu >= CPU_CRITICAL => return CPU_CRITICAL_COLOR,
		Some(cpu) if cpu >= CPU_WARNING => return CPU_WARNING_COLOR,
		_ => {}
	}
	if let Some(category) = node.primary_category() {
		let category = category.to_ascii_lowercase();
		if let Some((_, color)) = CATEGORY_PALETTE.iter().find(|(k, _)| category.contains(k)) {
			return *color;
		}
	}
	node.color.as_deref().unwrap_or(DEFAULT_NODE_COLOR)
}

/// Particle color for a protocol; unknown protocols get the default.
pub fn protocol_color(protocol: &str) -> &'static str {
	PROTOCOL_COLORS
		.iter()
		.find(|(p, _)| p.eq_ignore_ascii_case(protocol.trim()))
		.map(|(_, c)| *c)
		.unwrap_or(DEFAULT_PARTICLE_COLOR)
}

/// Projects the visible subgraph. Identical inputs give identical scenes.
///
/// Non-finite positions are drawn at the viewport center.
pub fn project(
	store: &GraphStore,
	visible: &VisibleSubgraph,
	options: &DisplayOptions,
	viewport: &Viewport,
	highlighted: &BTreeSet<String>,
) -> Scene {
	let fallback = viewport.center();
	let position = |id: &str| store.position(id).unwrap_or(fallback);

	let edges = visible
		.edges
		.iter()
		.filter_map(|&e| store.edges().get(e))
		.map(|edge| EdgeShape {
			id: edge.id.clone(),
			from: position(&edge.source),
			to: position(&edge.target),
			width: edge_width(edge.bandwidth),
			dashed: edge.status == EdgeStatus::Degraded,
			highlighted: highlighted.contains(&edge.source) && highlighted.contains(&edge.target),
			label: options.show_edge_labels.then(|| edge.label()),
		})
		.collect();

	let nodes = visible
		.nodes
		.iter()
		.filter_map(|&i| store.nodes().get(i))
		.map(|node| NodeShape {
			id: node.id.clone(),
			center: node.position.or(fallback),
			radius: node_radius(node),
			fill: node_fill(node).to_string(),
			highlighted: highlighted.contains(&node.id),
			label: options.show_labels.then(|| node.name.clone()),
			ip_label: node.ip.clone().filter(|_| options.show_ip_labels),
		})
		.collect();

	Scene { edges, nodes }
}
