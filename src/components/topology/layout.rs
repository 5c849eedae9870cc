//! Layout modes and the engine that applies them to the visible subgraph.
//!
//! `Force` hands positions to a [`ForceSimulation`] that is stepped from
//! the frame loop. The other modes compute positions once and pin them.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::error::TopologyError;
use super::filter::VisibleSubgraph;
use super::simulation::{ForceParams, ForceSimulation};
use super::store::GraphStore;
use super::types::{Position, Viewport};

/// Number of hierarchical layers.
pub const LAYER_COUNT: u8 = 4;

/// How node positions are derived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
	/// Physics relaxation.
	#[default]
	Force,
	/// Rows by layer.
	Hierarchical,
	/// Evenly around a circle.
	Circular,
	/// Square-ish grid in store order.
	Grid,
}

impl LayoutMode {
	/// Every mode, in menu order.
	pub const ALL: [LayoutMode; 4] = [
		LayoutMode::Force,
		LayoutMode::Hierarchical,
		LayoutMode::Circular,
		LayoutMode::Grid,
	];

	/// Positions come from a closed form and are pinned.
	pub fn is_pinned(self) -> bool {
		!matches!(self, LayoutMode::Force)
	}

	/// Lowercase identifier.
	pub fn as_str(self) -> &'static str {
		match self {
			LayoutMode::Force => "force",
			LayoutMode::Hierarchical => "hierarchical",
			LayoutMode::Circular => "circular",
			LayoutMode::Grid => "grid",
		}
	}
}

impl fmt::Display for LayoutMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for LayoutMode {
	type Err = TopologyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		LayoutMode::ALL
			.into_iter()
			.find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
			.ok_or_else(|| TopologyError::UnknownLayout(s.to_string()))
	}
}

/// Layout tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
	/// Force constants.
	pub force: ForceParams,
	/// Outer margin of the grid layout.
	pub grid_margin: f64,
	/// Spread of random start positions around the center.
	pub start_jitter: f64,
	/// Seed for layer assignment, start jitter and simulation jiggle.
	pub seed: u64,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		Self {
			force: ForceParams::default(),
			grid_margin: 50.0,
			start_jitter: 50.0,
			seed: 0x5eed,
		}
	}
}

/// Applies the current [`LayoutMode`] to the visible subgraph.
pub struct LayoutEngine {
	mode: LayoutMode,
	config: LayoutConfig,
	viewport: Viewport,
	simulation: Option<ForceSimulation>,
	layers: HashMap<String, u8>,
	rng: SmallRng,
	generation: u64,
}

impl LayoutEngine {
	/// Creates an engine in force mode with no simulation yet.
	pub fn new(config: LayoutConfig, viewport: Viewport) -> Self {
		Self {
			mode: LayoutMode::Force,
			rng: SmallRng::seed_from_u64(config.seed),
			config,
			viewport,
			simulation: None,
			layers: HashMap::new(),
			generation: 0,
		}
	}

	/// Current mode.
	pub fn mode(&self) -> LayoutMode {
		self.mode
	}

	/// Current viewport.
	pub fn viewport(&self) -> Viewport {
		self.viewport
	}

	/// The live simulation, if in force mode.
	pub fn simulation(&self) -> Option<&ForceSimulation> {
		self.simulation.as_ref()
	}

	/// Times a simulation has been (re)built.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Switches mode and re-lays out. Leaving a pinned mode for `Force`
	/// releases every pin so physics can act.
	pub fn set_mode(&mut self, mode: LayoutMode, store: &mut GraphStore, visible: &VisibleSubgraph) {
		if mode == LayoutMode::Force && self.mode.is_pinned() {
			release_pins(store);
		}
		debug!("layout {} -> {}", self.mode, mode);
		self.mode = mode;
		self.apply(store, visible);
	}

	/// Re-lays out `visible`. In force mode the previous simulation is
	/// dropped and replaced; pinned modes re-pin every visible node.
	pub fn apply(&mut self, store: &mut GraphStore, visible: &VisibleSubgraph) {
		if self.simulation.take().is_some() {
			debug!("stopping force simulation #{}", self.generation);
		}
		if self.mode == LayoutMode::Force {
			self.start_simulation(store, visible);
			return;
		}
		for (i, slot) in self.slots(store, visible) {
			store.nodes_mut()[i].pin_at(slot);
		}
	}

	/// Follows a change of the visible set. Force mode restarts physics over
	/// the new members. Pinned modes keep every existing pin and only place
	/// visible nodes that have none yet.
	pub fn refilter(&mut self, store: &mut GraphStore, visible: &VisibleSubgraph) {
		if !self.mode.is_pinned() {
			self.apply(store, visible);
			return;
		}
		let slots = self.slots(store, visible);
		let mut placed = 0;
		for (i, slot) in slots {
			let node = &mut store.nodes_mut()[i];
			if node.pin.is_none() {
				node.pin_at(slot);
				placed += 1;
			}
		}
		if placed > 0 {
			debug!("placed {placed} newly visible nodes in {} layout", self.mode);
		}
	}

	/// Steps the simulation once. Returns whether positions changed.
	pub fn tick(&mut self, store: &mut GraphStore) -> bool {
		match self.simulation.as_mut() {
			Some(sim) => sim.tick(store.nodes_mut()),
			None => false,
		}
	}

	/// Restores simulation energy, e.g. after a drag.
	pub fn reheat(&mut self, alpha: f64) {
		if let Some(sim) = self.simulation.as_mut() {
			sim.reheat(alpha);
		}
	}

	/// Keeps the simulation warm while the user drags a node.
	pub fn set_alpha_target(&mut self, target: f64) {
		if let Some(sim) = self.simulation.as_mut() {
			sim.set_alpha_target(target);
		}
	}

	/// Adopts a new viewport. Closed-form modes are recomputed; force mode
	/// recenters and reheats.
	pub fn resize(&mut self, viewport: Viewport, store: &mut GraphStore, visible: &VisibleSubgraph) {
		self.viewport = viewport;
		match self.simulation.as_mut() {
			Some(sim) => {
				sim.set_center(viewport.center());
				sim.reheat(0.3);
			}
			None if self.mode.is_pinned() => self.apply(store, visible),
			None => {}
		}
	}

	/// Layer used by hierarchical mode, assigning a random one on first use.
	pub fn layer_of(&mut self, store: &GraphStore, index: usize) -> u8 {
		let node = &store.nodes()[index];
		if let Some(layer) = node.layer {
			return layer.min(LAYER_COUNT - 1);
		}
		let rng = &mut self.rng;
		*self
			.layers
			.entry(node.id.clone())
			.or_insert_with(|| rng.gen_range(0..LAYER_COUNT))
	}

	fn start_simulation(&mut self, store: &mut GraphStore, visible: &VisibleSubgraph) {
		let center = self.viewport.center();
		let jitter = self.config.start_jitter;
		for &i in &visible.nodes {
			let node = &mut store.nodes_mut()[i];
			if !node.position.is_finite() {
				node.position = Position::new(
					center.x + (self.rng.r#gen::<f64>() - 0.5) * jitter,
					center.y + (self.rng.r#gen::<f64>() - 0.5) * jitter,
				);
				node.velocity = Position::default();
			}
		}

		self.generation += 1;
		debug!(
			"starting force simulation #{} over {} nodes",
			self.generation,
			visible.nodes.len()
		);
		self.simulation = Some(ForceSimulation::new(
			store.nodes(),
			&visible.nodes,
			store.edges(),
			&visible.edges,
			self.config.force,
			center,
			self.config.seed.wrapping_add(self.generation),
		));
	}

	/// Closed-form positions for `visible` under the current pinned mode.
	fn slots(&mut self, store: &GraphStore, visible: &VisibleSubgraph) -> Vec<(usize, Position)> {
		match self.mode {
			LayoutMode::Force => Vec::new(),
			LayoutMode::Hierarchical => self.hierarchical(store, visible),
			LayoutMode::Circular => self.circular(visible),
			LayoutMode::Grid => self.grid(visible),
		}
	}

	fn hierarchical(&mut self, store: &GraphStore, visible: &VisibleSubgraph) -> Vec<(usize, Position)> {
		let (width, height) = (self.viewport.width, self.viewport.height);
		let mut rows: Vec<Vec<usize>> = vec![Vec::new(); LAYER_COUNT as usize];
		for &i in &visible.nodes {
			let layer = self.layer_of(store, i);
			rows[layer as usize].push(i);
		}
		let mut slots = Vec::with_capacity(visible.nodes.len());
		for (layer, row) in rows.iter().enumerate() {
			let y = layer as f64 * (height / 6.0) + height / 6.0;
			let step = width / (row.len() + 1) as f64;
			for (k, &i) in row.iter().enumerate() {
				slots.push((i, Position::new(step * (k + 1) as f64, y)));
			}
		}
		slots
	}

	fn circular(&self, visible: &VisibleSubgraph) -> Vec<(usize, Position)> {
		let center = self.viewport.center();
		let radius = 0.3 * self.viewport.width.min(self.viewport.height);
		let count = visible.nodes.len() as f64;
		visible
			.nodes
			.iter()
			.enumerate()
			.map(|(k, &i)| {
				let angle = k as f64 / count * 2.0 * PI;
				(i, Position::new(center.x + radius * angle.cos(), center.y + radius * angle.sin()))
			})
			.collect()
	}

	fn grid(&self, visible: &VisibleSubgraph) -> Vec<(usize, Position)> {
		let n = visible.nodes.len();
		if n == 0 {
			return Vec::new();
		}
		let cols = (n as f64).sqrt().ceil() as usize;
		let rows = n.div_ceil(cols);
		let margin = self.config.grid_margin;
		let cell_w = ((self.viewport.width - 2.0 * margin) / cols as f64).max(1.0);
		let cell_h = ((self.viewport.height - 2.0 * margin) / rows as f64).max(1.0);
		visible
			.nodes
			.iter()
			.enumerate()
			.map(|(k, &i)| {
				let (col, row) = (k % cols, k / cols);
				(
					i,
					Position::new(
						margin + col as f64 * cell_w + cell_w / 2.0,
						margin + row as f64 * cell_h + cell_h / 2.0,
					),
				)
			})
			.collect()
	}
}

/// Clears every pin so physics applies to all nodes again.
pub fn release_pins(store: &mut GraphStore) {
	for node in store.nodes_mut() {
		node.pin = None;
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use super::*;
	use crate::components::topology::filter::compute_visible_subgraph;
	use crate::components::topology::types::{Edge, Node};

	fn abc_store() -> GraphStore {
		let mut a = Node::new("A", "web");
		a.layer = Some(0);
		let mut b = Node::new("B", "web");
		b.layer = Some(0);
		let mut c = Node::new("C", "db");
		c.layer = Some(1);
		GraphStore::from_parts(
			vec![a, b, c],
			vec![Edge::new("A", "B"), Edge::new("B", "C")],
			&Viewport::default(),
		)
	}

	fn visible(store: &GraphStore, cats: &[&str]) -> VisibleSubgraph {
		let active: BTreeSet<String> = cats.iter().map(|s| s.to_string()).collect();
		compute_visible_subgraph(store.nodes(), store.edges(), &active)
	}

	fn engine() -> LayoutEngine {
		LayoutEngine::new(LayoutConfig::default(), Viewport::new(600.0, 600.0).unwrap())
	}

	#[test]
	fn parses_layout_names() {
		assert_eq!("Grid".parse::<LayoutMode>().unwrap(), LayoutMode::Grid);
		assert_eq!(" circular ".parse::<LayoutMode>().unwrap(), LayoutMode::Circular);
		assert!(matches!(
			"spiral".parse::<LayoutMode>(),
			Err(TopologyError::UnknownLayout(_))
		));
	}

	#[test]
	fn hierarchical_layers_stack_vertically() {
		let mut store = abc_store();
		let vis = visible(&store, &[]);
		let mut layout = engine();
		layout.set_mode(LayoutMode::Hierarchical, &mut store, &vis);

		let (a, b, c) = (
			store.position("A").unwrap(),
			store.position("B").unwrap(),
			store.position("C").unwrap(),
		);
		assert_eq!(a.y, b.y);
		assert!(c.y > a.y);
		assert_eq!(a.y, 100.0);
		assert_eq!(c.y, 200.0);
		assert_eq!((a.x, b.x, c.x), (200.0, 400.0, 300.0));
		assert!(store.node("C").unwrap().pin.is_some());
		assert!(layout.simulation().is_none());
	}

	#[test]
	fn random_layers_are_stable_across_relayouts() {
		let mut store = GraphStore::from_parts(
			(0..8).map(|i| Node::new(format!("n{i}"), "web")).collect(),
			vec![],
			&Viewport::default(),
		);
		let vis = visible(&store, &[]);
		let mut layout = engine();
		layout.set_mode(LayoutMode::Hierarchical, &mut store, &vis);
		let first: Vec<Position> = store.nodes().iter().map(|n| n.position).collect();
		layout.apply(&mut store, &vis);
		let second: Vec<Position> = store.nodes().iter().map(|n| n.position).collect();
		assert_eq!(first, second);
		for i in 0..8 {
			assert!(layout.layer_of(&store, i) < LAYER_COUNT);
		}
	}

	#[test]
	fn circular_places_nodes_on_radius() {
		let mut store = abc_store();
		let vis = visible(&store, &[]);
		let mut layout = engine();
		layout.set_mode(LayoutMode::Circular, &mut store, &vis);
		for node in store.nodes() {
			let d = ((node.position.x - 300.0).powi(2) + (node.position.y - 300.0).powi(2)).sqrt();
			assert!((d - 180.0).abs() < 1e-9);
		}
		assert_eq!(store.position("A"), Some(Position::new(480.0, 300.0)));
	}

	#[test]
	fn grid_uses_ceil_sqrt_columns() {
		let mut store = GraphStore::from_parts(
			(0..5).map(|i| Node::new(format!("n{i}"), "web")).collect(),
			vec![],
			&Viewport::default(),
		);
		let vis = visible(&store, &[]);
		let mut layout = engine();
		layout.set_mode(LayoutMode::Grid, &mut store, &vis);
		// 3 columns, 2 rows inside a 500x500 area
		let p = |id: &str| store.position(id).unwrap();
		assert_eq!(p("n0").y, p("n2").y);
		assert!(p("n3").y > p("n0").y);
		assert_eq!(p("n3").x, p("n0").x);
		assert!((p("n0").x - (50.0 + 500.0 / 6.0)).abs() < 1e-9);
	}

	#[test]
	fn switching_back_to_force_releases_pins() {
		let mut store = abc_store();
		let vis = visible(&store, &[]);
		let mut layout = engine();
		layout.set_mode(LayoutMode::Grid, &mut store, &vis);
		assert!(store.nodes().iter().all(|n| n.pin.is_some()));
		layout.set_mode(LayoutMode::Force, &mut store, &vis);
		assert!(store.nodes().iter().all(|n| n.pin.is_none()));
		assert!(layout.simulation().is_some_and(|s| !s.is_settled()));
		assert!(layout.tick(&mut store));
	}

	#[test]
	fn reapplying_replaces_simulation() {
		let mut store = abc_store();
		let mut layout = engine();
		let vis = visible(&store, &[]);
		layout.apply(&mut store, &vis);
		assert_eq!(layout.generation(), 1);
		assert_eq!(layout.simulation().unwrap().members().len(), 3);
		let vis = visible(&store, &["web"]);
		layout.apply(&mut store, &vis);
		assert_eq!(layout.generation(), 2);
		assert_eq!(layout.simulation().unwrap().members(), &[0, 1]);
	}

	#[test]
	fn force_start_fixes_non_finite_positions() {
		let mut store = abc_store();
		store.nodes_mut()[1].position = Position::new(f64::NAN, 3.0);
		let mut layout = engine();
		let vis = visible(&store, &[]);
		layout.apply(&mut store, &vis);
		let pos = store.nodes()[1].position;
		assert!(pos.is_finite());
		assert!((pos.x - 300.0).abs() <= 25.0 && (pos.y - 300.0).abs() <= 25.0);
	}

	#[test]
	fn pinned_node_survives_refilter_round_trip() {
		let mut store = abc_store();
		let mut layout = engine();
		let vis = visible(&store, &[]);
		layout.set_mode(LayoutMode::Hierarchical, &mut store, &vis);
		let before = store.position("C").unwrap();

		let vis = visible(&store, &["web"]);
		layout.refilter(&mut store, &vis);
		assert_eq!(store.position("C"), Some(before));
		let vis = visible(&store, &[]);
		layout.refilter(&mut store, &vis);
		assert_eq!(store.position("C"), Some(before));
	}

	#[test]
	fn still_visible_pins_hold_when_a_sibling_is_hidden() {
		let mut a = Node::new("A", "web");
		a.layer = Some(0);
		let mut b = Node::new("B", "web");
		b.layer = Some(0);
		let mut d = Node::new("D", "db");
		d.layer = Some(0);
		let mut store = GraphStore::from_parts(vec![a, b, d], vec![], &Viewport::default());
		let mut layout = engine();
		let vis = visible(&store, &[]);
		layout.set_mode(LayoutMode::Hierarchical, &mut store, &vis);
		assert_eq!(store.position("A"), Some(Position::new(150.0, 100.0)));

		let vis = visible(&store, &["web"]);
		layout.refilter(&mut store, &vis);
		assert_eq!(store.position("A"), Some(Position::new(150.0, 100.0)));
		assert_eq!(store.position("B"), Some(Position::new(300.0, 100.0)));
	}

	#[test]
	fn refilter_places_only_nodes_without_pins() {
		let mut store = abc_store();
		let mut layout = engine();
		let vis = visible(&store, &["web"]);
		layout.set_mode(LayoutMode::Grid, &mut store, &vis);
		let a = store.position("A").unwrap();
		assert!(store.node("C").unwrap().pin.is_none());

		let vis = visible(&store, &[]);
		layout.refilter(&mut store, &vis);
		assert_eq!(store.position("A"), Some(a));
		assert!(store.node("C").unwrap().pin.is_some());
		assert!(layout.simulation().is_none());
	}

	#[test]
	fn resize_recomputes_pinned_slots() {
		let mut store = abc_store();
		let mut layout = engine();
		let vis = visible(&store, &[]);
		layout.set_mode(LayoutMode::Circular, &mut store, &vis);
		layout.resize(Viewport::new(1000.0, 1000.0).unwrap(), &mut store, &vis);
		assert_eq!(store.position("A"), Some(Position::new(800.0, 500.0)));
	}

	#[test]
	fn dragged_pin_holds_under_force() {
		let mut store = abc_store();
		let mut layout = engine();
		let vis = visible(&store, &[]);
		layout.apply(&mut store, &vis);
		store.node_mut("A").unwrap().pin_at(Position::new(42.0, 24.0));
		for _ in 0..30 {
			layout.tick(&mut store);
		}
		let vis = visible(&store, &["db"]);
		layout.refilter(&mut store, &vis);
		let vis = visible(&store, &[]);
		layout.refilter(&mut store, &vis);
		for _ in 0..30 {
			layout.tick(&mut store);
		}
		assert_eq!(store.position("A"), Some(Position::new(42.0, 24.0)));
	}

	#[test]
	fn empty_subgraph_is_harmless() {
		let mut store = GraphStore::default();
		let vis = VisibleSubgraph::default();
		let mut layout = engine();
		for mode in LayoutMode::ALL {
			layout.set_mode(mode, &mut store, &vis);
		}
		assert!(!layout.tick(&mut store));
	}
}
