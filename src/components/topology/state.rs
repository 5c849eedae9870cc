use std::collections::{BTreeSet, HashSet};

use log::{debug, warn};

use super::animator::{AnimationHandle, AnimatorConfig, CycleTimer, ParticleFrame, TrafficAnimator};
use super::events::{EventBus, TopologyEvent};
use super::filter::{FilterState, VisibleSubgraph, compute_visible_subgraph};
use super::layout::{LayoutConfig, LayoutEngine, LayoutMode};
use super::projector::{DisplayOption, DisplayOptions, Scene, project};
use super::stats::GraphStats;
use super::store::{GraphStore, IngestReport};
use super::types::{GraphData, Position, Viewport};

/// Pointer distance, in graph units, that still hits a node.
pub const HIT_RADIUS: f64 = 12.0;

/// Alpha restored when a drag starts.
const DRAG_ALPHA: f64 = 0.3;

/// Pan offset and zoom factor applied before drawing.
#[derive(Clone, Debug)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self { x: 0.0, y: 0.0, k: 1.0 }
	}
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	pub node: Option<String>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start: Position,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

/// Hovered node, its neighbours and the fade progress.
#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<String>,
	pub neighbors: HashSet<String>,
	pub highlight_t: f64,
	pub prev_node: Option<String>,
	pub prev_neighbors: HashSet<String>,
}

/// The whole dashboard core: store, filter, layout, animator and the
/// view-side interaction state, wired together.
pub struct TopologyState {
	/// Canonical topology.
	pub store: GraphStore,
	/// Active categories.
	pub filter: FilterState,
	/// Position assignment.
	pub layout: LayoutEngine,
	/// Traffic particles.
	pub animator: TrafficAnimator,
	/// Overlay toggles.
	pub options: DisplayOptions,
	/// Outbound stats/selection notifications.
	pub events: EventBus,
	#[allow(missing_docs)]
	pub transform: ViewTransform,
	#[allow(missing_docs)]
	pub drag: DragState,
	#[allow(missing_docs)]
	pub pan: PanState,
	#[allow(missing_docs)]
	pub hover: HoverState,
	visible: VisibleSubgraph,
	selection: BTreeSet<String>,
	viewport: Viewport,
	last_stats: Option<GraphStats>,
}

impl TopologyState {
	/// Ingests `data` and lays it out in force mode with nothing filtered.
	pub fn new(
		data: &GraphData,
		viewport: Viewport,
		layout: LayoutConfig,
		animator: AnimatorConfig,
	) -> Self {
		let (store, _) = GraphStore::ingest(data, &viewport);
		let mut state = Self {
			store,
			filter: FilterState::default(),
			layout: LayoutEngine::new(layout, viewport),
			animator: TrafficAnimator::new(animator),
			options: DisplayOptions::default(),
			events: EventBus::default(),
			transform: ViewTransform::default(),
			drag: DragState::default(),
			pan: PanState::default(),
			hover: HoverState::default(),
			visible: VisibleSubgraph::default(),
			selection: BTreeSet::new(),
			viewport,
			last_stats: None,
		};
		state.refresh_visible();
		state
	}

	/// Swaps in a new topology, keeping filter, layout mode and options.
	pub fn replace_graph(&mut self, data: &GraphData) -> IngestReport {
		let (store, report) = GraphStore::ingest(data, &self.viewport);
		self.store = store;
		self.hover = HoverState::default();
		self.drag = DragState::default();
		self.refresh_visible();
		report
	}

	/// Nodes and links passing the current filter.
	pub fn visible(&self) -> &VisibleSubgraph {
		&self.visible
	}

	/// Selected node ids.
	pub fn selection(&self) -> &BTreeSet<String> {
		&self.selection
	}

	#[allow(missing_docs)]
	pub fn viewport(&self) -> Viewport {
		self.viewport
	}

	/// Stats of the visible subgraph.
	pub fn stats(&self) -> GraphStats {
		GraphStats::of(&self.visible)
	}

	/// Replaces the active categories and re-derives the visible subgraph.
	pub fn set_active_categories<I, S>(&mut self, categories: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut next = self.filter.clone();
		next.set(categories);
		if next == self.filter {
			return;
		}
		self.filter = next;
		self.refresh_visible();
	}

	/// Flips one category.
	pub fn toggle_category(&mut self, category: &str) {
		self.filter.toggle(category);
		self.refresh_visible();
	}

	/// Switches layout mode.
	pub fn set_layout_mode(&mut self, mode: LayoutMode) {
		if mode == self.layout.mode() {
			return;
		}
		self.layout.set_mode(mode, &mut self.store, &self.visible);
	}

	fn refresh_visible(&mut self) {
		self.visible =
			compute_visible_subgraph(self.store.nodes(), self.store.edges(), self.filter.active());
		debug!(
			"visible subgraph: {} nodes, {} links",
			self.visible.nodes.len(),
			self.visible.edges.len()
		);
		if self.visible.is_empty() && !self.store.is_empty() {
			warn!("no nodes match filter {:?}", self.filter.active());
		}
		self.layout.refilter(&mut self.store, &self.visible);

		let visible_ids = self.visible_ids();
		let kept: BTreeSet<String> = self
			.selection
			.iter()
			.filter(|id| visible_ids.contains(id.as_str()))
			.cloned()
			.collect();
		self.set_selection(kept);
		self.publish_stats();
	}

	fn visible_ids(&self) -> HashSet<&str> {
		self.visible
			.nodes
			.iter()
			.map(|&i| self.store.nodes()[i].id.as_str())
			.collect()
	}

	/// Emits [`TopologyEvent::StatsChanged`] when stats differ from the last
	/// emission.
	pub fn publish_stats(&mut self) {
		let stats = self.stats();
		if self.last_stats == Some(stats) {
			return;
		}
		self.last_stats = Some(stats);
		self.events.emit(&TopologyEvent::StatsChanged(stats));
	}

	/// Re-emits the current stats and selection, e.g. for a new subscriber.
	pub fn announce(&mut self) {
		self.last_stats = None;
		self.publish_stats();
		let selection = self.selection.iter().cloned().collect();
		self.events.emit(&TopologyEvent::SelectionChanged(selection));
	}

	fn set_selection(&mut self, selection: BTreeSet<String>) {
		if selection == self.selection {
			return;
		}
		self.selection = selection;
		let ids = self.selection.iter().cloned().collect();
		self.events.emit(&TopologyEvent::SelectionChanged(ids));
	}

	/// Selects a node and its visible neighbours; `None` clears.
	pub fn select(&mut self, id: Option<&str>) {
		let selection = match id {
			Some(id) if self.visible_ids().contains(id) => {
				let mut set: BTreeSet<String> = self.neighbors_of(id).into_iter().collect();
				set.insert(id.to_string());
				set
			}
			_ => BTreeSet::new(),
		};
		self.set_selection(selection);
	}

	fn neighbors_of(&self, id: &str) -> HashSet<String> {
		let mut neighbors = HashSet::new();
		for &e in &self.visible.edges {
			let edge = &self.store.edges()[e];
			if edge.source == id {
				neighbors.insert(edge.target.clone());
			} else if edge.target == id {
				neighbors.insert(edge.source.clone());
			}
		}
		neighbors
	}

	/// Sets one overlay flag. Traffic toggles start or stop the animator.
	pub fn set_display_option(&mut self, option: DisplayOption, on: bool, timer: &mut dyn CycleTimer) {
		self.options.set(option, on);
		if option == DisplayOption::Traffic {
			if on {
				self.animator.enable(timer);
			} else {
				self.animator.disable(timer);
			}
		}
	}

	/// Applies all four flags.
	pub fn set_display_options(&mut self, options: DisplayOptions, timer: &mut dyn CycleTimer) {
		for option in [
			DisplayOption::Labels,
			DisplayOption::IpLabels,
			DisplayOption::EdgeLabels,
			DisplayOption::Traffic,
		] {
			self.set_display_option(option, options.get(option), timer);
		}
	}

	/// Runs a traffic cycle against the current visible subgraph.
	pub fn run_traffic_cycle(
		&mut self,
		handle: AnimationHandle,
		timer: &mut dyn CycleTimer,
		now: f64,
	) -> usize {
		self.animator.run_cycle(
			handle,
			timer,
			now,
			&self.store,
			&self.visible,
			self.options.show_traffic,
		)
	}

	/// Drawable shapes for the current frame.
	pub fn scene(&self) -> Scene {
		project(
			&self.store,
			&self.visible,
			&self.options,
			&self.viewport,
			&self.highlighted(),
		)
	}

	/// Particle positions for the current frame.
	pub fn particle_frames(&mut self, now: f64) -> Vec<ParticleFrame> {
		self.animator.advance(now);
		self.animator.frames(now, &self.store)
	}

	fn highlighted(&self) -> BTreeSet<String> {
		self.visible
			.nodes
			.iter()
			.map(|&i| &self.store.nodes()[i].id)
			.filter(|id| self.is_highlighted(id))
			.cloned()
			.collect()
	}

	#[allow(missing_docs)]
	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	/// Topmost visible node under a screen point.
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<String> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let mut found = None;
		for &i in &self.visible.nodes {
			let node = &self.store.nodes()[i];
			let (dx, dy) = (node.position.x - gx, node.position.y - gy);
			// HIT_RADIUS is in world-space, scales with zoom like nodes
			if (dx * dx + dy * dy).sqrt() < HIT_RADIUS {
				found = Some(node.id.clone());
			}
		}
		found
	}

	pub fn set_hover(&mut self, node: Option<String>) {
		if self.hover.node == node {
			return;
		}
		let was_hovering = self.hover.node.is_some();

		// Save previous state for fade-out
		if was_hovering && node.is_none() {
			self.hover.prev_node = self.hover.node.take();
			self.hover.prev_neighbors = std::mem::take(&mut self.hover.neighbors);
		} else {
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}

		self.hover.neighbors = node.as_deref().map(|id| self.neighbors_of(id)).unwrap_or_default();
		self.hover.node = node;
	}

	pub fn is_highlighted(&self, id: &str) -> bool {
		self.selection.contains(id)
			|| self.hover.node.as_deref() == Some(id)
			|| self.hover.neighbors.contains(id)
			|| self.hover.prev_node.as_deref() == Some(id)
			|| self.hover.prev_neighbors.contains(id)
	}

	pub fn is_hovered(&self, id: &str) -> bool {
		self.hover.node.as_deref() == Some(id) || self.hover.prev_node.as_deref() == Some(id)
	}

	pub fn has_active_highlight(&self) -> bool {
		!self.selection.is_empty() || self.hover.node.is_some() || self.hover.prev_node.is_some()
	}

	/// How strongly non-highlighted elements are dimmed, `0..=1`. Follows the
	/// hover fade; a selection holds it at 0.6 or above.
	pub fn highlight_level(&self) -> f64 {
		let t = self.hover.highlight_t.clamp(0.0, 1.0);
		if self.selection.is_empty() { t } else { t.max(0.6) }
	}

	/// Steps physics and the hover fade. Returns whether positions moved.
	pub fn tick(&mut self, dt: f64) -> bool {
		let moved = self.layout.tick(&mut self.store);

		let (target, speed) = if self.hover.node.is_some() {
			(1.0, 1.8)
		} else {
			(0.0, 1.26)
		};
		self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt;
		if self.hover.node.is_none() && self.hover.highlight_t < 0.01 {
			self.hover.highlight_t = 0.0;
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}
		moved
	}

	/// Press: grab a node (selecting it) or start panning the background.
	pub fn pointer_down(&mut self, sx: f64, sy: f64) {
		match self.node_at_position(sx, sy) {
			Some(id) => {
				self.select(Some(&id));
				let start = self.store.node(&id).map(|n| n.position).unwrap_or_default();
				self.drag = DragState {
					active: true,
					node: Some(id),
					start_x: sx,
					start_y: sy,
					node_start: start,
				};
				self.layout.set_alpha_target(DRAG_ALPHA);
				self.layout.reheat(DRAG_ALPHA);
			}
			None => {
				self.select(None);
				self.pan = PanState {
					active: true,
					start_x: sx,
					start_y: sy,
					transform_start_x: self.transform.x,
					transform_start_y: self.transform.y,
				};
			}
		}
	}

	/// Move: drag the grabbed node, pan, or update hover.
	pub fn pointer_move(&mut self, sx: f64, sy: f64) {
		if !self.drag.active {
			let hovered = self.node_at_position(sx, sy);
			self.set_hover(hovered);
		}

		if self.drag.active {
			let (dx, dy) = (
				(sx - self.drag.start_x) / self.transform.k,
				(sy - self.drag.start_y) / self.transform.k,
			);
			let target = Position::new(self.drag.node_start.x + dx, self.drag.node_start.y + dy);
			if let Some(node) = self.drag.node.as_deref().and_then(|id| self.store.node_mut(id)) {
				node.pin_at(target);
			}
		} else if self.pan.active {
			self.transform.x = self.pan.transform_start_x + (sx - self.pan.start_x);
			self.transform.y = self.pan.transform_start_y + (sy - self.pan.start_y);
		}
	}

	/// Release: a dragged node stays pinned where it was dropped.
	pub fn pointer_up(&mut self) {
		if self.drag.active {
			self.layout.set_alpha_target(0.0);
		}
		self.drag = DragState::default();
		self.pan.active = false;
	}

	/// Pointer left the canvas.
	pub fn pointer_leave(&mut self) {
		self.pointer_up();
		self.set_hover(None);
	}

	/// Zooms around a screen point, clamped to `0.1..=10`.
	pub fn zoom_at(&mut self, sx: f64, sy: f64, delta_y: f64) {
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		let new_k = (self.transform.k * factor).clamp(0.1, 10.0);
		let ratio = new_k / self.transform.k;
		self.transform.x = sx - (sx - self.transform.x) * ratio;
		self.transform.y = sy - (sy - self.transform.y) * ratio;
		self.transform.k = new_k;
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		match Viewport::new(width, height) {
			Ok(viewport) => {
				self.viewport = viewport;
				self.layout.resize(viewport, &mut self.store, &self.visible);
			}
			Err(e) => warn!("ignoring resize: {e}"),
		}
	}
}
