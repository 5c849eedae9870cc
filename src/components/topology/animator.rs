//! Traffic particles travelling along active links.
//!
//! The animator is a small state machine (`idle -> animating -> idle`).
//! Cycles are scheduled through a [`CycleTimer`]; every scheduled cycle
//! carries the [`AnimationHandle`] of the run that created it, so a cycle
//! that fires after `disable` (or after a later `enable`) is recognised as
//! stale and ignored.

use log::debug;
use serde::{Deserialize, Serialize};

use super::filter::VisibleSubgraph;
use super::projector::protocol_color;
use super::store::GraphStore;
use super::types::{EdgeStatus, Position};

/// Timer identifier handed out by a [`CycleTimer`].
pub type TimerId = i32;

/// Identifies one `enable` run. Cycles scheduled by an earlier run carry an
/// older handle and do nothing when they fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnimationHandle {
	generation: u64,
}

/// Schedules the next traffic cycle. The browser implementation wraps
/// `setTimeout`.
pub trait CycleTimer {
	/// Arranges for the cycle belonging to `handle` to run after `delay_ms`.
	fn schedule(&mut self, delay_ms: u32, handle: AnimationHandle) -> TimerId;
	/// Cancels a scheduled cycle. Unknown ids are ignored.
	fn cancel(&mut self, id: TimerId);
}

/// Animation cadence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
	/// Delay between spawn cycles. Longer than `travel_ms` so particles do
	/// not pile up.
	pub interval_ms: u32,
	/// Time for a particle to cross its link.
	pub travel_ms: f64,
	/// Opacity at the source end.
	pub start_opacity: f64,
	/// Opacity at the target end.
	pub end_opacity: f64,
}

impl Default for AnimatorConfig {
	fn default() -> Self {
		Self {
			interval_ms: 2500,
			travel_ms: 2000.0,
			start_opacity: 0.9,
			end_opacity: 0.1,
		}
	}
}

/// One unit of traffic on one link.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
	/// Link being traversed.
	pub edge_id: String,
	source: String,
	target: String,
	from: Position,
	to: Position,
	started_at: f64,
	/// Protocol color.
	pub color: &'static str,
}

/// Where a particle is drawn this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleFrame {
	#[allow(missing_docs)]
	pub position: Position,
	#[allow(missing_docs)]
	pub opacity: f64,
	#[allow(missing_docs)]
	pub color: &'static str,
}

/// Spawns and ages traffic particles.
#[derive(Clone, Debug, Default)]
pub struct TrafficAnimator {
	config: AnimatorConfig,
	animating: bool,
	generation: u64,
	pending: Option<TimerId>,
	particles: Vec<Particle>,
}

impl TrafficAnimator {
	#[allow(missing_docs)]
	pub fn new(config: AnimatorConfig) -> Self {
		Self {
			config,
			..Default::default()
		}
	}

	#[allow(missing_docs)]
	pub fn is_animating(&self) -> bool {
		self.animating
	}

	/// Particles still in flight.
	pub fn particle_count(&self) -> usize {
		self.particles.len()
	}

	/// Timer of the next cycle, if one is scheduled.
	pub fn pending_timer(&self) -> Option<TimerId> {
		self.pending
	}

	/// Starts the cycle loop. Returns `None` when already animating, so a
	/// second call never creates a second loop.
	pub fn enable(&mut self, timer: &mut dyn CycleTimer) -> Option<AnimationHandle> {
		if self.animating {
			debug!("traffic animation already running");
			return None;
		}
		self.generation += 1;
		self.animating = true;
		let handle = AnimationHandle {
			generation: self.generation,
		};
		self.pending = Some(timer.schedule(0, handle));
		debug!("traffic animation #{} started", self.generation);
		Some(handle)
	}

	/// Stops the loop, cancels the pending cycle and drops every particle.
	/// Safe to call when idle.
	pub fn disable(&mut self, timer: &mut dyn CycleTimer) {
		if let Some(id) = self.pending.take() {
			timer.cancel(id);
		}
		if self.animating {
			debug!("traffic animation #{} stopped", self.generation);
		}
		self.stop();
	}

	fn stop(&mut self) {
		self.animating = false;
		self.generation += 1;
		self.pending = None;
		self.particles.clear();
	}

	/// Runs one cycle: spawns a particle per eligible link and schedules the
	/// next cycle. Stale cycles, and cycles that find the traffic overlay
	/// switched off, spawn nothing and do not reschedule.
	///
	/// Returns the number of particles spawned.
	pub fn run_cycle(
		&mut self,
		handle: AnimationHandle,
		timer: &mut dyn CycleTimer,
		now: f64,
		store: &GraphStore,
		visible: &VisibleSubgraph,
		show_traffic: bool,
	) -> usize {
		if !self.animating || handle.generation != self.generation {
			debug!("ignoring stale traffic cycle #{}", handle.generation);
			return 0;
		}
		self.pending = None;
		if !show_traffic {
			debug!("traffic overlay off, cycle #{} cancels itself", handle.generation);
			self.stop();
			return 0;
		}

		self.advance(now);
		let before = self.particles.len();
		for &e in &visible.edges {
			let Some(edge) = store.edges().get(e) else {
				continue;
			};
			if edge.status != EdgeStatus::Active {
				continue;
			}
			let (Some(from), Some(to)) = (store.position(&edge.source), store.position(&edge.target))
			else {
				continue;
			};
			self.particles.push(Particle {
				edge_id: edge.id.clone(),
				source: edge.source.clone(),
				target: edge.target.clone(),
				from,
				to,
				started_at: now,
				color: protocol_color(&edge.protocol),
			});
		}

		self.pending = Some(timer.schedule(self.config.interval_ms, handle));
		self.particles.len() - before
	}

	/// Removes particles that have finished their trip.
	pub fn advance(&mut self, now: f64) {
		let travel = self.config.travel_ms;
		self.particles.retain(|p| now - p.started_at < travel);
	}

	/// Current particle positions. Endpoints are read live from the store;
	/// if one has gone missing the spawn-time position is used instead.
	pub fn frames(&self, now: f64, store: &GraphStore) -> Vec<ParticleFrame> {
		let AnimatorConfig {
			travel_ms,
			start_opacity,
			end_opacity,
			..
		} = self.config;
		self.particles
			.iter()
			.filter_map(|p| {
				let t = (now - p.started_at) / travel_ms;
				if !(0.0..1.0).contains(&t) {
					return None;
				}
				let from = store.position(&p.source).unwrap_or(p.from);
				let to = store.position(&p.target).unwrap_or(p.to);
				Some(ParticleFrame {
					position: from.lerp(to, t),
					opacity: start_opacity + (end_opacity - start_opacity) * t,
					color: p.color,
				})
			})
			.collect()
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use std::collections::BTreeSet;

	use super::*;
	use crate::components::topology::filter::compute_visible_subgraph;
	use crate::components::topology::types::{Edge, Node, Viewport};

	/// Records schedule/cancel calls instead of touching a real clock.
	#[derive(Default)]
	pub(crate) struct ManualTimer {
		next: TimerId,
		pub scheduled: Vec<(TimerId, u32, AnimationHandle)>,
		pub cancelled: Vec<TimerId>,
	}

	impl ManualTimer {
		pub fn last(&self) -> Option<AnimationHandle> {
			self.scheduled.last().map(|&(_, _, h)| h)
		}
	}

	impl CycleTimer for ManualTimer {
		fn schedule(&mut self, delay_ms: u32, handle: AnimationHandle) -> TimerId {
			self.next += 1;
			self.scheduled.push((self.next, delay_ms, handle));
			self.next
		}

		fn cancel(&mut self, id: TimerId) {
			self.cancelled.push(id);
		}
	}

	fn fixture() -> (GraphStore, VisibleSubgraph) {
		let nodes = vec![Node::new("A", "web"), Node::new("B", "web"), Node::new("C", "db")];
		let mut https = Edge::new("A", "B");
		https.protocol = "HTTPS".into();
		let mut degraded = Edge::new("B", "C");
		degraded.status = EdgeStatus::Degraded;
		let store = GraphStore::from_parts(nodes, vec![https, degraded, Edge::new("A", "C")], &Viewport::default());
		let visible = compute_visible_subgraph(store.nodes(), store.edges(), &BTreeSet::new());
		(store, visible)
	}

	#[test]
	fn enable_twice_keeps_one_loop() {
		let mut timer = ManualTimer::default();
		let mut animator = TrafficAnimator::default();
		assert!(animator.enable(&mut timer).is_some());
		assert!(animator.enable(&mut timer).is_none());
		assert_eq!(timer.scheduled.len(), 1);
		assert_eq!(timer.scheduled[0].1, 0);
	}

	#[test]
	fn cycle_spawns_on_active_positioned_edges_and_reschedules() {
		let (store, visible) = fixture();
		let mut timer = ManualTimer::default();
		let mut animator = TrafficAnimator::default();
		let handle = animator.enable(&mut timer).unwrap();

		let spawned = animator.run_cycle(handle, &mut timer, 0.0, &store, &visible, true);
		assert_eq!(spawned, 2);
		assert_eq!(animator.particle_count(), 2);
		assert_eq!(timer.scheduled.len(), 2);
		assert_eq!(timer.scheduled[1].1, 2500);
		assert_eq!(animator.pending_timer(), Some(2));

		// previous particles expire before the next cycle spawns
		let spawned = animator.run_cycle(handle, &mut timer, 2500.0, &store, &visible, true);
		assert_eq!(spawned, 2);
		assert_eq!(animator.particle_count(), 2);
	}

	#[test]
	fn retried_cycle_keeps_the_loop_alive_until_disabled() {
		let (store, visible) = fixture();
		let mut timer = ManualTimer::default();
		let mut animator = TrafficAnimator::default();
		let handle = animator.enable(&mut timer).unwrap();

		// the first firing could not reach the animator; the same handle is
		// scheduled again and runs later
		timer.schedule(16, handle);
		assert_eq!(animator.run_cycle(handle, &mut timer, 16.0, &store, &visible, true), 2);
		assert!(animator.is_animating());
		assert_eq!(timer.scheduled.last().map(|s| s.1), Some(2500));

		animator.disable(&mut timer);
		timer.schedule(16, handle);
		assert_eq!(animator.run_cycle(handle, &mut timer, 32.0, &store, &visible, true), 0);
		assert_eq!(animator.particle_count(), 0);
	}

	#[test]
	fn zero_active_edges_still_schedules_next_cycle() {
		let store = GraphStore::from_parts(vec![Node::new("solo", "web")], vec![], &Viewport::default());
		let visible = compute_visible_subgraph(store.nodes(), store.edges(), &BTreeSet::new());
		let mut timer = ManualTimer::default();
		let mut animator = TrafficAnimator::default();
		let handle = animator.enable(&mut timer).unwrap();
		assert_eq!(animator.run_cycle(handle, &mut timer, 0.0, &store, &visible, true), 0);
		assert_eq!(timer.scheduled.len(), 2);
		assert!(animator.is_animating());
	}

	#[test]
	fn disable_cancels_pending_and_clears_particles() {
		let (store, visible) = fixture();
		let mut timer = ManualTimer::default();
		let mut animator = TrafficAnimator::default();
		let handle = animator.enable(&mut timer).unwrap();
		animator.run_cycle(handle, &mut timer, 0.0, &store, &visible, true);
		let pending = animator.pending_timer().unwrap();

		animator.disable(&mut timer);
		assert_eq!(timer.cancelled, vec![pending]);
		assert_eq!(animator.particle_count(), 0);
		assert!(!animator.is_animating());

		// the already-scheduled cycle fires anyway
		let stale = timer.last().unwrap();
		assert_eq!(animator.run_cycle(stale, &mut timer, 2500.0, &store, &visible, true), 0);
		assert_eq!(animator.particle_count(), 0);
		assert_eq!(timer.scheduled.len(), 2);

		// and disabling again is harmless
		animator.disable(&mut timer);
		assert_eq!(timer.cancelled.len(), 1);
	}

	#[test]
	fn stale_cycle_from_previous_run_is_ignored_after_reenable() {
		let (store, visible) = fixture();
		let mut timer = ManualTimer::default();
		let mut animator = TrafficAnimator::default();
		let first = animator.enable(&mut timer).unwrap();
		animator.disable(&mut timer);
		let second = animator.enable(&mut timer).unwrap();
		assert_ne!(first, second);
		assert_eq!(animator.run_cycle(first, &mut timer, 0.0, &store, &visible, true), 0);
		assert_eq!(animator.run_cycle(second, &mut timer, 0.0, &store, &visible, true), 2);
	}

	#[test]
	fn cycle_cancels_itself_when_overlay_turned_off() {
		let (store, visible) = fixture();
		let mut timer = ManualTimer::default();
		let mut animator = TrafficAnimator::default();
		let handle = animator.enable(&mut timer).unwrap();
		assert_eq!(animator.run_cycle(handle, &mut timer, 0.0, &store, &visible, false), 0);
		assert!(!animator.is_animating());
		assert_eq!(animator.pending_timer(), None);
		assert_eq!(timer.scheduled.len(), 1);
	}

	#[test]
	fn frames_interpolate_and_fade() {
		let mut store = GraphStore::from_parts(
			vec![Node::new("A", "web"), Node::new("B", "web")],
			vec![Edge::new("A", "B")],
			&Viewport::default(),
		);
		store.nodes_mut()[0].position = Position::new(0.0, 0.0);
		store.nodes_mut()[1].position = Position::new(100.0, 0.0);
		let visible = compute_visible_subgraph(store.nodes(), store.edges(), &BTreeSet::new());
		let mut timer = ManualTimer::default();
		let mut animator = TrafficAnimator::default();
		let handle = animator.enable(&mut timer).unwrap();
		animator.run_cycle(handle, &mut timer, 1000.0, &store, &visible, true);

		let frames = animator.frames(2000.0, &store);
		assert_eq!(frames.len(), 1);
		assert_eq!(frames[0].position, Position::new(50.0, 0.0));
		assert!((frames[0].opacity - 0.5).abs() < 1e-9);
		assert_eq!(frames[0].color, protocol_color("TCP"));

		// endpoint lost its position: fall back to where it was at spawn
		store.nodes_mut()[1].position = Position::new(f64::NAN, f64::NAN);
		let frames = animator.frames(2000.0, &store);
		assert_eq!(frames[0].position, Position::new(50.0, 0.0));

		assert!(animator.frames(3000.0, &store).is_empty());
		animator.advance(3000.0);
		assert_eq!(animator.particle_count(), 0);
	}

	#[test]
	fn edges_without_finite_endpoints_spawn_nothing() {
		let (mut store, visible) = fixture();
		store.nodes_mut()[1].position = Position::new(f64::NAN, 0.0);
		let mut timer = ManualTimer::default();
		let mut animator = TrafficAnimator::default();
		let handle = animator.enable(&mut timer).unwrap();
		// A-B loses B; B-C is degraded; only A-C remains
		assert_eq!(animator.run_cycle(handle, &mut timer, 0.0, &store, &visible, true), 1);
	}
}
