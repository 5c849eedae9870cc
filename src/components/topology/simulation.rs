//! Velocity-Verlet style force simulation over the visible subgraph.
//!
//! Four forces act on every tick: a link spring towards a rest distance,
//! pairwise many-body repulsion with a distance cap, a centering shift and
//! a collision push. The simulation cools as `alpha` decays and is
//! considered settled once `alpha` falls below `alpha_min`.

use std::collections::HashMap;

use log::warn;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::projector::node_radius;
use super::types::{Edge, Node, Position};

/// Tunable force constants.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceParams {
	/// Rest length of a link.
	pub link_distance: f64,
	/// Fraction of the length error corrected per tick.
	pub link_strength: f64,
	/// Many-body strength; negative repels.
	pub charge_strength: f64,
	/// Pairs further apart than this ignore each other.
	pub charge_max_distance: f64,
	/// Pairs closer than this are treated as this far apart.
	pub charge_min_distance: f64,
	/// How strongly the centroid is pulled onto the viewport center.
	pub center_strength: f64,
	/// Added to the drawn radius to get the collision radius.
	pub collision_padding: f64,
	/// Fraction of an overlap resolved per tick.
	pub collision_strength: f64,
	/// Alpha below which the simulation stops.
	pub alpha_min: f64,
	/// Per-tick decay of alpha towards its target.
	pub alpha_decay: f64,
	/// Per-tick velocity friction.
	pub velocity_decay: f64,
}

impl Default for ForceParams {
	fn default() -> Self {
		let alpha_min: f64 = 0.001;
		Self {
			link_distance: 80.0,
			link_strength: 0.5,
			charge_strength: -300.0,
			charge_max_distance: 200.0,
			charge_min_distance: 1.0,
			center_strength: 1.0,
			collision_padding: 5.0,
			collision_strength: 1.0,
			alpha_min,
			alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
			velocity_decay: 0.4,
		}
	}
}

/// A running simulation bound to one visible node set.
#[derive(Clone, Debug)]
pub struct ForceSimulation {
	members: Vec<usize>,
	links: Vec<(usize, usize)>,
	bias: Vec<f64>,
	radii: Vec<f64>,
	params: ForceParams,
	center: Position,
	alpha: f64,
	alpha_target: f64,
	ticks: u64,
	rng: SmallRng,
}

impl ForceSimulation {
	/// Builds a simulation over `members` (store indices) and the links in
	/// `edge_indices` that connect two members.
	pub fn new(
		nodes: &[Node],
		members: &[usize],
		edges: &[Edge],
		edge_indices: &[usize],
		params: ForceParams,
		center: Position,
		seed: u64,
	) -> Self {
		let local: HashMap<&str, usize> = members
			.iter()
			.enumerate()
			.map(|(k, &i)| (nodes[i].id.as_str(), k))
			.collect();

		let links: Vec<(usize, usize)> = edge_indices
			.iter()
			.filter_map(|&e| {
				let edge = &edges[e];
				match (local.get(edge.source.as_str()), local.get(edge.target.as_str())) {
					(Some(&s), Some(&t)) if s != t => Some((s, t)),
					_ => None,
				}
			})
			.collect();

		let mut degree = vec![0usize; members.len()];
		for &(s, t) in &links {
			degree[s] += 1;
			degree[t] += 1;
		}
		let bias = links
			.iter()
			.map(|&(s, t)| degree[s] as f64 / (degree[s] + degree[t]) as f64)
			.collect();
		let radii = members
			.iter()
			.map(|&i| node_radius(&nodes[i]) + params.collision_padding)
			.collect();

		Self {
			members: members.to_vec(),
			links,
			bias,
			radii,
			params,
			center,
			alpha: 1.0,
			alpha_target: 0.0,
			ticks: 0,
			rng: SmallRng::seed_from_u64(seed),
		}
	}

	/// Current energy.
	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	/// Ticks run since construction.
	pub fn ticks(&self) -> u64 {
		self.ticks
	}

	/// Store indices this simulation moves.
	pub fn members(&self) -> &[usize] {
		&self.members
	}

	/// Energy has decayed below the stopping threshold.
	pub fn is_settled(&self) -> bool {
		self.alpha < self.params.alpha_min && self.alpha_target < self.params.alpha_min
	}

	/// Restores energy so the layout starts moving again.
	pub fn reheat(&mut self, alpha: f64) {
		self.alpha = alpha.clamp(0.0, 1.0);
	}

	/// Energy floor kept while a node is being dragged.
	pub fn set_alpha_target(&mut self, target: f64) {
		self.alpha_target = target.clamp(0.0, 1.0);
	}

	/// Moves the centering target.
	pub fn set_center(&mut self, center: Position) {
		self.center = center;
	}

	/// Advances one step. Returns `false` once settled.
	pub fn tick(&mut self, nodes: &mut [Node]) -> bool {
		if self.members.is_empty() || self.is_settled() {
			return false;
		}
		self.alpha += (self.alpha_target - self.alpha) * self.params.alpha_decay;
		self.ticks += 1;
		let alpha = self.alpha;

		self.apply_links(nodes, alpha);
		self.apply_charge(nodes, alpha);
		self.apply_center(nodes);
		self.apply_collision(nodes);

		let friction = 1.0 - self.params.velocity_decay;
		for &i in &self.members {
			let node = &mut nodes[i];
			if let Some(pin) = node.pin {
				node.position = pin;
				node.velocity = Position::default();
				continue;
			}
			node.velocity.x *= friction;
			node.velocity.y *= friction;
			node.position.x += node.velocity.x;
			node.position.y += node.velocity.y;
			if !node.position.is_finite() || !node.velocity.is_finite() {
				warn!("node {} diverged, resetting to center", node.id);
				node.position = self.center;
				node.velocity = Position::default();
			}
		}
		!self.is_settled()
	}

	fn jiggle(&mut self) -> f64 {
		(self.rng.r#gen::<f64>() - 0.5) * 1e-6
	}

	fn apply_links(&mut self, nodes: &mut [Node], alpha: f64) {
		for k in 0..self.links.len() {
			let (s, t) = self.links[k];
			let (si, ti) = (self.members[s], self.members[t]);
			let (src, tgt) = (&nodes[si], &nodes[ti]);
			let mut dx = tgt.position.x + tgt.velocity.x - src.position.x - src.velocity.x;
			let mut dy = tgt.position.y + tgt.velocity.y - src.position.y - src.velocity.y;
			if dx == 0.0 {
				dx = self.jiggle();
			}
			if dy == 0.0 {
				dy = self.jiggle();
			}
			let len = (dx * dx + dy * dy).sqrt();
			let l = (len - self.params.link_distance) / len * alpha * self.params.link_strength;
			dx *= l;
			dy *= l;
			let b = self.bias[k];
			nodes[ti].velocity.x -= dx * b;
			nodes[ti].velocity.y -= dy * b;
			nodes[si].velocity.x += dx * (1.0 - b);
			nodes[si].velocity.y += dy * (1.0 - b);
		}
	}

	fn apply_charge(&mut self, nodes: &mut [Node], alpha: f64) {
		let n = self.members.len();
		let max2 = self.params.charge_max_distance.powi(2);
		let min2 = self.params.charge_min_distance.powi(2);
		let mut delta = vec![Position::default(); n];

		for a in 0..n {
			let pa = nodes[self.members[a]].position;
			for b in 0..n {
				if a == b {
					continue;
				}
				let pb = nodes[self.members[b]].position;
				let (mut dx, mut dy) = (pb.x - pa.x, pb.y - pa.y);
				let mut l = dx * dx + dy * dy;
				if l >= max2 {
					continue;
				}
				if dx == 0.0 {
					dx = self.jiggle();
					l += dx * dx;
				}
				if dy == 0.0 {
					dy = self.jiggle();
					l += dy * dy;
				}
				if l < min2 {
					l = (min2 * l).sqrt();
				}
				let w = self.params.charge_strength * alpha / l;
				delta[a].x += dx * w;
				delta[a].y += dy * w;
			}
		}

		for (k, d) in delta.into_iter().enumerate() {
			let node = &mut nodes[self.members[k]];
			node.velocity.x += d.x;
			node.velocity.y += d.y;
		}
	}

	fn apply_center(&self, nodes: &mut [Node]) {
		if self.members.is_empty() {
			return;
		}
		let n = self.members.len() as f64;
		let (sx, sy) = self.members.iter().fold((0.0, 0.0), |(x, y), &i| {
			(x + nodes[i].position.x, y + nodes[i].position.y)
		});
		let shift_x = (sx / n - self.center.x) * self.params.center_strength;
		let shift_y = (sy / n - self.center.y) * self.params.center_strength;
		for &i in &self.members {
			nodes[i].position.x -= shift_x;
			nodes[i].position.y -= shift_y;
		}
	}

	fn apply_collision(&mut self, nodes: &mut [Node]) {
		let n = self.members.len();
		for a in 0..n {
			for b in (a + 1)..n {
				let (ia, ib) = (self.members[a], self.members[b]);
				let (ra, rb) = (self.radii[a], self.radii[b]);
				let r = ra + rb;
				let (na, nb) = (&nodes[ia], &nodes[ib]);
				let mut dx = na.position.x + na.velocity.x - nb.position.x - nb.velocity.x;
				let mut dy = na.position.y + na.velocity.y - nb.position.y - nb.velocity.y;
				let mut l = dx * dx + dy * dy;
				if l >= r * r {
					continue;
				}
				if dx == 0.0 {
					dx = self.jiggle();
					l += dx * dx;
				}
				if dy == 0.0 {
					dy = self.jiggle();
					l += dy * dy;
				}
				let len = l.sqrt();
				let push = (r - len) / len * self.params.collision_strength;
				dx *= push;
				dy *= push;
				let share = (rb * rb) / (ra * ra + rb * rb);
				nodes[ia].velocity.x += dx * share;
				nodes[ia].velocity.y += dy * share;
				nodes[ib].velocity.x -= dx * (1.0 - share);
				nodes[ib].velocity.y -= dy * (1.0 - share);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn placed(id: &str, x: f64, y: f64) -> Node {
		let mut node = Node::new(id, "web");
		node.position = Position::new(x, y);
		node
	}

	fn distance(a: &Node, b: &Node) -> f64 {
		((a.position.x - b.position.x).powi(2) + (a.position.y - b.position.y).powi(2)).sqrt()
	}

	fn run(sim: &mut ForceSimulation, nodes: &mut [Node]) {
		let mut guard = 0;
		while sim.tick(nodes) {
			guard += 1;
			assert!(guard < 10_000, "simulation never settled");
		}
	}

	#[test]
	fn default_alpha_decay_settles_in_about_300_ticks() {
		let mut nodes = vec![placed("a", 400.0, 300.0), placed("b", 420.0, 300.0)];
		let edges = vec![Edge::new("a", "b")];
		let mut sim = ForceSimulation::new(
			&nodes,
			&[0, 1],
			&edges,
			&[0],
			ForceParams::default(),
			Position::new(400.0, 300.0),
			7,
		);
		run(&mut sim, &mut nodes);
		assert!((295..=305).contains(&sim.ticks()), "ticks = {}", sim.ticks());
		assert!(!sim.tick(&mut nodes));
	}

	#[test]
	fn linked_pair_relaxes_towards_link_distance() {
		let mut nodes = vec![placed("a", 390.0, 300.0), placed("b", 410.0, 300.0)];
		let edges = vec![Edge::new("a", "b")];
		let mut sim = ForceSimulation::new(
			&nodes,
			&[0, 1],
			&edges,
			&[0],
			ForceParams::default(),
			Position::new(400.0, 300.0),
			1,
		);
		run(&mut sim, &mut nodes);
		let d = distance(&nodes[0], &nodes[1]);
		assert!(d > 60.0 && d < 200.0, "distance {d}");
		for node in &nodes {
			assert!(node.position.is_finite());
		}
	}

	#[test]
	fn coincident_nodes_separate_without_nan() {
		let mut nodes: Vec<Node> = (0..6).map(|i| placed(&format!("n{i}"), 100.0, 100.0)).collect();
		let members: Vec<usize> = (0..6).collect();
		let mut sim = ForceSimulation::new(
			&nodes,
			&members,
			&[],
			&[],
			ForceParams::default(),
			Position::new(100.0, 100.0),
			3,
		);
		run(&mut sim, &mut nodes);
		for a in 0..nodes.len() {
			assert!(nodes[a].position.is_finite());
			for b in (a + 1)..nodes.len() {
				assert!(distance(&nodes[a], &nodes[b]) > 1.0);
			}
		}
	}

	#[test]
	fn pinned_node_does_not_move() {
		let mut nodes = vec![placed("a", 10.0, 10.0), placed("b", 12.0, 10.0)];
		nodes[0].pin_at(Position::new(10.0, 10.0));
		let mut sim = ForceSimulation::new(
			&nodes,
			&[0, 1],
			&[],
			&[],
			ForceParams::default(),
			Position::new(400.0, 300.0),
			5,
		);
		for _ in 0..50 {
			sim.tick(&mut nodes);
		}
		assert_eq!(nodes[0].position, Position::new(10.0, 10.0));
		assert_ne!(nodes[1].position, Position::new(12.0, 10.0));
	}

	#[test]
	fn centroid_is_pulled_to_center() {
		let mut nodes = vec![placed("a", 0.0, 0.0), placed("b", 50.0, 0.0)];
		let mut sim = ForceSimulation::new(
			&nodes,
			&[0, 1],
			&[],
			&[],
			ForceParams::default(),
			Position::new(400.0, 300.0),
			9,
		);
		run(&mut sim, &mut nodes);
		let cx = (nodes[0].position.x + nodes[1].position.x) / 2.0;
		let cy = (nodes[0].position.y + nodes[1].position.y) / 2.0;
		assert!((cx - 400.0).abs() < 5.0 && (cy - 300.0).abs() < 5.0);
	}

	#[test]
	fn non_members_are_untouched_and_reheat_restarts() {
		let mut nodes = vec![placed("a", 0.0, 0.0), placed("b", 5.0, 0.0), placed("c", 1.0, 1.0)];
		let mut sim = ForceSimulation::new(
			&nodes,
			&[0, 1],
			&[],
			&[],
			ForceParams::default(),
			Position::new(0.0, 0.0),
			11,
		);
		run(&mut sim, &mut nodes);
		assert_eq!(nodes[2].position, Position::new(1.0, 1.0));
		sim.reheat(0.3);
		assert!(sim.tick(&mut nodes));
	}
}
