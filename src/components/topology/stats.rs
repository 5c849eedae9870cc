use serde::{Deserialize, Serialize};

use super::filter::VisibleSubgraph;

/// Summary of the visible subgraph for the stats panel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
	/// Visible nodes.
	pub node_count: usize,
	/// Visible links.
	pub edge_count: usize,
	/// `2E / N`.
	pub average_degree: f64,
	/// `2E / (N (N - 1))`, zero below two nodes.
	pub density: f64,
}

impl GraphStats {
	/// Computes stats from raw counts.
	pub fn from_counts(node_count: usize, edge_count: usize) -> Self {
		let (n, e) = (node_count as f64, edge_count as f64);
		Self {
			node_count,
			edge_count,
			average_degree: if node_count == 0 { 0.0 } else { 2.0 * e / n },
			density: if node_count < 2 {
				0.0
			} else {
				2.0 * e / (n * (n - 1.0))
			},
		}
	}

	/// Computes stats for a visible subgraph.
	pub fn of(visible: &VisibleSubgraph) -> Self {
		Self::from_counts(visible.nodes.len(), visible.edges.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn triangle() {
		let stats = GraphStats::from_counts(3, 3);
		assert_eq!(stats.average_degree, 2.0);
		assert_eq!(stats.density, 1.0);
	}

	#[test]
	fn degenerate_sizes_do_not_divide_by_zero() {
		assert_eq!(GraphStats::from_counts(0, 0), GraphStats::default());
		let single = GraphStats::from_counts(1, 0);
		assert_eq!(single.density, 0.0);
		assert_eq!(single.average_degree, 0.0);
	}

	#[test]
	fn path_of_three() {
		let stats = GraphStats::from_counts(3, 2);
		assert!((stats.average_degree - 4.0 / 3.0).abs() < 1e-12);
		assert!((stats.density - 2.0 / 3.0).abs() < 1e-12);
	}
}
