use std::collections::{BTreeSet, HashMap, HashSet};

use super::types::{Edge, Node};

/// Categories currently switched on. Empty means "show all".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
	active: BTreeSet<String>,
}

impl FilterState {
	/// Replaces the active category set.
	pub fn set<I, S>(&mut self, categories: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.active = categories.into_iter().map(Into::into).collect();
	}

	/// Flips a single category on or off.
	pub fn toggle(&mut self, category: &str) {
		if !self.active.remove(category) {
			self.active.insert(category.to_string());
		}
	}

	/// The raw active set.
	pub fn active(&self) -> &BTreeSet<String> {
		&self.active
	}

	/// No category is selected, so nothing is filtered out.
	pub fn shows_all(&self) -> bool {
		self.active.is_empty()
	}
}

/// Indices into the store of the nodes and links passing the filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisibleSubgraph {
	/// Visible node indices, in store order.
	pub nodes: Vec<usize>,
	/// Visible link indices, in store order.
	pub edges: Vec<usize>,
	node_set: HashSet<usize>,
}

impl VisibleSubgraph {
	/// Node index is part of the subgraph.
	pub fn contains_node(&self, index: usize) -> bool {
		self.node_set.contains(&index)
	}

	#[allow(missing_docs)]
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

/// A node passes when nothing is selected or any of its categories is on.
pub fn node_matches(node: &Node, active: &BTreeSet<String>) -> bool {
	active.is_empty() || node.categories().any(|c| active.contains(c))
}

/// Derives the visible subgraph.
///
/// Links are kept only when both endpoints resolve to visible nodes, so a
/// link into a filtered-out (or unknown) node never survives.
pub fn compute_visible_subgraph(
	nodes: &[Node],
	edges: &[Edge],
	active: &BTreeSet<String>,
) -> VisibleSubgraph {
	let visible: HashMap<&str, usize> = nodes
		.iter()
		.enumerate()
		.filter(|(_, n)| node_matches(n, active))
		.map(|(i, n)| (n.id.as_str(), i))
		.collect();

	let mut node_indices: Vec<usize> = visible.values().copied().collect();
	node_indices.sort_unstable();

	let edge_indices = edges
		.iter()
		.enumerate()
		.filter(|(_, e)| {
			visible.contains_key(e.source.as_str()) && visible.contains_key(e.target.as_str())
		})
		.map(|(i, _)| i)
		.collect();

	VisibleSubgraph {
		node_set: node_indices.iter().copied().collect(),
		nodes: node_indices,
		edges: edge_indices,
	}
}
