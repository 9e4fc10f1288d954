//! Breadth-first reachability profiles.
//!
//! A profile lists, for hop distance 1, 2, 3, ..., how many nodes are first
//! discovered at that distance from the source. The profile ends at the first
//! hop that discovers nothing new, so an empty profile means the source
//! reaches no other node.

use crate::graph::{Graph, NodeId};
use std::collections::{HashMap, HashSet};

/// Forward adjacency of a graph, successors deduplicated.
///
/// Edges whose endpoints are not graph nodes are dropped here, so traversal
/// never visits an unknown id.
pub struct Adjacency<'g> {
    successors: HashMap<&'g str, HashSet<&'g str>>,
}

impl<'g> Adjacency<'g> {
    pub fn from_graph(graph: &'g Graph) -> Self {
        let known: HashSet<&str> = graph.nodes().iter().map(NodeId::as_str).collect();
        let mut successors: HashMap<&str, HashSet<&str>> = HashMap::new();
        for (source, target) in graph.edges() {
            let (s, t) = (source.as_str(), target.as_str());
            if known.contains(s) && known.contains(t) {
                successors.entry(s).or_default().insert(t);
            }
        }
        Self { successors }
    }

    /// Newly discovered node counts per hop distance from `source`.
    ///
    /// The source is marked visited before the first hop, so self-loops and
    /// cycles back to it are never counted.
    pub fn bfs_levels(&self, source: &str) -> Vec<usize> {
        let mut levels = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut frontier: Vec<&str> = Vec::new();

        if let Some((&key, _)) = self.successors.get_key_value(source) {
            visited.insert(key);
            frontier.push(key);
        }

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for node in &frontier {
                if let Some(succ) = self.successors.get(node) {
                    for &target in succ {
                        if visited.insert(target) {
                            next.push(target);
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            levels.push(next.len());
            frontier = next;
        }

        levels
    }
}

/// BFS level profile of `source` in `graph`.
///
/// Builds the adjacency on every call; callers profiling many sources should
/// build an [`Adjacency`] once instead.
pub fn bfs_levels(graph: &Graph, source: &NodeId) -> Vec<usize> {
    Adjacency::from_graph(graph).bfs_levels(source.as_str())
}
