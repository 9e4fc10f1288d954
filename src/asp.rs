//! Average shortest path length over reachable ordered pairs.

use crate::graph::Graph;
use crate::reachability::Adjacency;

/// Mean hop distance from a node to everything it reaches, given its BFS
/// level profile. `None` when the profile is empty.
pub fn node_mean_distance(levels: &[usize]) -> Option<f64> {
    let reached: usize = levels.iter().sum();
    if reached == 0 {
        return None;
    }
    let weighted: usize = levels
        .iter()
        .enumerate()
        .map(|(i, &count)| count * (i + 1))
        .sum();
    Some(weighted as f64 / reached as f64)
}

/// Mean of the per-node mean distances.
///
/// Nodes that reach nothing contribute no value. Returns `None` when no node
/// reaches anything (edgeless or single-node graphs), which is distinct from
/// a mean of `0.0`.
pub fn mean_shortest_path(graph: &Graph) -> Option<f64> {
    let adjacency = Adjacency::from_graph(graph);

    let (sum, count) = graph
        .nodes()
        .iter()
        .filter_map(|node| node_mean_distance(&adjacency.bfs_levels(node.as_str())))
        .fold((0.0f64, 0usize), |(sum, count), mean| (sum + mean, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
