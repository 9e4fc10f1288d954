//! Perturbation sweep: how ASP degrades as nodes are removed.
//!
//! For each removal count k the sweep runs a number of trials. Each trial
//! picks k nodes of the original graph, deletes them, and recomputes ASP on
//! the induced subgraph. Trials are independent (k, trial) cells and run in
//! parallel on the rayon pool; results are always reported k-ascending and
//! trial-ascending.

use crate::asp::mean_shortest_path;
use crate::error::SweepError;
use crate::graph::{Graph, NodeId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Instant;

/// Node selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMethod {
    /// k nodes uniformly at random, without replacement, per trial
    Random,
    /// the k nodes with the highest outdegree, ties in node order
    Outdegree,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::Random => "random",
            SelectionMethod::Outdegree => "outdegree",
        }
    }

    /// Outdegree selection is deterministic, so repeating it is pointless.
    pub fn effective_repeats(&self, requested: usize) -> usize {
        match self {
            SelectionMethod::Random => requested.max(1),
            SelectionMethod::Outdegree => 1,
        }
    }
}

impl FromStr for SelectionMethod {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(SelectionMethod::Random),
            "outdegree" => Ok(SelectionMethod::Outdegree),
            other => Err(SweepError::InvalidMethod(other.to_string())),
        }
    }
}

impl std::fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sweep parameters
#[derive(Debug, Clone)]
pub struct SweepParams {
    /// Largest fraction of nodes to remove, in (0, 1]
    pub remove_max: f64,
    /// Trials per removal count (forced to 1 for outdegree)
    pub repeats: usize,
    /// Step between consecutive removal counts
    pub granularity: usize,
    pub method: SelectionMethod,
    /// Base seed for random selection; drawn from the thread RNG when unset
    pub seed: Option<u64>,
    /// Abort between cells once this instant has passed
    pub deadline: Option<Instant>,
}

impl SweepParams {
    /// Resolve the method name once; unknown names fail with `InvalidMethod`.
    pub fn new(
        remove_max: f64,
        repeats: usize,
        granularity: usize,
        method: &str,
    ) -> Result<Self, SweepError> {
        Ok(Self {
            remove_max,
            repeats,
            granularity,
            method: method.parse()?,
            seed: None,
            deadline: None,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Removal counts `1, 1 + g, 1 + 2g, ...` strictly below
/// `floor(remove_max * node_count)`. The maximum count itself is never swept.
pub fn removal_counts(node_count: usize, remove_max: f64, granularity: usize) -> Vec<usize> {
    let max_k = (remove_max * node_count as f64).floor();
    if !max_k.is_finite() || max_k < 1.0 {
        return Vec::new();
    }
    (1..max_k as usize).step_by(granularity.max(1)).collect()
}

/// Upper bound on `steps * repeats` for a single sweep
pub const MAX_SWEEP_CELLS: usize = 1_000_000;

/// Node selection resolved against the original graph once per sweep.
enum Selector {
    Random(Vec<NodeId>),
    Outdegree(Vec<NodeId>),
}

impl Selector {
    fn new(method: SelectionMethod, graph: &Graph) -> Self {
        match method {
            SelectionMethod::Random => Selector::Random(graph.nodes().to_vec()),
            SelectionMethod::Outdegree => {
                let mut ranked = graph.out_degrees();
                // stable: equal degrees keep node order
                ranked.sort_by(|a, b| b.1.cmp(&a.1));
                Selector::Outdegree(ranked.into_iter().map(|(id, _)| id).collect())
            }
        }
    }

    fn select<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Vec<NodeId> {
        match self {
            Selector::Random(nodes) => nodes.choose_multiple(rng, k).cloned().collect(),
            Selector::Outdegree(ranked) => ranked.iter().take(k).cloned().collect(),
        }
    }
}

/// Pick the `k` nodes to remove from `graph`.
pub fn select_nodes<R: Rng + ?Sized>(
    method: SelectionMethod,
    graph: &Graph,
    k: usize,
    rng: &mut R,
) -> Vec<NodeId> {
    Selector::new(method, graph).select(k, rng)
}

/// Aggregate of one trial group. Every field is `None` when no trial in the
/// group produced a defined ASP.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrialStats {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Population standard deviation
    pub std: Option<f64>,
}

impl TrialStats {
    pub fn from_values(values: &[Option<f64>]) -> Self {
        let defined: Vec<f64> = values.iter().flatten().copied().collect();
        if defined.is_empty() {
            return Self::default();
        }
        let n = defined.len() as f64;
        let mean = defined.iter().sum::<f64>() / n;
        let var = defined
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / n;
        Self {
            mean: Some(mean),
            min: defined.iter().copied().reduce(f64::min),
            max: defined.iter().copied().reduce(f64::max),
            std: Some(var.sqrt()),
        }
    }
}

/// Sweep output; the four statistic lists are aligned with `removed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    #[serde(rename = "node-count")]
    pub node_count: usize,
    #[serde(rename = "edge-count")]
    pub edge_count: usize,
    pub method: SelectionMethod,
    pub repeats: usize,
    pub removed: Vec<usize>,
    pub mean: Vec<Option<f64>>,
    pub min: Vec<Option<f64>>,
    pub max: Vec<Option<f64>>,
    pub std: Vec<Option<f64>>,
}

impl SweepResult {
    /// Stats for the i-th removal count
    pub fn stats(&self, i: usize) -> Option<TrialStats> {
        Some(TrialStats {
            mean: *self.mean.get(i)?,
            min: *self.min.get(i)?,
            max: *self.max.get(i)?,
            std: *self.std.get(i)?,
        })
    }
}

/// Run the perturbation sweep over `graph`.
pub fn sweep(graph: &Graph, params: &SweepParams) -> Result<SweepResult, SweepError> {
    let start = Instant::now();
    let repeats = params.method.effective_repeats(params.repeats);
    let ks = removal_counts(graph.node_count(), params.remove_max, params.granularity);
    let selector = Selector::new(params.method, graph);
    let base_seed = params.seed.unwrap_or_else(|| rand::thread_rng().gen());

    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        method = %params.method,
        repeats,
        steps = ks.len(),
        "Starting perturbation sweep"
    );

    let cells = ks
        .len()
        .checked_mul(repeats)
        .filter(|&cells| cells <= MAX_SWEEP_CELLS)
        .ok_or(SweepError::TooManyTrials {
            steps: ks.len(),
            repeats,
            limit: MAX_SWEEP_CELLS,
        })?;

    let expired = || params.deadline.is_some_and(|d| Instant::now() >= d);
    if expired() {
        return Err(SweepError::DeadlineExceeded);
    }

    // cell index -> (k, trial), k-major
    let values = (0..cells)
        .into_par_iter()
        .map(|index| {
            if expired() {
                return Err(SweepError::DeadlineExceeded);
            }
            let k = ks[index / repeats];
            // per-cell RNG keeps results independent of scheduling
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(index as u64));
            let removed: HashSet<NodeId> = selector.select(k, &mut rng).into_iter().collect();
            let subgraph = graph.induce(|id| !removed.contains(id));
            Ok(mean_shortest_path(&subgraph))
        })
        .collect::<Result<Vec<Option<f64>>, SweepError>>()?;

    let mut result = SweepResult {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        method: params.method,
        repeats,
        removed: ks.clone(),
        mean: Vec::with_capacity(ks.len()),
        min: Vec::with_capacity(ks.len()),
        max: Vec::with_capacity(ks.len()),
        std: Vec::with_capacity(ks.len()),
    };

    for (k, group) in ks.iter().zip(values.chunks(repeats)) {
        let stats = TrialStats::from_values(group);
        tracing::debug!(k, mean = ?stats.mean, "Removal step aggregated");
        result.mean.push(stats.mean);
        result.min.push(stats.min);
        result.max.push(stats.max);
        result.std.push(stats.std);
    }

    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Perturbation sweep finished"
    );

    Ok(result)
}
