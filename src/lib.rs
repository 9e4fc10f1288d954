//! netsweep: network resilience analysis.
//!
//! Measures how the average shortest path length of a graph degrades as
//! nodes are removed, and serves those sweeps as asynchronous jobs behind a
//! short public job id.
//!
//! Data flows GraphML text → [`graph::Graph`] → repeated
//! [`asp::mean_shortest_path`] inside [`sweep::sweep`] → a JSON result stored
//! by the queue and read back through [`manager::JobManager::status`].

pub mod api;
pub mod asp;
pub mod config;
pub mod error;
pub mod graph;
pub mod id_store;
pub mod job;
pub mod manager;
pub mod queue;
pub mod reachability;
pub mod sweep;
pub mod telemetry;
pub mod worker;

pub use asp::mean_shortest_path;
pub use error::{BackendError, GraphParseError, JobError, SweepError, ValidationError};
pub use graph::{Graph, NodeId};
pub use manager::{JobManager, JobStatusView};
pub use reachability::bfs_levels;
pub use sweep::{sweep, SelectionMethod, SweepParams, SweepResult};
