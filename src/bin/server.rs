//! netsweep HTTP service
//!
//! Runs the job API with an in-process queue and worker pool.

use clap::Parser;
use netsweep::api::start_api_server;
use netsweep::config::ServiceConfig;
use netsweep::id_store::JobIdStore;
use netsweep::manager::JobManager;
use netsweep::queue::InMemoryQueue;
use netsweep::telemetry::init_tracing;
use netsweep::worker::WorkerPool;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::parse();
    let _log_guard = init_tracing(&config.log_config())?;

    tracing::info!(
        workers = config.workers,
        job_timeout_secs = config.job_timeout_secs,
        id_digits = config.id_digits,
        "Starting netsweep service"
    );

    let queue = Arc::new(InMemoryQueue::new(config.result_ttl()));
    let pool = WorkerPool::spawn(Arc::clone(&queue), config.workers);
    let purger = queue.spawn_purger(config.result_ttl());

    let ids = JobIdStore::new(config.id_capacity, config.id_ttl());
    let manager = Arc::new(JobManager::new(queue, ids, config.manager_config()));

    let served = start_api_server(manager, &config.bind).await;
    purger.abort();
    pool.shutdown();
    served
}
