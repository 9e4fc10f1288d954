//! Worker pool executing queued sweeps.
//!
//! Each worker pulls one job at a time and runs it on the blocking thread
//! pool under the job's timeout. A job that exceeds its timeout is reported
//! failed and never retried.

use crate::job::run_sweep_job;
use crate::queue::{JobReport, JobSource, QueuedJob};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` tasks pulling from `source`.
    pub fn spawn<S: JobSource>(source: Arc<S>, workers: usize) -> Self {
        let handles = (0..workers.max(1))
            .map(|worker| {
                let source = Arc::clone(&source);
                tokio::spawn(async move {
                    tracing::info!(worker, "Worker started");
                    while let Some(job) = source.next_job().await {
                        execute_job(source.as_ref(), job).await;
                    }
                    tracing::info!(worker, "Job source closed, worker exiting");
                })
            })
            .collect();
        Self { handles }
    }

    /// Stop all workers. Jobs in flight are abandoned.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

/// Run one job to completion, failure or timeout and report the outcome.
pub async fn execute_job<S: JobSource>(source: &S, job: QueuedJob) {
    let QueuedJob {
        id,
        request,
        timeout,
    } = job;

    if let Err(err) = source.report(&id, JobReport::Started).await {
        tracing::error!(internal_id = %id, error = %err, "Could not mark job started");
    }

    let start = Instant::now();
    let deadline = start + timeout;
    let task = tokio::task::spawn_blocking(move || run_sweep_job(&request, Some(deadline)));

    let report = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(outcome))) => match serde_json::to_value(&outcome) {
            Ok(value) => JobReport::Finished(value),
            Err(err) => JobReport::Failed(format!("could not encode result: {}", err)),
        },
        Ok(Ok(Err(err))) => JobReport::Failed(err.to_string()),
        Ok(Err(join_err)) => JobReport::Failed(format!("job panicked: {}", join_err)),
        Err(_) => JobReport::Failed(format!("job timed out after {:?}", timeout)),
    };

    let elapsed_ms = start.elapsed().as_millis() as u64;
    match &report {
        JobReport::Failed(reason) => {
            tracing::warn!(internal_id = %id, elapsed_ms, reason = %reason, "Job failed")
        }
        _ => tracing::info!(internal_id = %id, elapsed_ms, "Job finished"),
    }

    if let Err(err) = source.report(&id, report).await {
        tracing::error!(internal_id = %id, error = %err, "Could not record job outcome");
    }
}
