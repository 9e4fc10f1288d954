//! Queue backend boundary.
//!
//! The queue is an external collaborator and the only durable store of job
//! state and results. The manager talks to it through [`JobQueue`] (submit a
//! job, fetch its state); workers talk to it through [`JobSource`] (pull a
//! job, report progress). [`InMemoryQueue`] implements both sides inside one
//! process.

use crate::error::BackendError;
use crate::job::PerturbationRequest;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Opaque job token issued by the queue backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InternalJobId(pub String);

impl std::fmt::Display for InternalJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job state as reported by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendJobState {
    Queued,
    Started,
    Finished(Value),
    Failed(String),
    /// Any state name outside the four above (deferred, cancelled, ...)
    Other(String),
}

/// Unit of work handed to a worker
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: InternalJobId,
    pub request: PerturbationRequest,
    /// Execution timeout for this job
    pub timeout: Duration,
}

/// Progress reported by a worker
#[derive(Debug, Clone, PartialEq)]
pub enum JobReport {
    Started,
    Finished(Value),
    Failed(String),
}

/// Producer side: submit jobs and read their state.
pub trait JobQueue: Send + Sync + 'static {
    fn enqueue(
        &self,
        request: PerturbationRequest,
        timeout: Duration,
    ) -> impl Future<Output = Result<InternalJobId, BackendError>> + Send;

    /// `Ok(None)` when the backend no longer knows the id (expired, evicted).
    fn fetch(
        &self,
        id: &InternalJobId,
    ) -> impl Future<Output = Result<Option<BackendJobState>, BackendError>> + Send;
}

/// Consumer side: pull jobs and report their progress.
pub trait JobSource: Send + Sync + 'static {
    /// Wait for the next job; `None` once the queue is closed.
    fn next_job(&self) -> impl Future<Output = Option<QueuedJob>> + Send;

    fn report(
        &self,
        id: &InternalJobId,
        report: JobReport,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

#[derive(Debug, Clone)]
enum RecordState {
    Queued,
    Started,
    Finished(Value),
    Failed(String),
}

#[derive(Debug, Clone)]
struct JobRecord {
    state: RecordState,
    enqueued_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

/// In-process queue backend.
///
/// Finished and failed records are kept for `retention` after they end and
/// then forgotten, which callers observe as an unknown internal id.
pub struct InMemoryQueue {
    jobs: DashMap<InternalJobId, JobRecord>,
    sender: mpsc::UnboundedSender<QueuedJob>,
    receiver: Mutex<mpsc::UnboundedReceiver<QueuedJob>>,
    retention: Duration,
}

impl InMemoryQueue {
    pub fn new(retention: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            jobs: DashMap::new(),
            sender,
            receiver: Mutex::new(receiver),
            retention,
        }
    }

    /// Number of records currently held, in any state
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop every ended record older than the retention period.
    pub fn purge_expired(&self) -> usize {
        let before = self.jobs.len();
        let now = Utc::now();
        self.jobs.retain(|_, record| !self.is_expired(record, now));
        before - self.jobs.len()
    }

    /// Purge expired records every `period` until the handle is aborted.
    ///
    /// Without this, a finished job nobody polls keeps its result in memory
    /// for the life of the process.
    pub fn spawn_purger(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let purged = queue.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired job records");
                }
            }
        })
    }

    fn is_expired(&self, record: &JobRecord, now: DateTime<Utc>) -> bool {
        match record.ended_at {
            Some(ended) => (now - ended)
                .to_std()
                .map(|age| age > self.retention)
                .unwrap_or(false),
            None => false,
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

impl JobQueue for InMemoryQueue {
    async fn enqueue(
        &self,
        request: PerturbationRequest,
        timeout: Duration,
    ) -> Result<InternalJobId, BackendError> {
        let id = InternalJobId(Uuid::new_v4().to_string());
        self.jobs.insert(
            id.clone(),
            JobRecord {
                state: RecordState::Queued,
                enqueued_at: Utc::now(),
                ended_at: None,
            },
        );

        let job = QueuedJob {
            id: id.clone(),
            request,
            timeout,
        };
        if self.sender.send(job).is_err() {
            self.jobs.remove(&id);
            return Err(BackendError::Unavailable("job channel closed".to_string()));
        }

        tracing::debug!(internal_id = %id, "Job enqueued");
        Ok(id)
    }

    async fn fetch(&self, id: &InternalJobId) -> Result<Option<BackendJobState>, BackendError> {
        let record = match self.jobs.get(id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };

        if self.is_expired(&record, Utc::now()) {
            self.jobs.remove(id);
            return Ok(None);
        }

        Ok(Some(match record.state {
            RecordState::Queued => BackendJobState::Queued,
            RecordState::Started => BackendJobState::Started,
            RecordState::Finished(result) => BackendJobState::Finished(result),
            RecordState::Failed(reason) => BackendJobState::Failed(reason),
        }))
    }
}

impl JobSource for InMemoryQueue {
    async fn next_job(&self) -> Option<QueuedJob> {
        self.receiver.lock().await.recv().await
    }

    async fn report(&self, id: &InternalJobId, report: JobReport) -> Result<(), BackendError> {
        let mut record = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| BackendError::Unavailable(format!("no record for job {}", id)))?;

        match report {
            JobReport::Started => {
                let waited = Utc::now() - record.enqueued_at;
                tracing::debug!(internal_id = %id, waited_ms = waited.num_milliseconds(), "Job started");
                record.state = RecordState::Started;
            }
            JobReport::Finished(result) => {
                record.state = RecordState::Finished(result);
                record.ended_at = Some(Utc::now());
            }
            JobReport::Failed(reason) => {
                record.state = RecordState::Failed(reason);
                record.ended_at = Some(Utc::now());
            }
        }
        Ok(())
    }
}
