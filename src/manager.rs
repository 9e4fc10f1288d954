//! Job lifecycle manager.
//!
//! Validates requests, hands them to the queue, and answers status polls
//! under a short public id that is independent of the queue's own job id.
//! The manager never changes job state; it only translates what the queue
//! reports.

use crate::error::JobError;
use crate::id_store::JobIdStore;
use crate::job::PerturbationRequest;
use crate::queue::{BackendJobState, JobQueue};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Widest public id that still fits a u64 range of 10^width
pub const MAX_ID_DIGITS: u32 = 18;

/// What to do when a freshly drawn public id is already mapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdCollisionPolicy {
    /// Replace the existing mapping silently
    Overwrite,
    /// Redraw while the id is live, then overwrite
    Regenerate { max_attempts: usize },
}

impl Default for IdCollisionPolicy {
    fn default() -> Self {
        IdCollisionPolicy::Regenerate { max_attempts: 8 }
    }
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Digits in a public job id
    pub id_digits: u32,
    /// Execution timeout attached to every job
    pub job_timeout: Duration,
    pub collision_policy: IdCollisionPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            id_digits: 6,
            job_timeout: Duration::from_secs(180),
            collision_policy: IdCollisionPolicy::default(),
        }
    }
}

/// Public view of a job's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum JobStatusView {
    #[serde(rename = "queued for processing")]
    Queued,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed { result: Value },
    #[serde(rename = "job failed")]
    Failed,
}

/// Response to a successful submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub status: String,
    pub id: String,
}

impl SubmitResponse {
    pub fn queued(id: String) -> Self {
        Self {
            status: "queued for processing".to_string(),
            id,
        }
    }
}

pub struct JobManager<Q: JobQueue> {
    queue: Arc<Q>,
    ids: JobIdStore,
    config: ManagerConfig,
}

impl<Q: JobQueue> JobManager<Q> {
    pub fn new(queue: Arc<Q>, ids: JobIdStore, config: ManagerConfig) -> Self {
        Self { queue, ids, config }
    }

    pub fn id_store(&self) -> &JobIdStore {
        &self.ids
    }

    /// Validate `body`, enqueue the sweep and return its public id.
    ///
    /// Validation happens before anything reaches the queue.
    pub async fn submit(&self, body: &Value) -> Result<String, JobError> {
        let request = PerturbationRequest::from_json(body)?;
        let method = request.method.clone();

        let internal = self.queue.enqueue(request, self.config.job_timeout).await?;
        let (public, replaced) = self
            .ids
            .insert_with(internal.clone(), self.id_attempts(), || self.mint_id());

        if let Some(previous) = replaced {
            tracing::warn!(
                public_id = %public,
                previous = %previous,
                "Public job id collided with a live mapping; overwriting"
            );
        }

        tracing::info!(
            public_id = %public,
            internal_id = %internal,
            method = %method,
            "Job submitted"
        );
        Ok(public)
    }

    /// Translate the queue's view of a job into the public vocabulary.
    pub async fn status(&self, public_id: &str) -> Result<JobStatusView, JobError> {
        let internal = self
            .ids
            .get(public_id)
            .ok_or_else(|| JobError::UnknownJob(public_id.to_string()))?;

        let state = self
            .queue
            .fetch(&internal)
            .await?
            .ok_or_else(|| JobError::JobNotFound(public_id.to_string()))?;

        match state {
            BackendJobState::Queued => Ok(JobStatusView::Queued),
            BackendJobState::Started => Ok(JobStatusView::InProgress),
            BackendJobState::Finished(result) => Ok(JobStatusView::Completed { result }),
            BackendJobState::Failed(_) => Ok(JobStatusView::Failed),
            BackendJobState::Other(state) => {
                tracing::error!(
                    public_id = %public_id,
                    internal_id = %internal,
                    state = %state,
                    "Queue backend reported an unknown job state"
                );
                Err(JobError::BackendInconsistency {
                    public_id: public_id.to_string(),
                    state,
                })
            }
        }
    }

    /// Draw a public id uniformly over the configured digit width.
    pub fn mint_id(&self) -> String {
        let width = self.config.id_digits.clamp(1, MAX_ID_DIGITS);
        let n = rand::thread_rng().gen_range(0..10u64.pow(width));
        format!("{:0width$}", n, width = width as usize)
    }

    /// Draws allowed per submission before a live id is overwritten
    fn id_attempts(&self) -> usize {
        match self.config.collision_policy {
            IdCollisionPolicy::Overwrite => 1,
            IdCollisionPolicy::Regenerate { max_attempts } => max_attempts.max(1),
        }
    }
}
