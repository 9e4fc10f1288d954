//! Job lifecycle tests against scripted queue backends.

use netsweep::error::{BackendError, JobError};
use netsweep::id_store::JobIdStore;
use netsweep::job::PerturbationRequest;
use netsweep::manager::{IdCollisionPolicy, JobManager, JobStatusView, ManagerConfig};
use netsweep::queue::{BackendJobState, InternalJobId, JobQueue};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backend whose reachability and reported state are set by the test
struct ScriptedQueue {
    reachable: AtomicBool,
    state: Mutex<Option<BackendJobState>>,
    enqueued: AtomicUsize,
    last_timeout: Mutex<Option<Duration>>,
}

impl ScriptedQueue {
    fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            state: Mutex::new(Some(BackendJobState::Queued)),
            enqueued: AtomicUsize::new(0),
            last_timeout: Mutex::new(None),
        }
    }

    fn set_state(&self, state: Option<BackendJobState>) {
        *self.state.lock().unwrap() = state;
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("connection refused".to_string()))
        }
    }
}

impl JobQueue for ScriptedQueue {
    async fn enqueue(
        &self,
        _request: PerturbationRequest,
        timeout: Duration,
    ) -> Result<InternalJobId, BackendError> {
        self.check()?;
        *self.last_timeout.lock().unwrap() = Some(timeout);
        let n = self.enqueued.fetch_add(1, Ordering::SeqCst);
        Ok(InternalJobId(format!("rq-{}", n)))
    }

    async fn fetch(&self, _id: &InternalJobId) -> Result<Option<BackendJobState>, BackendError> {
        self.check()?;
        Ok(self.state.lock().unwrap().clone())
    }
}

fn request_body() -> Value {
    json!({
        "graphml": "<graphml/>",
        "remove_max": 0.2,
        "nrepeats": 2,
        "granularity": 3,
        "method": "random",
    })
}

fn manager_with(queue: Arc<ScriptedQueue>, config: ManagerConfig) -> JobManager<ScriptedQueue> {
    JobManager::new(queue, JobIdStore::new(1000, Duration::from_secs(60)), config)
}

#[tokio::test]
async fn test_status_translates_every_backend_state() {
    let queue = Arc::new(ScriptedQueue::new());
    let manager = manager_with(Arc::clone(&queue), ManagerConfig::default());
    let id = manager.submit(&request_body()).await.unwrap();

    queue.set_state(Some(BackendJobState::Queued));
    assert_eq!(manager.status(&id).await.unwrap(), JobStatusView::Queued);

    queue.set_state(Some(BackendJobState::Started));
    assert_eq!(manager.status(&id).await.unwrap(), JobStatusView::InProgress);

    queue.set_state(Some(BackendJobState::Finished(json!({"mean": [1.0]}))));
    assert_eq!(
        manager.status(&id).await.unwrap(),
        JobStatusView::Completed {
            result: json!({"mean": [1.0]})
        }
    );

    queue.set_state(Some(BackendJobState::Failed("timeout".into())));
    assert_eq!(manager.status(&id).await.unwrap(), JobStatusView::Failed);
}

#[tokio::test]
async fn test_unexpected_state_is_inconsistency() {
    let queue = Arc::new(ScriptedQueue::new());
    let manager = manager_with(Arc::clone(&queue), ManagerConfig::default());
    let id = manager.submit(&request_body()).await.unwrap();

    queue.set_state(Some(BackendJobState::Other("deferred".into())));
    match manager.status(&id).await {
        Err(JobError::BackendInconsistency { state, .. }) => assert_eq!(state, "deferred"),
        other => panic!("expected inconsistency, got {:?}", other),
    }
}

#[tokio::test]
async fn test_expired_backend_job_is_not_found() {
    let queue = Arc::new(ScriptedQueue::new());
    let manager = manager_with(Arc::clone(&queue), ManagerConfig::default());
    let id = manager.submit(&request_body()).await.unwrap();

    queue.set_state(None);
    assert!(matches!(
        manager.status(&id).await,
        Err(JobError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn test_unreachable_backend_is_retryable() {
    let queue = Arc::new(ScriptedQueue::new());
    let manager = manager_with(Arc::clone(&queue), ManagerConfig::default());
    let id = manager.submit(&request_body()).await.unwrap();

    queue.reachable.store(false, Ordering::SeqCst);

    let err = manager.submit(&request_body()).await.unwrap_err();
    assert!(matches!(err, JobError::BackendUnavailable(_)));
    assert!(err.is_retryable());

    let err = manager.status(&id).await.unwrap_err();
    assert!(err.is_retryable());

    // validation still wins over backend state
    let err = manager.submit(&json!({})).await.unwrap_err();
    assert!(matches!(err, JobError::Validation(_)));
}

#[tokio::test]
async fn test_never_minted_id_is_unknown_even_if_backend_down() {
    let queue = Arc::new(ScriptedQueue::new());
    queue.reachable.store(false, Ordering::SeqCst);
    let manager = manager_with(Arc::clone(&queue), ManagerConfig::default());

    assert!(matches!(
        manager.status("123456").await,
        Err(JobError::UnknownJob(_))
    ));
}

#[tokio::test]
async fn test_submission_carries_configured_timeout() {
    let queue = Arc::new(ScriptedQueue::new());
    let manager = manager_with(
        Arc::clone(&queue),
        ManagerConfig {
            job_timeout: Duration::from_secs(42),
            ..Default::default()
        },
    );

    manager.submit(&request_body()).await.unwrap();
    assert_eq!(*queue.last_timeout.lock().unwrap(), Some(Duration::from_secs(42)));
}

#[tokio::test]
async fn test_overwrite_policy_reuses_ids() {
    // a single-digit id space forces collisions well within twenty submissions
    let queue = Arc::new(ScriptedQueue::new());
    let manager = manager_with(
        Arc::clone(&queue),
        ManagerConfig {
            id_digits: 1,
            collision_policy: IdCollisionPolicy::Overwrite,
            ..Default::default()
        },
    );

    for _ in 0..20 {
        manager.submit(&request_body()).await.unwrap();
    }

    assert_eq!(queue.enqueued.load(Ordering::SeqCst), 20);
    assert!(manager.id_store().len() <= 10);
}
