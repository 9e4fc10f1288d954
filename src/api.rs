//! REST API for submitting perturbation sweeps and polling their status.
//!
//! The HTTP layer is a thin adapter over [`JobManager`]: it decodes request
//! bodies, forwards them, and maps manager errors onto status codes.

use crate::error::JobError;
use crate::manager::{JobManager, JobStatusView, SubmitResponse};
use crate::queue::JobQueue;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
pub struct ApiState<Q: JobQueue> {
    pub manager: Arc<JobManager<Q>>,
}

impl<Q: JobQueue> Clone for ApiState<Q> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// Unknown or expired job
    NotFound(String),
    /// Invalid request
    BadRequest(String),
    /// Internal server error
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Validation(_) => ApiError::BadRequest(err.to_string()),
            JobError::UnknownJob(_) | JobError::JobNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            JobError::BackendUnavailable(_) | JobError::BackendInconsistency { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

/// Create the API router
pub fn create_router<Q: JobQueue>(state: ApiState<Q>) -> Router {
    Router::new()
        .route("/jobs", post(submit_job::<Q>).get(missing_job_id))
        .route("/jobs/:id", get(get_job_status::<Q>))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /jobs - Submit a perturbation sweep
async fn submit_job<Q: JobQueue>(
    State(state): State<ApiState<Q>>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    // an empty body is an empty request, so the first missing field is reported
    let request: Value = if body.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?
    };

    let id = state.manager.submit(&request).await?;
    Ok(Json(SubmitResponse::queued(id)))
}

/// GET /jobs/:id - Poll a job
async fn get_job_status<Q: JobQueue>(
    State(state): State<ApiState<Q>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusView>, ApiError> {
    let view = state.manager.status(&id).await?;
    Ok(Json(view))
}

/// GET /jobs - Poll without an id
async fn missing_job_id() -> ApiError {
    ApiError::BadRequest("Job id is required".to_string())
}

/// GET /health
async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Start the API server
///
/// # Arguments
/// * `manager` - The job manager to expose
/// * `bind_addr` - Address to bind the API server (e.g., "0.0.0.0:8000")
pub async fn start_api_server<Q: JobQueue>(
    manager: Arc<JobManager<Q>>,
    bind_addr: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(ApiState { manager });

    let addr: SocketAddr = bind_addr.parse()?;

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
