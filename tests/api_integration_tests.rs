//! Integration Tests for REST API
//!
//! These tests drive the job endpoints end-to-end against the in-memory queue
//! and a live worker pool.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use netsweep::api::{create_router, ApiState};
use netsweep::id_store::JobIdStore;
use netsweep::manager::{JobManager, ManagerConfig};
use netsweep::queue::InMemoryQueue;
use netsweep::worker::WorkerPool;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

const CHAIN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <graph id="G" edgedefault="directed">
    <node id="1"/><node id="2"/><node id="3"/><node id="4"/><node id="5"/>
    <edge source="1" target="2"/>
    <edge source="2" target="3"/>
    <edge source="3" target="4"/>
    <edge source="4" target="5"/>
  </graph>
</graphml>"#;

/// Helper to create a router backed by an in-memory queue
fn create_app() -> (Router, Arc<InMemoryQueue>) {
    let queue = Arc::new(InMemoryQueue::default());
    let ids = JobIdStore::new(1000, Duration::from_secs(600));
    let manager = Arc::new(JobManager::new(
        Arc::clone(&queue),
        ids,
        ManagerConfig::default(),
    ));
    (create_router(ApiState { manager }), queue)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn post_job(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/jobs")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn chain_request(method: &str) -> Value {
    json!({
        "graphml": CHAIN,
        "remove_max": 1.0,
        "nrepeats": 3,
        "granularity": 1,
        "method": method,
    })
}

#[tokio::test]
async fn test_submit_returns_public_id() {
    let (app, _queue) = create_app();

    let (status, body) = send(&app, post_job(chain_request("random").to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "queued for processing");
    let id = body["id"].as_str().unwrap();
    assert_eq!(id.len(), 6);
    assert!(id.chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn test_poll_immediately_after_submit() {
    let (app, _queue) = create_app();

    let (_, body) = send(&app, post_job(chain_request("random").to_string())).await;
    let id = body["id"].as_str().unwrap().to_string();

    // no workers: the job stays queued
    let (status, body) = send(&app, get(&format!("/jobs/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "queued for processing"}));
}

#[tokio::test]
async fn test_full_lifecycle_with_workers() {
    let (app, queue) = create_app();
    let pool = WorkerPool::spawn(Arc::clone(&queue), 2);

    let (_, body) = send(&app, post_job(chain_request("outdegree").to_string())).await;
    let id = body["id"].as_str().unwrap().to_string();

    let mut completed = None;
    for _ in 0..300 {
        let (status, body) = send(&app, get(&format!("/jobs/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        match body["status"].as_str() {
            Some("completed") => {
                completed = Some(body);
                break;
            }
            Some("queued for processing") | Some("in progress") => {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            other => panic!("unexpected status {:?}", other),
        }
    }
    pool.shutdown();

    let body = completed.expect("job never completed");
    let result = &body["result"];
    assert_eq!(result["node-count"], 5);
    assert_eq!(result["edge-count"], 4);
    assert_eq!(result["repeats"], 1);
    assert_eq!(result["removed"], json!([1, 2, 3, 4]));
    assert_eq!(result["mean"], json!([1.5, 1.25, 1.0, null]));
}

#[tokio::test]
async fn test_broken_graph_completes_with_error_body() {
    let (app, queue) = create_app();
    let pool = WorkerPool::spawn(Arc::clone(&queue), 1);

    let mut request = chain_request("random");
    request["graphml"] = json!("<graphml><graph>");
    let (_, body) = send(&app, post_job(request.to_string())).await;
    let id = body["id"].as_str().unwrap().to_string();

    let mut result = None;
    for _ in 0..300 {
        let (_, body) = send(&app, get(&format!("/jobs/{}", id))).await;
        if body["status"] == "completed" {
            result = Some(body["result"].clone());
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    pool.shutdown();

    let result = result.expect("job never completed");
    assert!(result["error"].as_str().unwrap().contains("graph parse error"));
}

#[tokio::test]
async fn test_missing_field_is_bad_request() {
    let (app, queue) = create_app();

    let mut request = chain_request("random");
    request.as_object_mut().unwrap().remove("granularity");
    let (status, body) = send(&app, post_job(request.to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("granularity"));
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_type_mismatch_is_bad_request() {
    let (app, _queue) = create_app();

    let mut request = chain_request("random");
    request["remove_max"] = json!("abc");
    let (status, body) = send(&app, post_job(request.to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("remove_max"));
    assert!(message.contains("type mismatch"));
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let (app, _queue) = create_app();

    let (status, body) = send(&app, post_job("{not json".to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid JSON"));
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let (app, _queue) = create_app();

    let (status, body) = send(&app, get("/jobs/000000")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("000000"));
}

#[tokio::test]
async fn test_poll_without_id_is_bad_request() {
    let (app, _queue) = create_app();

    let (status, _) = send(&app, get("/jobs")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health() {
    let (app, _queue) = create_app();

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}
