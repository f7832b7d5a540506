
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crucible::api::{router, ApiState};
use crucible::config::ScalingConfig;
use crucible::orchestrator::Orchestrator;
use crucible::queue::{InMemoryQueue, JobQueue};
use test_support::FakeCluster;

fn test_app() -> (Router, Arc<InMemoryQueue>) {
    let queue = Arc::new(InMemoryQueue::new());
    let orchestrator = Arc::new(Orchestrator::new(
        queue.clone(),
        Arc::new(FakeCluster::new(3)),
        ScalingConfig::default(),
    ));
    (router(ApiState { orchestrator }), queue)
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn submission(problem: &str) -> Value {
    json!({
        "source_code": "print('hi')",
        "language_id": 71,
        "problem_id": problem,
    })
}

#[tokio::test]
async fn test_batch_submit_returns_tokens_in_order() {
    let (app, queue) = test_app();

    let (status, body) = post_json(
        app,
        "/submit/batch",
        json!({ "submissions": [submission("p1"), submission("p2")] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let tokens = body["tokens"].as_array().unwrap();
    assert_eq!(tokens.len(), 2);
    assert_ne!(tokens[0], tokens[1]);
    assert_eq!(queue.len().await.unwrap(), 2);

    // Queue order matches token order.
    let first = queue
        .blocking_pop_left(std::time::Duration::from_millis(100))
        .await
        .unwrap()
        .unwrap();
    let first: Value = serde_json::from_str(&first).unwrap();
    assert_eq!(first["token"], tokens[0].clone());
    assert_eq!(first["problem_id"], "p1");
}

#[tokio::test]
async fn test_missing_submissions_field_is_rejected() {
    let (app, queue) = test_app();
    let (status, body) = post_json(app, "/submit/batch", json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("submissions"));
    assert_eq!(queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_non_list_submissions_is_rejected() {
    let (app, _queue) = test_app();
    let (status, _body) = post_json(app, "/submit/batch", json!({ "submissions": "nope" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let (app, _queue) = test_app();
    let (status, _body) = post_json(app, "/submit/batch", json!({ "submissions": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_element_rejects_whole_batch() {
    let (app, queue) = test_app();

    let (status, _body) = post_json(
        app,
        "/submit/batch",
        json!({ "submissions": [
            submission("p1"),
            { "language_id": 71, "problem_id": "p2" } // no source_code
        ]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    // All-or-nothing: the valid first element was not enqueued either.
    assert_eq!(queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _queue) = test_app();
    let (status, body) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_status_reports_backlog_and_workers() {
    let (app, queue) = test_app();
    queue.push_right("pending".to_string()).await.unwrap();

    let (status, body) = get_json(app, "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queued"], 1);
    assert_eq!(body["worker_count"], 3);
}
