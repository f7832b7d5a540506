//! HTTP surface of the orchestrator: batch submission, health, and a
//! read-only status endpoint.
//!
//! Batch validation is all-or-nothing: every element is checked before
//! anything is enqueued, and a single invalid element rejects the whole
//! batch with no tokens returned.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::job::JobInput;
use crate::orchestrator::Orchestrator;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/submit/batch", post(submit_batch_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn submit_batch_handler(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> Response {
    let inputs = match parse_batch(&body) {
        Ok(inputs) => inputs,
        Err(reason) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response();
        }
    };

    match state.orchestrator.submit_batch(inputs).await {
        Ok(tokens) => (StatusCode::OK, Json(json!({ "tokens": tokens }))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Batch submission failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn status_handler(State(state): State<ApiState>) -> Response {
    match state.orchestrator.queue_status().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read queue status");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Validate the whole batch up front so no partial batch is enqueued.
fn parse_batch(body: &Value) -> std::result::Result<Vec<JobInput>, String> {
    let submissions = body
        .get("submissions")
        .ok_or_else(|| "submissions field is required".to_string())?;
    let list = submissions
        .as_array()
        .ok_or_else(|| "submissions must be a list".to_string())?;
    if list.is_empty() {
        return Err("submissions must not be empty".to_string());
    }

    list.iter()
        .enumerate()
        .map(|(index, element)| {
            serde_json::from_value::<JobInput>(element.clone())
                .map_err(|e| format!("submission {index} is invalid: {e}"))
        })
        .collect()
}
