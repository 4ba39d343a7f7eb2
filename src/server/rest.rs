//! REST API endpoints.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use super::state::AppState;
use crate::sync::SyncStatusSnapshot;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub subscribers: usize,
    pub sync: SyncStatusSnapshot,
}

/// Create REST API router.
pub fn create_rest_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/status", get(status))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Status endpoint with poller statistics.
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let response = StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        subscribers: state.registry.len(),
        sync: state.status.snapshot(),
    };

    tracing::debug!(
        subscribers = response.subscribers,
        cycles = response.sync.cycles,
        "Status retrieved"
    );

    Json(response)
}
