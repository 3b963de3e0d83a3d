//! Health check and status endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;
use crate::{OverlapPolicy, TurnStatus};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Controller status for the UI
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: TurnStatus,
    /// Text shown next to the status indicator
    pub text: &'static str,
    /// Whether the start control is enabled
    pub start_enabled: bool,
    pub overlap: OverlapPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Get controller status
async fn status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    let controller = &state.controller;
    let status = controller.status();

    Json(StatusResponse {
        status,
        text: status.display_text(),
        start_enabled: status.start_enabled(),
        overlap: controller.overlap(),
        last_error: controller.last_error(),
    })
}

/// Build status router
pub fn status_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .with_state(state)
}
