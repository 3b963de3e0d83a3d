//! Turn endpoint
//!
//! `POST /api/turn` claims a turn and returns as soon as the controller is
//! listening; progress is reported on `/ws/events`.

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Serialize;

use super::{ApiError, ApiState};
use crate::TurnStatus;

/// Build turn router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/turn", post(start_turn))
        .with_state(state)
}

/// Turn accepted response
#[derive(Debug, Serialize)]
pub struct TurnAccepted {
    pub status: TurnStatus,
    pub text: &'static str,
}

/// Start a turn
async fn start_turn(
    State(state): State<Arc<ApiState>>,
) -> Result<(StatusCode, Json<TurnAccepted>), ApiError> {
    if Arc::clone(&state.controller).start_turn().await?.is_none() {
        return Err(ApiError::Ignored);
    }

    let status = state.controller.status();
    Ok((
        StatusCode::ACCEPTED,
        Json(TurnAccepted {
            status,
            text: status.display_text(),
        }),
    ))
}
