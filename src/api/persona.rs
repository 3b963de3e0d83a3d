//! Persona and tone endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::{PersonaConfig, Tone};

/// Build persona router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/persona", get(get_persona).put(update_persona))
        .route("/api/tones", get(list_tones))
        .with_state(state)
}

/// Get the active persona
async fn get_persona(State(state): State<Arc<ApiState>>) -> Json<PersonaConfig> {
    Json(state.controller.persona().await)
}

/// Partial persona update; absent fields keep their value
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaUpdate {
    pub user_name: Option<String>,
    pub tone: Option<String>,
    pub assistant_name: Option<String>,
}

/// Update the persona used by the next turn
async fn update_persona(
    State(state): State<Arc<ApiState>>,
    Json(update): Json<PersonaUpdate>,
) -> Result<Json<PersonaConfig>, ApiError> {
    let mut persona = state.controller.persona().await;

    if let Some(name) = update.user_name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::BadRequest("userName must not be empty".to_string()));
        }
        persona.user_name = name.to_string();
    }

    if let Some(tone) = update.tone {
        persona.tone = tone.parse()?;
    }

    if let Some(name) = update.assistant_name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::BadRequest(
                "assistantName must not be empty".to_string(),
            ));
        }
        persona.assistant_name = name.to_string();
    }

    state.controller.set_persona(persona.clone()).await;
    Ok(Json(persona))
}

/// Tone option for selectors
#[derive(Debug, Serialize)]
pub struct ToneInfo {
    pub value: Tone,
    pub label: &'static str,
}

/// List the supported tones
async fn list_tones() -> Json<Vec<ToneInfo>> {
    Json(
        Tone::ALL
            .iter()
            .map(|&tone| ToneInfo {
                value: tone,
                label: tone.label(),
            })
            .collect(),
    )
}
