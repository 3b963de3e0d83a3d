//! WebSocket stream of turn events

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use super::ApiState;
use crate::TurnEvent;

/// Incoming WebSocket message from client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsIncoming {
    /// Same as `POST /api/turn`
    Start,
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ws/events", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before sending the snapshot so no transition is missed
    let mut rx = state.controller.subscribe_events();

    let current = TurnEvent::status(state.controller.status());
    if let Ok(msg) = serde_json::to_string(&current) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            return;
        }
    }

    tracing::info!("events WebSocket connected");

    // Spawn task to forward turn events to WebSocket
    let mut broadcast_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "events WebSocket lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if let Ok(text) = serde_json::to_string(&event) {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => handle_message(&text, &state).await,
                Message::Close(_) => {
                    tracing::info!("events WebSocket closed by client");
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut broadcast_task => recv_task.abort(),
        _ = &mut recv_task => broadcast_task.abort(),
    }

    tracing::info!("events WebSocket disconnected");
}

/// Handle a single incoming message
///
/// Turn failures and missing capture reach the client as error events on
/// the stream. A start rejected because a turn is in flight publishes
/// nothing; the status events already show that turn.
async fn handle_message(text: &str, state: &Arc<ApiState>) {
    let incoming: WsIncoming = match serde_json::from_str(text) {
        Ok(incoming) => incoming,
        Err(e) => {
            tracing::warn!(error = %e, "invalid events WebSocket message");
            return;
        }
    };

    match incoming {
        WsIncoming::Start => {
            if let Err(e) = Arc::clone(&state.controller).start_turn().await {
                tracing::debug!(error = %e, "turn not started from WebSocket");
            }
        }
    }
}
