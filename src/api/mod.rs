//! HTTP API server for Niko
//!
//! A front end drives turns through `POST /api/turn` and renders status
//! from `GET /api/status` or the `/ws/events` stream.

pub mod health;
pub mod persona;
pub mod turn;
pub mod websocket;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{Error, Result, TurnController};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<TurnController>,
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Create a server around a controller
    #[must_use]
    pub fn new(controller: Arc<TurnController>, port: u16) -> Self {
        Self {
            state: Arc::new(ApiState { controller }),
            port,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let router = Router::new()
            .merge(turn::router(self.state.clone()))
            .merge(persona::router(self.state.clone()))
            .merge(websocket::router(self.state.clone()))
            .merge(health::router())
            .merge(health::status_router(self.state.clone()));

        // CORS layer for cross-origin requests from frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// API errors
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Turn request dropped under the ignore policy
    Ignored,
    Turn(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Turn(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Ignored => (
                StatusCode::CONFLICT,
                "ignored",
                "a turn is already in progress".to_string(),
            ),
            Self::Turn(e) => {
                let status = match &e {
                    Error::Busy(_) => StatusCode::CONFLICT,
                    Error::CaptureUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    Error::UnknownTone(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
                    Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.code(), e.to_string())
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
