//! HTTP surface
//!
//! `POST /chat` answers a question once the service is ready; `GET /health`
//! reports the initialization snapshot and always answers 200. Errors from the
//! service are mapped to status codes here and nowhere else.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::QaError;
use crate::service::{InitState, RetrievalService, StatusSnapshot};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RetrievalService>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
    pub confidence: f32,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),
    /// 503, carrying the lifecycle state at the time of the request
    NotReady { message: String, status: InitState },
    /// 500
    Internal(String),
}

impl ApiError {
    fn from_service(error: QaError, snapshot: &StatusSnapshot) -> Self {
        match error {
            QaError::InvalidInput(message) => Self::BadRequest(message),
            QaError::NotReady(message) => Self::NotReady {
                message,
                status: snapshot.status,
            },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                debug!("Rejecting chat request: {}", message);
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::NotReady { message, status } => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": format!("Knowledge base not initialized: {message}"),
                    "status": status,
                })),
            )
                .into_response(),
            Self::Internal(message) => {
                error!("Chat request failed: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message })))
                    .into_response()
            }
        }
    }
}

/// Build the router for `service`.
#[inline]
pub fn router(service: Arc<RetrievalService>) -> Router {
    // The chat widget is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

/// Serve `service` on `listener` until `shutdown` resolves.
#[inline]
pub async fn serve<F>(
    listener: TcpListener,
    service: Arc<RetrievalService>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    })?;
    let message = request.message.unwrap_or_default();

    let answer = state
        .service
        .answer(&message)
        .await
        .map_err(|e| ApiError::from_service(e, &state.service.status()))?;

    Ok(Json(ChatResponse {
        response: answer.answer,
        confidence: answer.score,
    }))
}

async fn health(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(StatusSnapshot::clone(&state.service.status()))
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
