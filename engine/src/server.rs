//! HTTP API server
//!
//! Exposes the orchestrator to remote clients.
//!
//! # Endpoints
//!
//! - POST /agent/chat - Run one query, `{"query": ...}` → `{"response": ...}`
//! - GET /health - Liveness check
//!
//! All requests share one orchestrator and therefore one conversation; runs
//! are serialized behind a mutex.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use sdk::errors::{EngineError, ExaErrorExt};

use crate::agent::Orchestrator;

/// Body of POST /agent/chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

/// Reply of POST /agent/chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Clone)]
struct ServerState {
    orchestrator: Arc<Mutex<Orchestrator>>,
}

/// Failure of a chat request, rendered as a JSON error body
enum ApiError {
    EmptyQuery,
    Run(EngineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::EmptyQuery => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Query must not be empty"})),
            )
                .into_response(),
            Self::Run(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": e.to_string(),
                    "hint": e.user_hint(),
                })),
            )
                .into_response(),
        }
    }
}

/// Build the API router around a shared orchestrator
pub fn router(orchestrator: Arc<Mutex<Orchestrator>>) -> Router {
    let state = ServerState { orchestrator };

    Router::new()
        .route("/agent/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C
pub async fn serve(orchestrator: Orchestrator, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on http://{}", listener.local_addr()?);

    let app = router(Arc::new(Mutex::new(orchestrator)));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

async fn chat_handler(
    State(state): State<ServerState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::EmptyQuery);
    }

    let mut orchestrator = state.orchestrator.lock().await;
    let outcome = orchestrator.orchestrate(query).await.map_err(ApiError::Run)?;

    Ok(Json(ChatResponse {
        response: outcome.into_text(),
    }))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
