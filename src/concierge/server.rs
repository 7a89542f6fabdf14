//! Concierge HTTP surface: a small chat UI and its JSON API.
//!
//! - `GET  /`              chat page
//! - `POST /api/sessions`  start a conversation
//! - `POST /api/chat`      send a message
//! - `GET  /api/agents`    reachable sellers
//! - `GET  /health`

use super::runner::{ChatReply, Concierge};
use crate::a2a::types::Metadata;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const INDEX_HTML: &str = include_str!("../../static/index.html");

#[derive(Clone)]
pub struct ConciergeState {
    pub concierge: Arc<Concierge>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

pub fn build_router(state: ConciergeState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/sessions", post(create_session))
        .route("/api/chat", post(chat))
        .route("/api/agents", get(list_agents))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(host: &str, port: u16, state: ConciergeState) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = crate::a2a::server::bind(host, port).await?;
    tracing::info!(
        "Starting purchasing concierge on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(crate::a2a::server::shutdown_signal())
        .await?;

    tracing::info!("Purchasing concierge stopped");
    Ok(())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn create_session(State(state): State<ConciergeState>) -> Json<serde_json::Value> {
    let session_id = state.concierge.sessions().create().await;
    Json(serde_json::json!({ "session_id": session_id }))
}

async fn chat(State(state): State<ConciergeState>, Json(request): Json<ChatRequest>) -> Response {
    if request.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message must not be empty");
    }

    match state
        .concierge
        .run_turn(
            request.session_id.as_deref(),
            &request.message,
            request.metadata,
        )
        .await
    {
        Ok(reply) => Json::<ChatReply>(reply).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

async fn list_agents(State(state): State<ConciergeState>) -> Json<serde_json::Value> {
    Json(serde_json::json!(state.concierge.agent().list_remote_agents()))
}

async fn health_check(State(state): State<ConciergeState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "agent": super::agent::AGENT_NAME,
        "version": crate::VERSION,
        "sellers": state.concierge.agent().list_remote_agents().len(),
        "sessions": state.concierge.sessions().len().await,
    }))
}
