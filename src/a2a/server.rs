//! A2A seller HTTP server powered by axum.
//!
//! Serves:
//! - `GET  /.well-known/agent.json`  Agent Card discovery
//! - `GET  /.well-known/jwks.json`   push notification signing keys
//! - `POST /`                        JSON-RPC 2.0 endpoint (authenticated)
//! - `GET  /health`                  health check

use crate::a2a::auth::AuthScheme;
use crate::a2a::handler::{self, TaskHandler};
use crate::a2a::push::{JwksResponse, PushNotificationSender};
use crate::a2a::types::*;
use axum::{
    Router,
    body::Bytes,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use anyhow::Context;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state for a seller server.
#[derive(Clone)]
pub struct A2aState {
    pub card: Arc<AgentCard>,
    pub auth: AuthScheme,
    pub handler: Arc<dyn TaskHandler>,
    pub push: Option<PushNotificationSender>,
}

/// Build the axum router for a seller.
pub fn build_router(state: A2aState) -> Router {
    let rpc = Router::new()
        .route("/", post(handle_jsonrpc))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/.well-known/agent.json", get(get_agent_card))
        .route("/.well-known/jwks.json", get(get_jwks))
        .route("/health", get(health_check))
        .merge(rpc)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `host:port` and serve until Ctrl-C.
pub async fn start_server(host: &str, port: u16, state: A2aState) -> anyhow::Result<()> {
    let name = state.card.name.clone();
    let app = build_router(state);
    let listener = bind(host, port).await?;
    let addr = listener.local_addr()?;

    tracing::info!("Starting {} on http://{}", name, addr);
    tracing::info!("   Agent Card: http://{}/.well-known/agent.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("{} stopped", name);
    Ok(())
}

/// Bind `host:port`; `host` may be a hostname, an IPv4 or a bare IPv6 address.
pub async fn bind(host: &str, port: u16) -> anyhow::Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))
}

/// Resolves on Ctrl-C (and SIGTERM on unix) so containers stop cleanly.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Rejects JSON-RPC calls that fail the seller's auth scheme with 401.
async fn require_auth(State(state): State<A2aState>, req: Request, next: Next) -> Response {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match state.auth.verify(header) {
        Ok(()) => next.run(req).await,
        Err(e) => {
            tracing::warn!("A2A: Rejected request: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// GET /.well-known/agent.json: Agent Card discovery.
async fn get_agent_card(State(state): State<A2aState>) -> Json<AgentCard> {
    Json(state.card.as_ref().clone())
}

/// GET /.well-known/jwks.json: public signing keys.
async fn get_jwks(State(state): State<A2aState>) -> Json<JwksResponse> {
    Json(
        state
            .push
            .as_ref()
            .map(PushNotificationSender::jwks)
            .unwrap_or(JwksResponse { keys: vec![] }),
    )
}

/// POST /: JSON-RPC 2.0 endpoint.
async fn handle_jsonrpc(
    State(state): State<A2aState>,
    body: Bytes,
) -> (StatusCode, Json<JsonRpcResponse>) {
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("A2A: Unparseable request body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error(
                    serde_json::Value::Null,
                    JsonRpcError::parse_error(),
                )),
            );
        }
    };

    let req: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(req) => req,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error(
                    serde_json::Value::Null,
                    JsonRpcError::invalid_request(Some(serde_json::json!(e.to_string()))),
                )),
            );
        }
    };

    if req.jsonrpc != JSONRPC_VERSION {
        return (
            StatusCode::BAD_REQUEST,
            Json(JsonRpcResponse::error(
                req.id,
                JsonRpcError::invalid_request(Some(serde_json::json!(
                    "Invalid JSON-RPC version, expected 2.0"
                ))),
            )),
        );
    }

    tracing::debug!("A2A: {} (id {})", req.method, req.id);
    let response = handler::dispatch(req, state.handler.as_ref()).await;
    (StatusCode::OK, Json(response))
}

/// GET /health: Health check.
async fn health_check(State(state): State<A2aState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "agent": state.card.name,
        "version": crate::VERSION,
        "protocol": "A2A",
    }))
}
