//! HTTP surface of the relay
//!
//! - `POST /ai/chat` - run the orchestrator over a posted conversation
//! - `GET /health` - liveness probe
//! - `GET /metrics` - Prometheus text exposition

pub mod chat;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::agent::Orchestrator;
use crate::config::Settings;
use crate::metrics;
use crate::security::RateLimiter;
use crate::tools::ToolRegistry;

pub use chat::{ChatRequest, ChatResponse, IncomingMessage, ServerError};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// `None` disables rate limiting
    pub limiter: Option<Arc<RateLimiter>>,
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ai/chat", post(chat::chat))
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// CORS for the browser UI
///
/// `"*"` allows any origin without credentials; anything else is treated as
/// a single origin with credentials allowed.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, ServerError> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origin == "*" {
        return Ok(layer.allow_origin(Any));
    }

    let origin = HeaderValue::from_str(origin)
        .map_err(|e| ServerError::BadRequest(format!("invalid CORS origin '{}': {}", origin, e)))?;
    Ok(layer.allow_origin(origin).allow_credentials(true))
}

/// Bind and serve until the process is stopped
pub async fn serve(settings: &Settings) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let policy = Arc::new(settings.command_policy()?);
    let model = settings.model_client()?;
    let tools = Arc::new(ToolRegistry::new(policy.clone()));
    let orchestrator = Arc::new(Orchestrator::new(model, tools, settings.agent_config()));

    let state = AppState {
        orchestrator,
        limiter: settings.rate_limiter().map(Arc::new),
    };

    let app = create_router(state).layer(cors_layer(&settings.cors_origin)?);

    info!(
        bind = %settings.bind,
        workspace = %policy.workspace_root.display(),
        provider = ?settings.provider,
        model = %settings.model_name(),
        "Server listening"
    );

    let listener = tokio::net::TcpListener::bind(settings.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl-c");
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn prometheus_metrics() -> impl IntoResponse {
    match metrics::gather() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, metrics::content_type())],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
