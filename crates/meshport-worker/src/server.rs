//! Push-event webhook.
//!
//! - `POST /events` runs an S3 event payload through the job runner and
//!   answers with the handler response, using its `statusCode` as the HTTP
//!   status.
//! - `GET /health` liveness.
//! - `GET /metrics` pipeline metrics snapshot.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use meshport_converter::MetricsSnapshot;
use meshport_core::config::server::ServerConfig;
use meshport_core::error::AppError;
use meshport_core::result::AppResult;
use meshport_core::types::KeyLayout;

use crate::report::HandlerResponse;
use crate::runner::JobRunner;
use crate::source::PushEventSource;

/// Shared state of the webhook handlers.
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Runner processing each payload.
    pub runner: Arc<JobRunner>,
    /// Bucket for records that name none.
    pub default_bucket: String,
    /// Key layout of incoming object keys.
    pub layout: KeyLayout,
}

/// Build the webhook router.
pub fn build_router(state: ServerState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/events", post(handle_events))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until `shutdown` flips.
pub async fn serve(
    state: ServerState,
    config: &ServerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> AppResult<()> {
    let app = build_router(state, config.body_limit_bytes);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    info!(%addr, "Webhook server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            info!("Webhook server shutting down");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))
}

/// POST /events
async fn handle_events(
    State(state): State<ServerState>,
    body: String,
) -> (StatusCode, Json<HandlerResponse>) {
    let mut source = PushEventSource::from_json(&body, &state.default_bucket, state.layout);

    let response = match state.runner.run_once(&mut source).await {
        Ok(report) => report.to_response(),
        Err(e) => {
            error!(error = %e, "Failed to process event payload");
            HandlerResponse {
                status_code: 500,
                headers: Default::default(),
                body: json!({ "message": e.to_string() }).to_string(),
                is_base64_encoded: false,
            }
        }
    };

    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response))
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /metrics
async fn metrics(State(state): State<ServerState>) -> Json<MetricsSnapshot> {
    Json(state.runner.pipeline().metrics().snapshot())
}
