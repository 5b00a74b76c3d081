//! HTTP surface: the platform webhook plus the cached read endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::admission::{Admission, AdmissionFilter};
use crate::aggregate::Aggregator;
use crate::cache::CacheRead;
use crate::config::ServerConfig;
use crate::error::AggregationError;
use crate::platform::telegram::{price_reply, FETCH_FAILURE_NOTICE};
use crate::platform::{ChatReplier, Update};

const CACHE_STATUS_HEADER: &str = "x-cache-status";
const CERTIFICATE_CONTENT_TYPE: &str = "application/x-x509-ca-cert";

/// Shared application state
pub struct AppState {
    pub filter: AdmissionFilter,
    pub aggregator: Aggregator,
    pub replier: Arc<dyn ChatReplier>,
    pub public_key_path: PathBuf,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root).post(webhook))
        .route("/token-info", get(token_info))
        .route("/charity-progress", get(charity_progress))
        .route("/public-key", get(public_key))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until ctrl-c.
pub async fn serve(state: Arc<AppState>, config: &ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind, config.port))?;

    info!("Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

// Error response type
struct AppError(StatusCode, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

fn upstream_failure(err: Arc<AggregationError>) -> AppError {
    AppError(StatusCode::BAD_GATEWAY, err.to_string())
}

fn with_cache_status(status: &'static str, body: impl IntoResponse) -> Response {
    ([(CACHE_STATUS_HEADER, status)], body).into_response()
}

async fn root() -> &'static str {
    "Hello World!"
}

/// Answer an admitted `/price` command.
///
/// Token info comes through the five-minute cache, so a reply may quote a
/// price up to one TTL old. A stale read means the refresh just failed and is
/// handled like any other fetch failure: notice to the chat, 500 to the platform.
async fn webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<StatusCode, AppError> {
    // A `message` that does not look like one counts as no message at all.
    let update = serde_json::from_value::<Update>(payload).unwrap_or_else(|e| {
        debug!("Unrecognised webhook payload: {}", e);
        Update::default()
    });

    let message = match (state.filter.admit(&update, Utc::now()), &update.message) {
        (Admission::Admit, Some(message)) => message,
        (Admission::Reject(reason), _) => {
            info!("Ignoring update: {}", reason);
            return Ok(StatusCode::OK);
        }
        (Admission::Admit, None) => return Ok(StatusCode::OK),
    };

    let chat_id = message.chat_id();
    info!("Answering message {} in chat {}", message.id, chat_id);

    let fetched = match state.aggregator.token_info().await {
        Ok(CacheRead::Stale { error, .. }) => Err(error),
        Ok(read) => Ok(read.into_value().info),
        Err(error) => Err(error),
    };
    let info = match fetched {
        Ok(info) => info,
        Err(e) => {
            error!("Token info unavailable for chat {}: {}", chat_id, e);
            if let Err(delivery) = state.replier.send_text(chat_id, FETCH_FAILURE_NOTICE).await {
                warn!("{}", delivery);
            }
            return Err(AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    state
        .replier
        .send_text(chat_id, &price_reply(&info))
        .await
        .map_err(|e| {
            error!("{}", e);
            AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    Ok(StatusCode::OK)
}

async fn token_info(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let read = state.aggregator.token_info().await.map_err(upstream_failure)?;
    Ok(with_cache_status(read.status(), Json(&read.value().raw)))
}

async fn charity_progress(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let read = state
        .aggregator
        .charity_progress()
        .await
        .map_err(upstream_failure)?;
    Ok(with_cache_status(read.status(), Json(read.value())))
}

async fn public_key(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    match tokio::fs::read(&state.public_key_path).await {
        Ok(bytes) => {
            Ok(([(header::CONTENT_TYPE, CERTIFICATE_CONTENT_TYPE)], bytes).into_response())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError(
            StatusCode::NOT_FOUND,
            "public key not found".to_string(),
        )),
        Err(e) => {
            error!(
                "Failed to read public key {}: {}",
                state.public_key_path.display(),
                e
            );
            Err(AppError(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read public key".to_string(),
            ))
        }
    }
}
