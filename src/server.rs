//! HTTP server for the display and feedback collaborators.
//!
//! This module provides a local HTTP surface that:
//! - Accepts classified frames via POST /frames
//! - Exposes the live stress window and alert via GET /live
//! - Drives the session lifecycle and feedback capture
//!
//! # Architecture
//!
//! ```text
//! Classifier ──→ POST /frames ──→ Monitor ──→ GET /live ──→ Dashboard
//!                                    ↑
//!             POST /session/{start,stop}, POST /feedback
//! ```
//!
//! All handlers go through one mutex around the [`Monitor`], so lifecycle
//! requests are serialized with frame processing.

use crate::collector::parse_line;
use crate::collector::types::{EmotionLabel, FrameEvent};
use crate::core::monitor::{FrameOutcome, LiveUpdate, LiveView, Monitor, MonitorSettings, SkipReason};
use crate::core::session::{FeedbackError, SessionId, StartOutcome};
use crate::core::summary::SessionSummary;
use crate::transparency::{create_shared_log, create_shared_log_with_persistence};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Engine settings
    pub settings: MonitorSettings,
    /// Where to persist transparency counters, if anywhere
    pub transparency_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, settings: MonitorSettings) -> Self {
        Self {
            port,
            settings,
            transparency_path: None,
        }
    }

    /// Persist transparency counters at `path` after each closed session.
    pub fn with_transparency_path(mut self, path: PathBuf) -> Self {
        self.transparency_path = Some(path);
        self
    }
}

/// Shared server state
pub struct ServerState {
    monitor: Mutex<Monitor>,
}

impl ServerState {
    /// Create new server state
    pub fn new(config: &ServerConfig) -> Self {
        let log = match &config.transparency_path {
            Some(path) => create_shared_log_with_persistence(path.clone()),
            None => create_shared_log(),
        };
        Self {
            monitor: Mutex::new(Monitor::with_transparency(config.settings, log)),
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        }),
    )
}

/// Response from the start endpoint
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: String,
    pub session_id: SessionId,
}

/// Response from the frame endpoint
#[derive(Debug, Serialize)]
pub struct FrameResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<LiveUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
}

/// Feedback submission
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub session_id: SessionId,
    pub labels: Vec<String>,
}

/// Response from the feedback endpoint
#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub status: String,
    pub session_id: SessionId,
    pub labels: Vec<EmotionLabel>,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /labels
async fn labels() -> Json<Vec<EmotionLabel>> {
    Json(EmotionLabel::ALL.to_vec())
}

/// POST /session/start
async fn start_session(State(state): State<Arc<ServerState>>) -> Json<StartResponse> {
    let outcome = state.monitor.lock().await.start();
    let status = match outcome {
        StartOutcome::Started(_) => "started",
        StartOutcome::AlreadyActive(_) => "already_active",
    };
    Json(StartResponse {
        status: status.to_string(),
        session_id: outcome.session_id(),
    })
}

/// POST /session/stop
async fn stop_session(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<SessionSummary>, ApiError> {
    let (summary, log) = {
        let mut monitor = state.monitor.lock().await;
        let summary = monitor
            .stop()
            .map_err(|e| api_error(StatusCode::CONFLICT, "NOT_ACTIVE", e))?;
        (summary, monitor.transparency().clone())
    };

    match tokio::task::spawn_blocking(move || log.save()).await {
        Ok(Err(e)) => tracing::warn!("Failed to save transparency log: {}", e),
        Err(e) => tracing::warn!("Transparency save task failed: {}", e),
        Ok(Ok(())) => {}
    }
    Ok(Json(summary))
}

/// POST /frames
///
/// Accepts one line of classifier output and returns the live update. A body
/// that is not a valid frame counts as an unavailable frame, not a 4xx.
async fn ingest_frame(
    State(state): State<Arc<ServerState>>,
    body: String,
) -> Json<FrameResponse> {
    let event = parse_line(&body).unwrap_or_else(|| FrameEvent::Unavailable {
        timestamp: Utc::now(),
    });
    let outcome = state.monitor.lock().await.process_frame(event);
    Json(match outcome {
        FrameOutcome::Recorded(update) => FrameResponse {
            status: "recorded".to_string(),
            update: Some(update),
            reason: None,
        },
        FrameOutcome::Skipped(reason) => FrameResponse {
            status: "skipped".to_string(),
            update: None,
            reason: Some(reason),
        },
    })
}

/// GET /live
async fn live(State(state): State<Arc<ServerState>>) -> Json<LiveView> {
    Json(state.monitor.lock().await.live())
}

/// GET /summary
async fn summary(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<SessionSummary>, ApiError> {
    state
        .monitor
        .lock()
        .await
        .last_summary()
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "NO_SUMMARY", "no closed session"))
}

/// POST /feedback
async fn submit_feedback(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let labels = request
        .labels
        .iter()
        .map(|name| name.parse::<EmotionLabel>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "INVALID_LABEL", e))?;

    let feedback = state
        .monitor
        .lock()
        .await
        .submit_feedback(request.session_id, labels)
        .map_err(|e| {
            let (status, code) = match e {
                FeedbackError::EmptyLabels => (StatusCode::BAD_REQUEST, "EMPTY_LABELS"),
                FeedbackError::SessionActive(_) => (StatusCode::CONFLICT, "SESSION_ACTIVE"),
                FeedbackError::AlreadySubmitted(_) => (StatusCode::CONFLICT, "ALREADY_SUBMITTED"),
                FeedbackError::UnknownSession(_) => (StatusCode::NOT_FOUND, "UNKNOWN_SESSION"),
            };
            api_error(status, code, e)
        })?;

    Ok(Json(FeedbackResponse {
        status: "ok".to_string(),
        session_id: request.session_id,
        labels: feedback.labels.into_iter().collect(),
    }))
}

/// Build the router over shared state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/labels", get(labels))
        .route("/session/start", post(start_session))
        .route("/session/stop", post(stop_session))
        .route("/frames", post(ingest_frame))
        .route("/live", get(live))
        .route("/summary", get(summary))
        .route("/feedback", post(submit_feedback))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config));
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Stress sense server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
