//! Control and Health Endpoint
//!
//! HTTP surface for driving the streaming session and observing the chart.
//!
//! # Endpoints
//!
//! - `POST /stream/start` - Start streaming (202, or 409 if already streaming)
//! - `POST /stream/stop` - Stop the running stream
//! - `GET /stream` - Streaming state, including the latest batch
//! - `GET /chart` - Viewer attributes and the rendered chart
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /metrics` - Prometheus metrics in text format

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::services::{ControllerError, StopReason, StreamingSession, StreamingStatus};
use crate::domain::chart::ViewSnapshot;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Polling loop summary.
    pub stream: StreamSummary,
    /// Whether the renderer task is running.
    pub renderer_alive: bool,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational.
    Healthy,
    /// Fetches are failing and nothing has been received yet.
    Degraded,
    /// The renderer is gone; batches can no longer be charted.
    Unhealthy,
}

/// Polling loop summary for the health response.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    /// Whether the polling loop is running.
    pub is_streaming: bool,
    /// Fetches issued in the current or most recent session.
    pub attempts: u32,
    /// Batches received across all sessions.
    pub batches_received: u64,
    /// Failed fetches across all sessions.
    pub fetch_failures: u64,
    /// Why the most recent session ended.
    pub stop_reason: Option<StopReason>,
}

impl From<&StreamingStatus> for StreamSummary {
    fn from(status: &StreamingStatus) -> Self {
        Self {
            is_streaming: status.is_streaming,
            attempts: status.attempts,
            batches_received: status.batches_received,
            fetch_failures: status.fetch_failures,
            stop_reason: status.stop_reason,
        }
    }
}

/// Response to a start request.
#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    /// Session that was started, or the one already running.
    pub session_id: Uuid,
    /// Whether this request started the session.
    pub started: bool,
}

/// Response to a stop request.
#[derive(Debug, Clone, Serialize)]
pub struct StopResponse {
    /// Whether a running stream was stopped.
    pub stopped: bool,
}

/// Chart response: viewer attributes plus the rendered view.
#[derive(Debug, Clone, Serialize)]
pub struct ChartResponse {
    /// Whether a batch has arrived and the chart is displayed.
    pub show_chart: bool,
    /// Viewer element attributes.
    pub attributes: BTreeMap<&'static str, String>,
    /// Rendered view, absent until the first batch is charted.
    pub chart: Option<Arc<ViewSnapshot>>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

// =============================================================================
// Server State
// =============================================================================

/// Shared state for the control server.
pub struct ControlServerState {
    version: String,
    started_at: Instant,
    session: Arc<StreamingSession>,
}

impl ControlServerState {
    /// Create new control server state.
    #[must_use]
    pub fn new(version: String, session: Arc<StreamingSession>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            session,
        }
    }

    /// Session driven by this server.
    #[must_use]
    pub const fn session(&self) -> &Arc<StreamingSession> {
        &self.session
    }
}

/// Build the control router.
pub fn router(state: Arc<ControlServerState>) -> Router {
    Router::new()
        .route("/stream", get(stream_status_handler))
        .route("/stream/start", post(start_handler))
        .route("/stream/stop", post(stop_handler))
        .route("/chart", get(chart_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// Control Server
// =============================================================================

/// Control HTTP server.
pub struct ControlServer {
    port: u16,
    state: Arc<ControlServerState>,
    cancel: CancellationToken,
}

impl ControlServer {
    /// Create a new control server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<ControlServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the control server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ControlServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ControlServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ControlServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Control server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ControlServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Control server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn start_handler(State(state): State<Arc<ControlServerState>>) -> impl IntoResponse {
    match state.session.start() {
        Ok(session_id) => {
            tracing::info!(%session_id, "Streaming started");
            (
                StatusCode::ACCEPTED,
                Json(StartResponse {
                    session_id,
                    started: true,
                }),
            )
                .into_response()
        }
        Err(ControllerError::AlreadyStreaming(session_id)) => (
            StatusCode::CONFLICT,
            Json(StartResponse {
                session_id,
                started: false,
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn stop_handler(State(state): State<Arc<ControlServerState>>) -> impl IntoResponse {
    let stopped = state.session.stop();
    if stopped {
        tracing::info!("Streaming stop requested");
    }
    Json(StopResponse { stopped })
}

async fn stream_status_handler(State(state): State<Arc<ControlServerState>>) -> impl IntoResponse {
    Json(state.session.status())
}

async fn chart_handler(State(state): State<Arc<ControlServerState>>) -> impl IntoResponse {
    let session = &state.session;
    Json(ChartResponse {
        show_chart: session.status().show_chart,
        attributes: session.view().attributes().into_iter().collect(),
        chart: session.chart(),
    })
}

async fn health_handler(State(state): State<Arc<ControlServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &ControlServerState) -> HealthResponse {
    let status = state.session.status();
    let renderer_alive = state.session.renderer_alive();

    HealthResponse {
        status: determine_health_status(renderer_alive, &status),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        stream: StreamSummary::from(&status),
        renderer_alive,
    }
}

fn determine_health_status(renderer_alive: bool, status: &StreamingStatus) -> HealthStatus {
    if !renderer_alive {
        HealthStatus::Unhealthy
    } else if status.fetch_failures > 0 && status.batches_received == 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Control server errors.
#[derive(Debug, thiserror::Error)]
pub enum ControlServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
