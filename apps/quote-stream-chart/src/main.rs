//! Quote Stream Chart Binary
//!
//! Starts the chart service: the streaming session plus its control server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin quote-stream-chart
//! ```
//!
//! # Environment Variables
//!
//! - `QUOTE_SOURCE_URL`: Quote source endpoint (default: <http://localhost:8080/query?id=1>)
//! - `QUOTE_SOURCE_TIMEOUT_MS`: Per-request timeout (default: 2000)
//! - `POLL_INTERVAL_MS`: Time between fetches (default: 100)
//! - `POLL_MAX_ATTEMPTS`: Fetches per streaming session (default: 1000)
//! - `POLL_STOP_ON_EMPTY_BATCH`: End the session on an empty batch (default: false)
//! - `BATCH_CHANNEL_CAPACITY`: Controller to renderer channel capacity (default: 256)
//! - `CHART_SERVER_PORT`: Control and health HTTP port (default: 8090)
//! - `CHART_AUTO_START`: Start streaming at startup (default: false)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP gRPC endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: quote-stream-chart)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use quote_stream_chart::infrastructure::telemetry;
use quote_stream_chart::{
    AppConfig, ChartRenderer, ControlServer, ControlServerState, HttpQuoteSource,
    PivotTableWidget, StreamingSession, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (tracing + optional OpenTelemetry)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Quote Stream Chart");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = AppConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let source = HttpQuoteSource::new(config.source.url.clone(), config.source.timeout)
        .context("failed to build quote source")?;
    let renderer = ChartRenderer::new(PivotTableWidget::new());

    let session = Arc::new(StreamingSession::spawn(
        Arc::new(source),
        renderer,
        config.polling.into(),
        config.batch_channel_capacity,
    ));

    // Spawn control server
    let control_state = Arc::new(ControlServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&session),
    ));
    let control_server = ControlServer::new(
        config.server.port,
        control_state,
        shutdown_token.clone(),
    );
    let server_task = tokio::spawn(async move {
        if let Err(e) = control_server.run().await {
            tracing::error!(error = %e, "Control server error");
        }
    });

    if config.server.auto_start {
        let session_id = session.start().context("failed to start streaming")?;
        tracing::info!(%session_id, "Streaming started at startup");
    }

    tracing::info!("Quote stream chart ready");

    await_shutdown(shutdown_token).await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, server_task)
        .await
        .is_err()
    {
        tracing::warn!("Control server did not stop in time");
    }

    match Arc::try_unwrap(session) {
        Ok(session) => session.shutdown().await,
        Err(session) => {
            session.stop();
            tracing::warn!("Streaming session still shared at shutdown");
        }
    }

    tracing::info!("Quote stream chart stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &AppConfig) {
    tracing::info!(
        source_url = %config.source.url,
        interval_ms = config.polling.interval.as_millis(),
        max_attempts = config.polling.max_attempts,
        stop_on_empty_batch = config.polling.stop_on_empty_batch,
        port = config.server.port,
        auto_start = config.server.auto_start,
        "Configuration loaded"
    );
    tracing::debug!(
        timeout_ms = config.source.timeout.as_millis(),
        batch_channel_capacity = config.batch_channel_capacity,
        "Pipeline settings"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
