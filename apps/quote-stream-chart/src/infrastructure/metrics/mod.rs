//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Fetches**: Fetches issued, failed, and their latency
//! - **Batches**: Batches and records received from the quote source
//! - **Chart**: Rows inserted into and updated in the backing table
//! - **Streaming**: Whether the polling loop is running
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the control server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::chart::IngestReport;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "quote_chart_fetches_total",
        "Total fetch requests issued to the quote source"
    );
    describe_counter!(
        "quote_chart_fetch_failures_total",
        "Total failed fetch requests by error kind"
    );
    describe_histogram!(
        "quote_chart_fetch_seconds",
        "Time from issuing a fetch to its completion"
    );

    describe_counter!(
        "quote_chart_batches_total",
        "Total batches received from the quote source"
    );
    describe_counter!(
        "quote_chart_records_total",
        "Total quote records received from the quote source"
    );

    describe_counter!(
        "quote_chart_rows_inserted_total",
        "Rows stored under a new (stock, timestamp) key"
    );
    describe_counter!(
        "quote_chart_rows_updated_total",
        "Rows that replaced an existing (stock, timestamp) key"
    );

    describe_gauge!(
        "quote_chart_streaming",
        "1 while the polling loop is running, 0 otherwise"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a fetch request issued.
pub fn record_fetch_issued() {
    counter!("quote_chart_fetches_total").increment(1);
}

/// Record a failed fetch.
pub fn record_fetch_failed(kind: &'static str) {
    counter!("quote_chart_fetch_failures_total", "kind" => kind).increment(1);
}

/// Record fetch duration.
pub fn record_fetch_duration(duration: Duration) {
    histogram!("quote_chart_fetch_seconds").record(duration.as_secs_f64());
}

/// Record a batch received.
pub fn record_batch_received(records: usize) {
    counter!("quote_chart_batches_total").increment(1);
    counter!("quote_chart_records_total").increment(records as u64);
}

/// Record rows ingested into the backing table.
pub fn record_rows_ingested(report: IngestReport) {
    counter!("quote_chart_rows_inserted_total").increment(report.inserted as u64);
    counter!("quote_chart_rows_updated_total").increment(report.updated as u64);
}

/// Update the streaming gauge.
pub fn set_streaming(streaming: bool) {
    gauge!("quote_chart_streaming").set(if streaming { 1.0 } else { 0.0 });
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_fetch_issued();
        record_fetch_failed("network");
        record_fetch_duration(Duration::from_millis(5));
        record_batch_received(3);
        record_rows_ingested(IngestReport {
            inserted: 2,
            updated: 1,
        });
        set_streaming(true);
        assert!(get_metrics_handle().is_none());
    }
}
