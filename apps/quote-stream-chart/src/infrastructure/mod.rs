//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Quote source adapters (HTTP polling, JSON codec).
pub mod source;

/// In-process pivot table chart widget.
pub mod widget;

/// Configuration loading.
pub mod config;

/// Control and health HTTP endpoint.
pub mod control;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
