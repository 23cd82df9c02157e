#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Quote Stream Chart - Live top-of-book chart
//!
//! Polls a quote source on a fixed interval, hands every batch to a chart
//! renderer, and keeps one ask-price line per stock over time. Rows are
//! upserted by `(stock, timestamp)`, so overlapping batches refresh points
//! instead of duplicating them.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Quote records and the chart model
//!   - `quote`: Top-of-book quote records
//!   - `chart`: Schema, keyed backing table, pivot view rendering
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Quote source and chart widget interfaces
//!   - `services`: Stream controller, chart renderer, streaming session
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `source`: HTTP quote source and JSON codec
//!   - `widget`: In-process pivot table widget
//!   - `config`: Configuration from the environment
//!   - `control`: Control and health HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!                 fetch every interval          batch channel
//! Quote source ◄────────────────────── Controller ──────────► Renderer ──► Chart widget
//!                                          │                               │
//!                                    streaming state                 view snapshot
//!                                          └──────────► Control server ◄───┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Quote records and the chart model.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::chart::{
    ChartRow, ChartTable, IngestReport, TableSchema, ViewConfig, ViewSnapshot,
};
pub use domain::quote::{PriceLevel, QuoteRecord};

// Ports
pub use application::ports::{ChartWidget, QuoteSource, SourceError, TableId, WidgetError};

// Services
pub use application::services::{
    ChartRenderer, ControllerError, PollSettings, StopReason, StreamController, StreamHandle,
    StreamingSession, StreamingState, StreamingStatus,
};

// Infrastructure config
pub use infrastructure::config::{AppConfig, ConfigError};

// Adapters
pub use infrastructure::source::HttpQuoteSource;
pub use infrastructure::widget::PivotTableWidget;

// Control server
pub use infrastructure::control::{ControlServer, ControlServerError, ControlServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
