//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `QuoteSource`: requests one batch of quotes from the data source
//! - `ChartWidget`: the charting component the renderer feeds

use async_trait::async_trait;

use crate::domain::chart::{
    ChartRow, IngestReport, TableSchema, ViewConfig, ViewError, ViewSnapshot,
};
use crate::domain::quote::QuoteRecord;

// =============================================================================
// Quote Source
// =============================================================================

/// Errors from a quote source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Request could not be sent or the response not read.
    #[error("network error: {0}")]
    Network(String),

    /// Source answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl SourceError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
        }
    }
}

/// Source of quote batches.
///
/// Each call requests one batch; the source decides which records it holds.
/// Batches from successive calls may overlap.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Request the next batch of quotes.
    async fn fetch_batch(&self) -> Result<Vec<QuoteRecord>, SourceError>;
}

// =============================================================================
// Chart Widget
// =============================================================================

/// Handle to a table created inside a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub u32);

/// Errors from a chart widget.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WidgetError {
    /// The table handle does not belong to this widget.
    #[error("unknown table {0:?}")]
    UnknownTable(TableId),

    /// A view was configured before any table was attached.
    #[error("no table attached")]
    NotAttached,

    /// The view configuration does not fit the attached table.
    #[error("invalid view: {0}")]
    InvalidView(#[from] ViewError),
}

/// Charting component.
///
/// Mirrors the viewer-element lifecycle: create a table from a schema, load
/// it into the viewer, set display attributes, then feed rows incrementally.
#[cfg_attr(test, mockall::automock)]
pub trait ChartWidget: Send {
    /// Create a table with the given schema.
    fn create_table(&mut self, schema: TableSchema) -> Result<TableId, WidgetError>;

    /// Load a table into the viewer.
    fn attach(&mut self, table: TableId) -> Result<(), WidgetError>;

    /// Set the display configuration.
    fn configure_view(&mut self, config: ViewConfig) -> Result<(), WidgetError>;

    /// Merge rows into a table, keyed by the table's index.
    fn upsert(&mut self, table: TableId, rows: Vec<ChartRow>) -> Result<IngestReport, WidgetError>;

    /// Current rendered view, once a table is attached and a view configured.
    fn snapshot(&self) -> Option<ViewSnapshot>;
}
