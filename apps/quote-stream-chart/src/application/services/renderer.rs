//! Chart Renderer
//!
//! Owns the chart widget. The first batch mounts the chart: a table is
//! created with the quote schema, loaded into the viewer and the view is
//! configured once. Every batch is then projected into chart rows and
//! upserted by `(stock, timestamp)`.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::application::ports::{ChartWidget, TableId, WidgetError};
use crate::domain::chart::{self, IngestReport, TableSchema, ViewConfig, ViewSnapshot};
use crate::domain::quote::QuoteRecord;
use crate::infrastructure::metrics;

/// Latest rendered chart, published after every batch.
pub type ChartSender = watch::Sender<Option<Arc<ViewSnapshot>>>;

/// Renderer errors.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    /// The widget rejected an operation.
    #[error("chart widget error: {0}")]
    Widget(#[from] WidgetError),
}

/// Feeds quote batches into a chart widget.
pub struct ChartRenderer<W: ChartWidget> {
    widget: W,
    schema: TableSchema,
    view: ViewConfig,
    table: Option<TableId>,
    totals: IngestReport,
}

impl<W: ChartWidget> ChartRenderer<W> {
    /// Create a renderer drawing the quote line chart.
    #[must_use]
    pub fn new(widget: W) -> Self {
        Self::with_view(widget, ViewConfig::quote_line())
    }

    /// Create a renderer with a custom view over the quote schema.
    #[must_use]
    pub fn with_view(widget: W, view: ViewConfig) -> Self {
        Self {
            widget,
            schema: TableSchema::quotes(),
            view,
            table: None,
            totals: IngestReport::default(),
        }
    }

    /// Whether the chart has been mounted.
    #[must_use]
    pub const fn is_mounted(&self) -> bool {
        self.table.is_some()
    }

    /// View configuration.
    #[must_use]
    pub const fn view(&self) -> &ViewConfig {
        &self.view
    }

    /// Rows ingested since creation.
    #[must_use]
    pub const fn totals(&self) -> IngestReport {
        self.totals
    }

    /// Mount the chart, once.
    ///
    /// # Errors
    ///
    /// Returns an error if the widget rejects the table or the view.
    pub fn mount(&mut self) -> Result<TableId, RendererError> {
        if let Some(table) = self.table {
            return Ok(table);
        }

        let table = self.widget.create_table(self.schema.clone())?;
        self.widget.attach(table)?;
        self.widget.configure_view(self.view.clone())?;

        tracing::info!(
            table = table.0,
            attributes = ?self.view.attributes(),
            "Chart mounted"
        );

        self.table = Some(table);
        Ok(table)
    }

    /// Merge a batch into the chart.
    ///
    /// # Errors
    ///
    /// Returns an error if mounting or the upsert fails.
    pub fn render(&mut self, batch: &[QuoteRecord]) -> Result<IngestReport, RendererError> {
        let table = self.mount()?;

        let rows = chart::project(batch);
        if rows.is_empty() {
            return Ok(IngestReport::default());
        }

        let report = self.widget.upsert(table, rows)?;
        self.totals += report;
        metrics::record_rows_ingested(report);

        tracing::debug!(
            inserted = report.inserted,
            updated = report.updated,
            "Batch rendered"
        );

        Ok(report)
    }

    /// Current rendered view.
    #[must_use]
    pub fn snapshot(&self) -> Option<ViewSnapshot> {
        self.widget.snapshot()
    }

    /// Render batches until the channel closes, publishing the chart after each.
    pub async fn run(
        mut self,
        mut batches: mpsc::Receiver<Vec<QuoteRecord>>,
        chart_tx: ChartSender,
    ) {
        while let Some(batch) = batches.recv().await {
            if let Err(e) = self.render(&batch) {
                tracing::error!(error = %e, "Failed to render batch");
                continue;
            }

            if let Some(snapshot) = self.snapshot() {
                chart_tx.send_replace(Some(Arc::new(snapshot)));
            }
        }

        tracing::info!(
            inserted = self.totals.inserted,
            updated = self.totals.updated,
            "Renderer stopped"
        );
    }
}
