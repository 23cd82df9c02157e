//! Pivot Table Widget
//!
//! In-process implementation of the `ChartWidget` port. Tables are keyed
//! [`ChartTable`]s; the attached table is rendered through the configured
//! view on demand.

use crate::application::ports::{ChartWidget, TableId, WidgetError};
use crate::domain::chart::{
    self, ChartRow, ChartTable, IngestReport, TableSchema, ViewConfig, ViewSnapshot,
};

/// Chart widget backed by in-memory pivot tables.
#[derive(Debug, Default)]
pub struct PivotTableWidget {
    tables: Vec<ChartTable>,
    attached: Option<TableId>,
    view: Option<ViewConfig>,
}

impl PivotTableWidget {
    /// Create a widget with no tables.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tables: Vec::new(),
            attached: None,
            view: None,
        }
    }

    /// Table behind a handle.
    #[must_use]
    pub fn table(&self, id: TableId) -> Option<&ChartTable> {
        usize::try_from(id.0).ok().and_then(|i| self.tables.get(i))
    }

    /// Handle of the attached table.
    #[must_use]
    pub const fn attached(&self) -> Option<TableId> {
        self.attached
    }

    fn table_mut(&mut self, id: TableId) -> Result<&mut ChartTable, WidgetError> {
        usize::try_from(id.0)
            .ok()
            .and_then(|i| self.tables.get_mut(i))
            .ok_or(WidgetError::UnknownTable(id))
    }
}

impl ChartWidget for PivotTableWidget {
    fn create_table(&mut self, schema: TableSchema) -> Result<TableId, WidgetError> {
        let id = u32::try_from(self.tables.len())
            .map(TableId)
            .map_err(|_| WidgetError::UnknownTable(TableId(u32::MAX)))?;
        self.tables.push(ChartTable::new(schema));
        Ok(id)
    }

    fn attach(&mut self, table: TableId) -> Result<(), WidgetError> {
        self.table_mut(table)?;
        self.attached = Some(table);
        Ok(())
    }

    fn configure_view(&mut self, config: ViewConfig) -> Result<(), WidgetError> {
        let table = self.attached.ok_or(WidgetError::NotAttached)?;
        let schema = self
            .table(table)
            .ok_or(WidgetError::UnknownTable(table))?
            .schema();
        config.validate(schema)?;
        self.view = Some(config);
        Ok(())
    }

    fn upsert(&mut self, table: TableId, rows: Vec<ChartRow>) -> Result<IngestReport, WidgetError> {
        Ok(self.table_mut(table)?.upsert(rows))
    }

    fn snapshot(&self) -> Option<ViewSnapshot> {
        let table = self.table(self.attached?)?;
        let view = self.view.as_ref()?;
        Some(chart::render(view, table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chart::{STOCK, ViewError};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn row(stock: &str, ask: Decimal, secs: i64) -> ChartRow {
        ChartRow {
            stock: stock.to_string(),
            top_ask_price: ask,
            top_bid_price: Decimal::ZERO,
            timestamp: Utc.timestamp_opt(1_549_922_790 + secs, 0).unwrap(),
        }
    }

    fn mounted() -> (PivotTableWidget, TableId) {
        let mut widget = PivotTableWidget::new();
        let table = widget.create_table(TableSchema::quotes()).unwrap();
        widget.attach(table).unwrap();
        widget.configure_view(ViewConfig::quote_line()).unwrap();
        (widget, table)
    }

    #[test]
    fn view_requires_attached_table() {
        let mut widget = PivotTableWidget::new();
        assert_eq!(
            widget.configure_view(ViewConfig::quote_line()),
            Err(WidgetError::NotAttached)
        );
    }

    #[test]
    fn attach_rejects_unknown_table() {
        let mut widget = PivotTableWidget::new();
        assert_eq!(
            widget.attach(TableId(3)),
            Err(WidgetError::UnknownTable(TableId(3)))
        );
    }

    #[test]
    fn invalid_view_is_rejected() {
        let mut widget = PivotTableWidget::new();
        let table = widget.create_table(TableSchema::quotes()).unwrap();
        widget.attach(table).unwrap();

        let mut config = ViewConfig::quote_line();
        config.columns = vec!["volume".to_string()];

        assert_eq!(
            widget.configure_view(config),
            Err(WidgetError::InvalidView(ViewError::UnknownColumn(
                "volume".to_string()
            )))
        );
        assert!(widget.snapshot().is_none());
    }

    #[test]
    fn repeated_batches_upsert_by_key() {
        let (mut widget, table) = mounted();

        widget.upsert(table, vec![row("ABC", dec!(10), 1)]).unwrap();
        let report = widget.upsert(table, vec![row("ABC", dec!(12), 1)]).unwrap();

        assert_eq!(report, IngestReport { inserted: 0, updated: 1 });
        assert_eq!(widget.table(table).unwrap().len(), 1);

        let snapshot = widget.snapshot().unwrap();
        let abc = snapshot.series("ABC|top_ask_price").unwrap();
        assert_eq!(abc.points.len(), 1);
        assert_eq!(abc.points[0].y, dec!(12));
    }

    #[test]
    fn snapshot_needs_view() {
        let mut widget = PivotTableWidget::new();
        let table = widget.create_table(TableSchema::quotes()).unwrap();
        widget.attach(table).unwrap();
        assert!(widget.snapshot().is_none());
        assert_eq!(widget.attached(), Some(table));
    }

    #[test]
    fn tables_are_independent() {
        let mut widget = PivotTableWidget::new();
        let first = widget.create_table(TableSchema::quotes()).unwrap();
        let second = widget.create_table(TableSchema::quotes()).unwrap();
        assert_ne!(first, second);

        widget.upsert(first, vec![row("ABC", dec!(1), 1)]).unwrap();
        assert_eq!(widget.table(first).unwrap().len(), 1);
        assert!(widget.table(second).unwrap().is_empty());
        assert!(widget.table(first).unwrap().schema().has_column(STOCK));
    }
}
