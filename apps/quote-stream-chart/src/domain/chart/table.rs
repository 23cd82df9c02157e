//! Chart Backing Table
//!
//! Keyed row store behind the chart. Rows are upserted by
//! `(stock, timestamp)`: a row arriving for an existing key replaces the
//! stored row, so overlapping batches never produce duplicate rows.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::Serialize;

use super::schema::{ChartRow, RowKey, TableSchema};

/// Outcome of ingesting a set of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Rows stored under a key not seen before.
    pub inserted: usize,
    /// Rows that replaced an existing row with the same key.
    pub updated: usize,
}

impl IngestReport {
    /// Total rows processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

impl AddAssign for IngestReport {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.updated += rhs.updated;
    }
}

/// Keyed backing table.
#[derive(Debug, Clone)]
pub struct ChartTable {
    schema: TableSchema,
    rows: BTreeMap<RowKey, ChartRow>,
}

impl ChartTable {
    /// Create an empty table.
    #[must_use]
    pub const fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
        }
    }

    /// Table schema.
    #[must_use]
    pub const fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Upsert rows by key.
    ///
    /// Within one call, a later row for a key replaces an earlier one and is
    /// counted as an update.
    pub fn upsert(&mut self, rows: impl IntoIterator<Item = ChartRow>) -> IngestReport {
        let mut report = IngestReport::default();

        for row in rows {
            if self.rows.insert(row.key(), row).is_some() {
                report.updated += 1;
            } else {
                report.inserted += 1;
            }
        }

        report
    }

    /// Look up the row stored under a key.
    #[must_use]
    pub fn get(&self, key: &RowKey) -> Option<&ChartRow> {
        self.rows.get(key)
    }

    /// Rows in key order (time, then stock).
    pub fn rows(&self) -> impl Iterator<Item = &ChartRow> {
        self.rows.values()
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove all rows, keeping the schema.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
