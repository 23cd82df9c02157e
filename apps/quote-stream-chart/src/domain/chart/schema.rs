//! Chart Table Schema and Rows
//!
//! The chart's backing table has a fixed four-column schema. Each quote
//! record is projected into one [`ChartRow`], keyed by `(stock, timestamp)`.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteRecord;

/// Stock symbol column.
pub const STOCK: &str = "stock";
/// Best ask price column.
pub const TOP_ASK_PRICE: &str = "top_ask_price";
/// Best bid price column.
pub const TOP_BID_PRICE: &str = "top_bid_price";
/// Observation time column.
pub const TIMESTAMP: &str = "timestamp";

// =============================================================================
// Schema
// =============================================================================

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Text.
    String,
    /// Floating point number.
    Float,
    /// Date/time.
    Date,
}

impl ColumnType {
    /// Get the type name used in schema declarations.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Float => "float",
            Self::Date => "date",
        }
    }

    /// Whether numeric aggregates apply to this type.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Float)
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl Column {
    fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
        }
    }
}

/// Table schema: ordered columns plus the index columns rows are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    columns: Vec<Column>,
    index: Vec<String>,
}

impl TableSchema {
    /// The quote chart schema, indexed by `(stock, timestamp)`.
    #[must_use]
    pub fn quotes() -> Self {
        Self {
            columns: vec![
                Column::new(STOCK, ColumnType::String),
                Column::new(TOP_ASK_PRICE, ColumnType::Float),
                Column::new(TOP_BID_PRICE, ColumnType::Float),
                Column::new(TIMESTAMP, ColumnType::Date),
            ],
            index: vec![STOCK.to_string(), TIMESTAMP.to_string()],
        }
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Index column names.
    #[must_use]
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Look up a column's type.
    #[must_use]
    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.column_type)
    }

    /// Check whether the schema declares a column.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_type(name).is_some()
    }
}

// =============================================================================
// Cell Values
// =============================================================================

/// A single cell value read from a row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Text cell.
    Text(String),
    /// Numeric cell.
    Number(Decimal),
    /// Date/time cell.
    Date(DateTime<Utc>),
}

impl CellValue {
    /// Numeric value, if this is a number cell.
    #[must_use]
    pub const fn as_number(&self) -> Option<Decimal> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Micros, true)),
        }
    }
}

// =============================================================================
// Rows
// =============================================================================

/// Key a chart row is stored under.
///
/// Ordered by timestamp first so table iteration follows the time axis.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RowKey {
    /// Observation time.
    pub timestamp: DateTime<Utc>,
    /// Stock symbol.
    pub stock: String,
}

impl RowKey {
    /// Create a row key.
    #[must_use]
    pub fn new(stock: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            stock: stock.into(),
        }
    }
}

/// A quote projected into the chart schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRow {
    /// Stock symbol.
    pub stock: String,
    /// Best ask price (zero when missing).
    pub top_ask_price: Decimal,
    /// Best bid price (zero when missing).
    pub top_bid_price: Decimal,
    /// Observation time.
    pub timestamp: DateTime<Utc>,
}

impl ChartRow {
    /// The key this row is stored under.
    #[must_use]
    pub fn key(&self) -> RowKey {
        RowKey::new(self.stock.clone(), self.timestamp)
    }

    /// Read a column by name.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<CellValue> {
        match column {
            STOCK => Some(CellValue::Text(self.stock.clone())),
            TOP_ASK_PRICE => Some(CellValue::Number(self.top_ask_price)),
            TOP_BID_PRICE => Some(CellValue::Number(self.top_bid_price)),
            TIMESTAMP => Some(CellValue::Date(self.timestamp)),
            _ => None,
        }
    }
}

impl From<&QuoteRecord> for ChartRow {
    fn from(quote: &QuoteRecord) -> Self {
        Self {
            stock: quote.stock.clone(),
            top_ask_price: quote.ask_price_or_zero(),
            top_bid_price: quote.bid_price_or_zero(),
            timestamp: quote.timestamp,
        }
    }
}

/// Project a batch of quotes into chart rows, preserving order.
#[must_use]
pub fn project(batch: &[QuoteRecord]) -> Vec<ChartRow> {
    batch.iter().map(ChartRow::from).collect()
}
