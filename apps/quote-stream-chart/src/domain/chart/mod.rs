//! Chart Model
//!
//! The chart's fixed table schema, the keyed backing table, and the pivot
//! view rendered from it.

pub mod schema;
pub mod table;
pub mod view;

pub use schema::{
    CellValue, ChartRow, Column, ColumnType, RowKey, STOCK, TIMESTAMP, TOP_ASK_PRICE,
    TOP_BID_PRICE, TableSchema, project,
};
pub use table::{ChartTable, IngestReport};
pub use view::{Aggregate, Point, Series, ViewConfig, ViewError, ViewSnapshot, ViewType, render};
