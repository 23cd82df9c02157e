//! Chart View Configuration and Rendering
//!
//! A view pivots the backing table: rows are grouped along the row pivots
//! (the x axis), split into series by the column pivots, and every visible
//! column is aggregated per cell. Attribute names and values follow the
//! perspective viewer's conventions so a configuration can be handed to that
//! widget family unchanged.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::schema::{
    CellValue, ChartRow, ColumnType, STOCK, TIMESTAMP, TOP_ASK_PRICE, TOP_BID_PRICE, TableSchema,
};
use super::table::ChartTable;

// =============================================================================
// Configuration Types
// =============================================================================

/// Chart plugin used to draw the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewType {
    /// Continuous line chart.
    #[default]
    #[serde(rename = "y_line")]
    YLine,
    /// Vertical bar chart.
    #[serde(rename = "y_bar")]
    YBar,
    /// Plain data grid.
    #[serde(rename = "datagrid")]
    Datagrid,
}

impl ViewType {
    /// Attribute value for this view type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::YLine => "y_line",
            Self::YBar => "y_bar",
            Self::Datagrid => "datagrid",
        }
    }
}

/// Aggregation applied to all rows falling into one pivot cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregate {
    /// Arithmetic mean.
    #[serde(rename = "avg")]
    Avg,
    /// Sum.
    #[serde(rename = "sum")]
    Sum,
    /// Number of rows.
    #[serde(rename = "count")]
    Count,
    /// Number of distinct values.
    #[serde(rename = "distinct count")]
    DistinctCount,
    /// Value from the last row in key order.
    #[serde(rename = "last")]
    Last,
    /// Minimum.
    #[serde(rename = "low")]
    Low,
    /// Maximum.
    #[serde(rename = "high")]
    High,
}

impl Aggregate {
    /// Attribute value for this aggregate.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::Count => "count",
            Self::DistinctCount => "distinct count",
            Self::Last => "last",
            Self::Low => "low",
            Self::High => "high",
        }
    }

    /// Aggregate used for a column with no explicit rule.
    #[must_use]
    pub const fn default_for(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Float => Self::Sum,
            ColumnType::String | ColumnType::Date => Self::Count,
        }
    }

    /// Whether this aggregate needs numeric input.
    #[must_use]
    pub const fn requires_numeric(&self) -> bool {
        matches!(self, Self::Avg | Self::Sum | Self::Low | Self::High)
    }
}

/// View configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    /// A pivot, column or aggregate names a column the schema lacks.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// A numeric aggregate was assigned to a non-numeric column.
    #[error("aggregate '{aggregate}' cannot apply to {column_type} column '{column}'")]
    IncompatibleAggregate {
        /// Column name.
        column: String,
        /// Column type name.
        column_type: &'static str,
        /// Aggregate name.
        aggregate: &'static str,
    },
}

/// Display configuration for a chart view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Chart plugin.
    pub view: ViewType,
    /// Columns whose values split the data into series.
    pub column_pivots: Vec<String>,
    /// Columns whose values group rows along the x axis.
    pub row_pivots: Vec<String>,
    /// Columns drawn.
    pub columns: Vec<String>,
    /// Aggregation per column.
    pub aggregates: BTreeMap<String, Aggregate>,
}

impl ViewConfig {
    /// Live quote line chart: one ask-price line per stock over time.
    #[must_use]
    pub fn quote_line() -> Self {
        Self {
            view: ViewType::YLine,
            column_pivots: vec![STOCK.to_string()],
            row_pivots: vec![TIMESTAMP.to_string()],
            columns: vec![TOP_ASK_PRICE.to_string()],
            aggregates: BTreeMap::from([
                (STOCK.to_string(), Aggregate::DistinctCount),
                (TOP_ASK_PRICE.to_string(), Aggregate::Avg),
                (TOP_BID_PRICE.to_string(), Aggregate::Avg),
                (TIMESTAMP.to_string(), Aggregate::DistinctCount),
            ]),
        }
    }

    /// Check every referenced column against a schema.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is unknown or a numeric aggregate is
    /// assigned to a non-numeric column.
    pub fn validate(&self, schema: &TableSchema) -> Result<(), ViewError> {
        for name in self
            .column_pivots
            .iter()
            .chain(&self.row_pivots)
            .chain(&self.columns)
        {
            if !schema.has_column(name) {
                return Err(ViewError::UnknownColumn(name.clone()));
            }
        }

        for (name, aggregate) in &self.aggregates {
            let column_type = schema
                .column_type(name)
                .ok_or_else(|| ViewError::UnknownColumn(name.clone()))?;

            if aggregate.requires_numeric() && !column_type.is_numeric() {
                return Err(ViewError::IncompatibleAggregate {
                    column: name.clone(),
                    column_type: column_type.as_str(),
                    aggregate: aggregate.as_str(),
                });
            }
        }

        Ok(())
    }

    /// Aggregate for a column, falling back to the type default.
    #[must_use]
    pub fn aggregate_for(&self, column: &str, schema: &TableSchema) -> Aggregate {
        self.aggregates.get(column).copied().unwrap_or_else(|| {
            schema
                .column_type(column)
                .map_or(Aggregate::Count, Aggregate::default_for)
        })
    }

    /// Viewer element attributes, as attribute name and serialized value.
    #[must_use]
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let aggregates: BTreeMap<&str, &str> = self
            .aggregates
            .iter()
            .map(|(column, aggregate)| (column.as_str(), aggregate.as_str()))
            .collect();

        vec![
            ("view", self.view.as_str().to_string()),
            ("column-pivots", json_list(&self.column_pivots)),
            ("row-pivots", json_list(&self.row_pivots)),
            ("columns", json_list(&self.columns)),
            (
                "aggregates",
                serde_json::to_string(&aggregates).unwrap_or_default(),
            ),
        ]
    }
}

fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_default()
}

// =============================================================================
// Rendered View
// =============================================================================

/// One point of a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Point {
    /// Row pivot values (x axis).
    pub x: Vec<CellValue>,
    /// Aggregated value.
    pub y: Decimal,
}

/// One line of the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    /// Series label: column pivot values and column name joined by `|`.
    pub name: String,
    /// Column pivot values this series was split on.
    pub group: Vec<CellValue>,
    /// Aggregated column.
    pub column: String,
    /// Points along the x axis, in ascending order.
    pub points: Vec<Point>,
}

impl Series {
    /// The most recent point.
    #[must_use]
    pub fn last_point(&self) -> Option<&Point> {
        self.points.last()
    }
}

/// Rendered view over the backing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSnapshot {
    /// Chart plugin.
    pub view: ViewType,
    /// Rows in the backing table.
    pub row_count: usize,
    /// Series, ordered by group then column.
    pub series: Vec<Series>,
}

impl ViewSnapshot {
    /// Find a series by label.
    #[must_use]
    pub fn series(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }
}

#[derive(Debug)]
struct Accumulator {
    aggregate: Aggregate,
    count: u64,
    sum: Decimal,
    low: Option<Decimal>,
    high: Option<Decimal>,
    last: Option<CellValue>,
    distinct: BTreeSet<CellValue>,
}

impl Accumulator {
    const fn new(aggregate: Aggregate) -> Self {
        Self {
            aggregate,
            count: 0,
            sum: Decimal::ZERO,
            low: None,
            high: None,
            last: None,
            distinct: BTreeSet::new(),
        }
    }

    fn push(&mut self, value: CellValue) {
        self.count += 1;

        if let Some(n) = value.as_number() {
            self.sum += n;
            self.low = Some(self.low.map_or(n, |low| low.min(n)));
            self.high = Some(self.high.map_or(n, |high| high.max(n)));
        }

        if self.aggregate == Aggregate::DistinctCount {
            self.distinct.insert(value);
        } else {
            self.last = Some(value);
        }
    }

    fn finish(&self) -> Option<Decimal> {
        match self.aggregate {
            Aggregate::Avg => (self.count > 0).then(|| self.sum / Decimal::from(self.count)),
            Aggregate::Sum => Some(self.sum),
            Aggregate::Count => Some(Decimal::from(self.count)),
            Aggregate::DistinctCount => Some(Decimal::from(self.distinct.len())),
            Aggregate::Last => self.last.as_ref().and_then(CellValue::as_number),
            Aggregate::Low => self.low,
            Aggregate::High => self.high,
        }
    }
}

type Cells = BTreeMap<Vec<CellValue>, Accumulator>;

fn pivot_values(row: &ChartRow, pivots: &[String]) -> Option<Vec<CellValue>> {
    pivots.iter().map(|column| row.value(column)).collect()
}

/// Render a view over a table.
///
/// Rows missing a pivot or column value are skipped for that cell. Cells whose
/// aggregate has no numeric result (for example `last` over text) produce no
/// point.
#[must_use]
pub fn render(config: &ViewConfig, table: &ChartTable) -> ViewSnapshot {
    let schema = table.schema();
    let mut groups: BTreeMap<(Vec<CellValue>, usize), Cells> = BTreeMap::new();

    for row in table.rows() {
        let Some(x) = pivot_values(row, &config.row_pivots) else {
            continue;
        };
        let Some(group) = pivot_values(row, &config.column_pivots) else {
            continue;
        };

        for (position, column) in config.columns.iter().enumerate() {
            let Some(value) = row.value(column) else {
                continue;
            };

            groups
                .entry((group.clone(), position))
                .or_default()
                .entry(x.clone())
                .or_insert_with(|| Accumulator::new(config.aggregate_for(column, schema)))
                .push(value);
        }
    }

    let series = groups
        .into_iter()
        .map(|((group, position), cells)| {
            let column = config.columns[position].clone();
            let name = group
                .iter()
                .map(ToString::to_string)
                .chain(std::iter::once(column.clone()))
                .collect::<Vec<_>>()
                .join("|");
            let points = cells
                .into_iter()
                .filter_map(|(x, acc)| acc.finish().map(|y| Point { x, y }))
                .collect();

            Series {
                name,
                group,
                column,
                points,
            }
        })
        .collect();

    ViewSnapshot {
        view: config.view,
        row_count: table.len(),
        series,
    }
}
