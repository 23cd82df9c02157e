//! Domain Layer - Quote records and the chart model.
//!
//! Pure data types and the keyed upsert and pivot logic behind the chart.
//! Nothing here performs I/O.

/// Quote records delivered by the quote source.
pub mod quote;

/// Chart schema, backing table and view rendering.
pub mod chart;
