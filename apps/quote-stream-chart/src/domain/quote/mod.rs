//! Quote Records
//!
//! A quote record is one observation of a stock's best ask and best bid at a
//! point in time, as delivered by the quote source. Records are immutable once
//! received.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One side of the top of book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price at this level.
    pub price: Decimal,
    /// Size available at this level.
    #[serde(default)]
    pub size: u64,
}

impl PriceLevel {
    /// Create a new price level.
    #[must_use]
    pub const fn new(price: Decimal, size: u64) -> Self {
        Self { price, size }
    }
}

/// A stock quote observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    /// Stock symbol.
    pub stock: String,
    /// Best ask, if the source reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_ask: Option<PriceLevel>,
    /// Best bid, if the source reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_bid: Option<PriceLevel>,
    /// Observation time.
    pub timestamp: DateTime<Utc>,
}

impl QuoteRecord {
    /// Create a quote record with both sides of the book.
    #[must_use]
    pub fn new(
        stock: impl Into<String>,
        top_ask: Option<PriceLevel>,
        top_bid: Option<PriceLevel>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            stock: stock.into(),
            top_ask,
            top_bid,
            timestamp,
        }
    }

    /// Best ask price, or zero when the ask side is missing.
    #[must_use]
    pub fn ask_price_or_zero(&self) -> Decimal {
        self.top_ask.map_or(Decimal::ZERO, |level| level.price)
    }

    /// Best bid price, or zero when the bid side is missing.
    #[must_use]
    pub fn bid_price_or_zero(&self) -> Decimal {
        self.top_bid.map_or(Decimal::ZERO, |level| level.price)
    }
}
