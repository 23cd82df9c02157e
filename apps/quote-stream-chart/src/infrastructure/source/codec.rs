//! Quote Source Codec
//!
//! Decodes the data server's JSON responses into quote records.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! [
//!   {
//!     "id": "0.109974697771",
//!     "stock": "ABC",
//!     "timestamp": "2019-02-11 22:06:30.572453",
//!     "top_bid": {"price": 120.48, "size": 109},
//!     "top_ask": {"price": 121.2, "size": 36}
//!   }
//! ]
//! ```
//!
//! Timestamps are RFC 3339 or naive `YYYY-MM-DD HH:MM:SS[.ffffff]`, read as
//! UTC. A missing or `null` side decodes as `None`; so does a side without a
//! price. A record that fails to decode is skipped; the rest of the batch is
//! kept.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::quote::{PriceLevel, QuoteRecord};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Timestamp in none of the accepted formats.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Deserialize)]
struct WirePriceLevel {
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    size: Option<u64>,
}

impl WirePriceLevel {
    fn into_level(self) -> Option<PriceLevel> {
        self.price
            .map(|price| PriceLevel::new(price, self.size.unwrap_or_default()))
    }
}

#[derive(Debug, Deserialize)]
struct WireQuote {
    stock: String,
    #[serde(default)]
    top_ask: Option<WirePriceLevel>,
    #[serde(default)]
    top_bid: Option<WirePriceLevel>,
    timestamp: String,
}

impl WireQuote {
    fn into_record(self) -> Result<QuoteRecord, CodecError> {
        Ok(QuoteRecord {
            stock: self.stock,
            top_ask: self.top_ask.and_then(WirePriceLevel::into_level),
            top_bid: self.top_bid.and_then(WirePriceLevel::into_level),
            timestamp: parse_timestamp(&self.timestamp)?,
        })
    }
}

/// Parse a quote timestamp.
///
/// # Errors
///
/// Returns [`CodecError::InvalidTimestamp`] if no accepted format matches.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CodecError> {
    let trimmed = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| CodecError::InvalidTimestamp(trimmed.to_string()))
}

/// JSON codec for quote batches.
#[derive(Debug, Default, Clone)]
pub struct QuoteCodec;

impl QuoteCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a response body into quote records.
    ///
    /// Accepts an array of quotes or a single quote object.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not JSON or neither an array nor an
    /// object.
    pub fn decode(&self, text: &str) -> Result<Vec<QuoteRecord>, CodecError> {
        let trimmed = text.trim();

        if trimmed.starts_with('[') {
            let raw_array: Vec<serde_json::Value> = serde_json::from_str(trimmed)?;
            Ok(raw_array
                .into_iter()
                .enumerate()
                .filter_map(|(position, value)| self.decode_value(position, value))
                .collect())
        } else if trimmed.starts_with('{') {
            let wire: WireQuote = serde_json::from_str(trimmed)?;
            Ok(vec![wire.into_record()?])
        } else {
            Err(CodecError::InvalidFormat(format!(
                "expected JSON array or object, got: {}...",
                trimmed.chars().take(50).collect::<String>()
            )))
        }
    }

    fn decode_value(&self, position: usize, value: serde_json::Value) -> Option<QuoteRecord> {
        let decoded = serde_json::from_value::<WireQuote>(value)
            .map_err(CodecError::from)
            .and_then(WireQuote::into_record);

        match decoded {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(position, error = %e, "Skipping malformed quote");
                None
            }
        }
    }
}
