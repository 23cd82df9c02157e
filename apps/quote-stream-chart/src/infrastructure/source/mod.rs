//! Quote Source Adapters
//!
//! - **HTTP**: polls the data server's query endpoint (JSON codec)

pub mod codec;
pub mod http;

pub use codec::{CodecError, QuoteCodec, parse_timestamp};
pub use http::HttpQuoteSource;
