//! HTTP quote source adapter.

use std::time::Duration;

use async_trait::async_trait;

use super::codec::QuoteCodec;
use crate::application::ports::{QuoteSource, SourceError};
use crate::domain::quote::QuoteRecord;

/// Quote source polling the data server over HTTP.
///
/// Implements `QuoteSource` with one `GET` per batch.
#[derive(Debug)]
pub struct HttpQuoteSource {
    client: reqwest::Client,
    url: reqwest::Url,
    codec: QuoteCodec,
}

impl HttpQuoteSource {
    /// Create a new HTTP quote source.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: reqwest::Url, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url,
            codec: QuoteCodec::new(),
        })
    }

    /// Endpoint polled for batches.
    #[must_use]
    pub const fn url(&self) -> &reqwest::Url {
        &self.url
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch_batch(&self) -> Result<Vec<QuoteRecord>, SourceError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        self.codec
            .decode(&body)
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}
