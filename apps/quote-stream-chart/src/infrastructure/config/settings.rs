//! Chart Service Configuration Settings
//!
//! Configuration types for the quote stream chart, loaded from environment
//! variables. Unparsable values fall back to their defaults.

use std::time::Duration;

use crate::application::services::PollSettings;

/// Default quote source endpoint.
pub const DEFAULT_SOURCE_URL: &str = "http://localhost:8080/query?id=1";

/// Quote source settings.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Endpoint polled for batches.
    pub url: reqwest::Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for SourceSettings {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self {
            url: reqwest::Url::parse(DEFAULT_SOURCE_URL).expect("default source URL is valid"),
            timeout: Duration::from_millis(2000),
        }
    }
}

/// Polling loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingSettings {
    /// Time between fetches.
    pub interval: Duration,
    /// Fetches per streaming session.
    pub max_attempts: u32,
    /// End the session on an empty batch.
    pub stop_on_empty_batch: bool,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_attempts: 1000,
            stop_on_empty_batch: false,
        }
    }
}

impl From<PollingSettings> for PollSettings {
    fn from(settings: PollingSettings) -> Self {
        Self {
            interval: settings.interval,
            max_attempts: settings.max_attempts,
            stop_on_empty_batch: settings.stop_on_empty_batch,
        }
    }
}

/// Control server settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Control and health HTTP port.
    pub port: u16,
    /// Start streaming as soon as the service is up.
    pub auto_start: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8090,
            auto_start: false,
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Quote source settings.
    pub source: SourceSettings,
    /// Polling loop settings.
    pub polling: PollingSettings,
    /// Control server settings.
    pub server: ServerSettings,
    /// Capacity of the controller to renderer batch channel.
    pub batch_channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceSettings::default(),
            polling: PollingSettings::default(),
            server: ServerSettings::default(),
            batch_channel_capacity: 256,
        }
    }
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the source URL is invalid or a polling limit is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from a key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the source URL is invalid or a polling limit is zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let url = match lookup("QUOTE_SOURCE_URL").filter(|v| !v.trim().is_empty()) {
            Some(raw) => reqwest::Url::parse(raw.trim())
                .map_err(|e| ConfigError::InvalidUrl(raw.clone(), e.to_string()))?,
            None => defaults.source.url,
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(
                url.to_string(),
                format!("unsupported scheme {}", url.scheme()),
            ));
        }

        let source = SourceSettings {
            url,
            timeout: parse_duration_millis(
                &lookup,
                "QUOTE_SOURCE_TIMEOUT_MS",
                defaults.source.timeout,
            ),
        };

        let polling = PollingSettings {
            interval: parse_duration_millis(
                &lookup,
                "POLL_INTERVAL_MS",
                defaults.polling.interval,
            ),
            max_attempts: parse_u32(&lookup, "POLL_MAX_ATTEMPTS", defaults.polling.max_attempts),
            stop_on_empty_batch: parse_bool(
                &lookup,
                "POLL_STOP_ON_EMPTY_BATCH",
                defaults.polling.stop_on_empty_batch,
            ),
        };

        if polling.interval.is_zero() {
            return Err(ConfigError::ZeroValue("POLL_INTERVAL_MS".to_string()));
        }
        if polling.max_attempts == 0 {
            return Err(ConfigError::ZeroValue("POLL_MAX_ATTEMPTS".to_string()));
        }

        let server = ServerSettings {
            port: parse_u16(&lookup, "CHART_SERVER_PORT", defaults.server.port),
            auto_start: parse_bool(&lookup, "CHART_AUTO_START", defaults.server.auto_start),
        };

        let batch_channel_capacity = parse_usize(
            &lookup,
            "BATCH_CHANNEL_CAPACITY",
            defaults.batch_channel_capacity,
        )
        .max(1);

        Ok(Self {
            source,
            polling,
            server,
            batch_channel_capacity,
        })
    }
}

/// Configuration error.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Source URL cannot be used.
    #[error("invalid quote source URL {0}: {1}")]
    InvalidUrl(String, String),
    /// Setting must be greater than zero.
    #[error("environment variable {0} must be greater than zero")]
    ZeroValue(String),
}

fn parse_u16(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u16) -> u16 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_u32(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> u32 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    lookup(key).map_or(default, |v| match v.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => default,
    })
}

fn parse_duration_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
