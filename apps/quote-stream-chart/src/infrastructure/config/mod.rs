//! Configuration Module
//!
//! Configuration loading for the chart service.

mod settings;

pub use settings::{
    AppConfig, ConfigError, DEFAULT_SOURCE_URL, PollingSettings, ServerSettings, SourceSettings,
};
