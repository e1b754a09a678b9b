//! Structured logging initialization.
//!
//! The framework itself only emits `tracing` events; installing a subscriber is
//! the host's choice. This module provides the stock setup: an `EnvFilter`
//! plus a JSON (production) or pretty (development) `fmt` layer.

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level: trace/debug/info/warn/error
    pub log_level: String,
    /// Log format: json/pretty
    pub format: LogFormat,
    /// Extra `EnvFilter` directives (comma-separated)
    pub target_filter: Option<String>,
    /// Include file:line location
    pub include_location: bool,
}

impl LogConfig {
    /// Parse configuration from `YAF_LOG_*` environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("YAF_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: LogFormat::parse(
                &env::var("YAF_LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            ),
            target_filter: env::var("YAF_LOG_TARGET_FILTER").ok(),
            include_location: env::var("YAF_LOG_INCLUDE_LOCATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
        }
    }

    /// Verbose configuration for tests and local runs
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
            include_location: true,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Build the filter; `RUST_LOG` wins over the configured level.
    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));

        if let Some(target_filter) = &self.target_filter {
            for directive in target_filter.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                match directive.parse() {
                    Ok(d) => filter = filter.add_directive(d),
                    Err(_) => eprintln!("Warning: Invalid log filter directive: {directive}"),
                }
            }
        }
        filter
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails (without panicking) if a global subscriber is already installed.
///
/// ```no_run
/// use yaf::logging::{LogConfig, init_logging_with_config};
///
/// init_logging_with_config(&LogConfig::from_env()).expect("logging");
/// ```
pub fn init_logging_with_config(config: &LogConfig) -> Result<()> {
    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_span_list(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("invalid"), LogFormat::Json);
    }

    #[test]
    fn test_default_dev() {
        let config = LogConfig::default_dev();
        assert_eq!(config.level(), Level::DEBUG);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.include_location);
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let mut config = LogConfig::default_dev();
        config.log_level = "chatty".to_string();
        assert_eq!(config.level(), Level::INFO);
    }
}
