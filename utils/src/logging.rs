//! Structured logging initialisation via `tracing`.
//!
//! Two output formats are supported:
//! - [`LogFormat::Human`]: readable lines for terminals.
//! - [`LogFormat::Json`]: newline-delimited JSON for log aggregation.
//!
//! `RUST_LOG` overrides the caller-supplied level when set (e.g. `"info"`,
//! `"debug,bounty_client=trace"`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{fmt as layer_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unknown log format {0:?} (expected \"human\" or \"json\")")]
    UnknownFormat(String),

    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Selects the output format for structured logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => f.write_str("human"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_logging(format: LogFormat, level: &str) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
            filter: level.to_string(),
            reason: e.to_string(),
        })?,
    };

    let result = match format {
        LogFormat::Human => tracing_subscriber::registry()
            .with(filter)
            .with(layer_fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                layer_fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.map_err(|_| LoggingError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn format_deserializes_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            log_format: LogFormat,
        }
        let w: Wrapper = toml::from_str(r#"log_format = "json""#).unwrap();
        assert_eq!(w.log_format, LogFormat::Json);
    }

    #[test]
    fn second_init_reports_already_initialized() {
        let _ = init_logging(LogFormat::Human, "warn");
        assert!(matches!(
            init_logging(LogFormat::Human, "warn"),
            Err(LoggingError::AlreadyInitialized)
        ));
    }
}
