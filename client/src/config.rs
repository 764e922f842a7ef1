//! Client configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use bounty_types::Identity;

use crate::ClientError;

/// Configuration for a bounty client.
///
/// Can be loaded from a TOML file via [`ClientConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Ledger JSON-RPC endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Sender identity for writes. Reads work without one.
    #[serde(default)]
    pub account: Option<Identity>,

    /// Per-request timeout for every ledger call.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum reads in flight during a fan-out.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Total submission attempts for a write when the ledger is unreachable.
    #[serde(default = "default_submit_attempts")]
    pub submit_attempts: u32,

    /// Pause between submission attempts.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Interval between confirmation polls.
    #[serde(default = "default_confirm_poll_ms")]
    pub confirm_poll_ms: u64,

    /// How long to wait for a submitted transaction to become final.
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_endpoint() -> String {
    "http://127.0.0.1:7545".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_concurrency() -> usize {
    16
}

fn default_submit_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_confirm_poll_ms() -> u64 {
    1_000
}

fn default_confirm_timeout_ms() -> u64 {
    60_000
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, ClientError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ClientError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ClientError> {
        let config: Self = toml::from_str(s).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.max_concurrency == 0 {
            return Err(ClientError::Config("max_concurrency must be at least 1".into()));
        }
        if self.submit_attempts == 0 {
            return Err(ClientError::Config("submit_attempts must be at least 1".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ClientError::Config("request_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn confirm_poll(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            account: None,
            request_timeout_ms: default_request_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            submit_attempts: default_submit_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            confirm_poll_ms: default_confirm_poll_ms(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
        }
    }
}
