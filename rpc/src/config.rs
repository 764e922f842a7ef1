//! Ledger service configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use bounty_types::{Identity, Wei};

use crate::RpcError;

/// An account funded when the service starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub account: Identity,
    /// Decimal ether text, e.g. `"100"` or `"0.5"`.
    pub ether: String,
}

/// Configuration for the development ledger service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port for the JSON-RPC endpoint. 0 picks a free port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Interval between produced blocks.
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,

    /// Whether to serve Prometheus metrics at `/metrics`.
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Blocks a confirmed or failed transaction stays queryable.
    #[serde(default = "default_status_retention_blocks")]
    pub status_retention_blocks: u64,

    /// Accounts funded at startup.
    #[serde(default)]
    pub genesis: Vec<GenesisAllocation>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7545
}

fn default_block_interval_ms() -> u64 {
    2_000
}

fn default_status_retention_blocks() -> u64 {
    bounty_ledger::DEFAULT_STATUS_RETENTION
}

fn default_true() -> bool {
    true
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, RpcError> {
        let content = std::fs::read_to_string(path).map_err(|e| RpcError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, RpcError> {
        let config: Self = toml::from_str(s).map_err(|e| RpcError::Config(e.to_string()))?;
        config.allocations()?;
        Ok(config)
    }

    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms.max(1))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Genesis allocations with ether text converted to wei.
    pub fn allocations(&self) -> Result<Vec<(Identity, Wei)>, RpcError> {
        self.genesis
            .iter()
            .map(|a| {
                Wei::parse_ether(&a.ether)
                    .map(|amount| (a.account, amount))
                    .map_err(|e| RpcError::Config(format!("genesis {}: {e}", a.account)))
            })
            .collect()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            block_interval_ms: default_block_interval_ms(),
            enable_metrics: default_true(),
            status_retention_blocks: default_status_retention_blocks(),
            genesis: Vec::new(),
        }
    }
}
