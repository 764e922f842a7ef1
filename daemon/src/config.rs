//! `bountyd` configuration file: logging plus the client and server sections.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use bounty_client::ClientConfig;
use bounty_rpc::ServerConfig;
use bounty_utils::LogFormat;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in config file {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.client.validate()?;
        config.server.allocations()?;
        Ok(config)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            client: ClientConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        assert_eq!(DaemonConfig::from_toml_str("").unwrap(), DaemonConfig::default());
    }

    #[test]
    fn sections_override_independently() {
        let config = DaemonConfig::from_toml_str(
            r#"
            log_format = "json"

            [client]
            endpoint = "http://10.0.0.5:7545"

            [server]
            port = 9000

            [[server.genesis]]
            account = "0x782396570dcc0cb520b5e1661d4a359e3dc00f9e"
            ether = "100"
            "#,
        )
        .unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.client.endpoint, "http://10.0.0.5:7545");
        assert_eq!(config.client.max_concurrency, 16);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.genesis.len(), 1);
    }

    #[test]
    fn invalid_client_section_rejected() {
        assert!(DaemonConfig::from_toml_str("[client]\nsubmit_attempts = 0\n").is_err());
    }

    #[test]
    fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bountyd.toml");
        std::fs::write(&path, "log_level = \"debug\"\n").unwrap();
        assert_eq!(DaemonConfig::from_toml_file(&path).unwrap().log_level, "debug");
    }
}
