//! RPC error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("config error: {0}")]
    Config(String),

    #[error("genesis error: {0}")]
    Genesis(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}
