//! Decoding and parsing errors for protocol types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown bounty stage: {0}")]
    UnknownStage(u8),

    #[error("invalid transaction hash: {0}")]
    InvalidHash(String),

    #[error("invalid request id: {0}")]
    InvalidRequestId(String),
}
