use bounty_types::{BountyId, Identity, TxHash, TypesError, Wei};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a bounty ledger or by the transport in front of it.
///
/// Serializable so a remote ledger can hand the exact error back to the
/// client.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum LedgerError {
    #[error("ledger unreachable: {0}")]
    Connectivity(String),

    #[error("bounty {id} not found")]
    BountyNotFound { id: BountyId },

    #[error("fulfillment {index} of bounty {bounty} not found")]
    FulfillmentNotFound { bounty: BountyId, index: usize },

    #[error("bounty {bounty}: {reason}")]
    StateConflict { bounty: BountyId, reason: String },

    #[error("{who} is not permitted to {action}")]
    Unauthorized { who: Identity, action: String },

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Wei, available: Wei },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown transaction {0}")]
    UnknownTransaction(TxHash),

    #[error("malformed ledger data: {0}")]
    Decode(String),

    #[error("ledger internal error: {0}")]
    Internal(String),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Ledger or network unavailable; nothing was read or written.
    Connectivity,
    /// The referenced bounty, fulfillment or transaction does not exist.
    NotFound,
    /// The bounty is not in the state the operation requires.
    StateConflict,
    /// The sender is not the identity the operation requires.
    Authorization,
    /// The request itself is unacceptable (bad input, insufficient funds).
    InvalidRequest,
    Other,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connectivity(_) => ErrorKind::Connectivity,
            Self::BountyNotFound { .. }
            | Self::FulfillmentNotFound { .. }
            | Self::UnknownTransaction(_) => ErrorKind::NotFound,
            Self::StateConflict { .. } => ErrorKind::StateConflict,
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::InsufficientFunds { .. } | Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Decode(_) | Self::Internal(_) => ErrorKind::Other,
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    pub(crate) fn conflict(bounty: BountyId, reason: impl Into<String>) -> Self {
        Self::StateConflict {
            bounty,
            reason: reason.into(),
        }
    }
}

impl From<TypesError> for LedgerError {
    fn from(e: TypesError) -> Self {
        Self::Decode(e.to_string())
    }
}
