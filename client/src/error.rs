use bounty_ledger::{ErrorKind, LedgerError};
use bounty_types::{BountyId, TxHash};
use std::fmt;
use thiserror::Error;

/// Which wave of a batched read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Bounties,
    Fulfillments,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounties => f.write_str("bounty"),
            Self::Fulfillments => f.write_str("fulfillment"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{phase} fetch for bounty {id} failed, batch aborted: {source}")]
    BatchAborted {
        phase: Phase,
        id: BountyId,
        source: LedgerError,
    },

    #[error("an overlapping request is already pending as {hash}: {call}")]
    AlreadyPending { hash: String, call: String },

    #[error("transaction {hash} failed: {reason}")]
    TransactionFailed { hash: TxHash, reason: String },

    #[error("transaction {hash} still pending after {waited_ms} ms")]
    ConfirmationTimeout { hash: TxHash, waited_ms: u64 },

    #[error("no account configured for writes")]
    NoAccount,

    #[error("config error: {0}")]
    Config(String),
}

impl ClientError {
    /// Classify the error the same way ledger errors are classified.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Ledger(e) => e.kind(),
            Self::BatchAborted { source, .. } => source.kind(),
            Self::AlreadyPending { .. } | Self::TransactionFailed { .. } => {
                ErrorKind::StateConflict
            }
            Self::ConfirmationTimeout { .. } => ErrorKind::Connectivity,
            Self::NoAccount | Self::Config(_) => ErrorKind::Other,
        }
    }

    /// The underlying ledger error, if there is one.
    pub fn ledger_error(&self) -> Option<&LedgerError> {
        match self {
            Self::Ledger(e) | Self::BatchAborted { source: e, .. } => Some(e),
            _ => None,
        }
    }
}
