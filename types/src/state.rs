//! State enums for bounties and submitted transactions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// Lifecycle stage of a bounty as stored by the ledger.
///
/// Transitions only move forward: `Draft → Active → Dead`. Payment of an
/// accepted fulfillment does not change the stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    /// Created but not yet open for fulfillments.
    Draft,
    /// Funded and accepting fulfillments.
    Active,
    /// Cancelled and refunded. Terminal.
    Dead,
}

impl Stage {
    /// Wire code as stored in the ledger tuple.
    pub fn code(&self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Active => 1,
            Self::Dead => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Active => "Active",
            Self::Dead => "Dead",
        }
    }

    /// Whether the bounty accepts fulfill / accept / cancel calls.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dead)
    }
}

impl TryFrom<u8> for Stage {
    type Error = TypesError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Draft),
            1 => Ok(Self::Active),
            2 => Ok(Self::Dead),
            other => Err(TypesError::UnknownStage(other)),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Finality of a submitted transaction.
///
/// A submission only means the ledger accepted the request for processing;
/// callers must treat it as `Pending` until the ledger reports otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed { reason: String },
}

impl TxStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Confirmed => f.write_str("confirmed"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}
