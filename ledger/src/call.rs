//! State-changing ledger calls and the signed-over request envelope.

use bounty_types::{BountyId, Identity, RequestId, Timestamp, TxHash, Wei};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One state-changing operation on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum LedgerCall {
    /// Create a bounty; the sender becomes issuer and deposits `amount`.
    IssueBounty {
        arbiter: Identity,
        deadline: Timestamp,
        amount: Wei,
        title: String,
        description: String,
    },
    /// Submit evidence of completed work.
    FulfillBounty { bounty: BountyId, link: String },
    /// Pay out to the fulfiller at `fulfillment`.
    AcceptFulfillment { bounty: BountyId, fulfillment: usize },
    /// Cancel and refund the issuer.
    KillBounty { bounty: BountyId },
}

impl LedgerCall {
    /// Contract-style method name, used in logs.
    pub fn method(&self) -> &'static str {
        match self {
            Self::IssueBounty { .. } => "issueBounty",
            Self::FulfillBounty { .. } => "fulfillBounty",
            Self::AcceptFulfillment { .. } => "acceptFulfillment",
            Self::KillBounty { .. } => "killBounty",
        }
    }

    /// The bounty this call targets, if it targets an existing one.
    pub fn bounty(&self) -> Option<BountyId> {
        match self {
            Self::IssueBounty { .. } => None,
            Self::FulfillBounty { bounty, .. }
            | Self::AcceptFulfillment { bounty, .. }
            | Self::KillBounty { bounty } => Some(*bounty),
        }
    }

    /// Whether the call settles the bounty's escrow (pays out or refunds).
    pub fn is_settlement(&self) -> bool {
        matches!(self, Self::AcceptFulfillment { .. } | Self::KillBounty { .. })
    }
}

impl fmt::Display for LedgerCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IssueBounty { title, amount, .. } => {
                write!(f, "issueBounty({title:?}, {amount})")
            }
            Self::FulfillBounty { bounty, link } => write!(f, "fulfillBounty({bounty}, {link:?})"),
            Self::AcceptFulfillment {
                bounty,
                fulfillment,
            } => write!(f, "acceptFulfillment({bounty}, {fulfillment})"),
            Self::KillBounty { bounty } => write!(f, "killBounty({bounty})"),
        }
    }
}

/// A call together with its sender and the client's request id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub request_id: RequestId,
    pub sender: Identity,
    pub call: LedgerCall,
}

impl TxRequest {
    pub fn new(sender: Identity, call: LedgerCall) -> Self {
        Self {
            request_id: RequestId::random(),
            sender,
            call,
        }
    }

    /// Deterministic transaction hash over request id, sender and call.
    pub fn hash(&self) -> TxHash {
        // Serializing a plain data enum to JSON cannot fail.
        let call = serde_json::to_vec(&self.call).unwrap_or_default();
        TxHash::digest(&[self.request_id.as_bytes(), self.sender.as_bytes(), &call])
    }
}
