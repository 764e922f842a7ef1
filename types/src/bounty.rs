//! Bounty and fulfillment records.
//!
//! The ledger returns positional tuples ([`RawBounty`], [`RawFulfillment`]).
//! They are decoded into the named records [`Bounty`] and [`Fulfillment`]
//! at the client boundary; a malformed tuple is a decode error, never a
//! zero-valued record.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Identity, Stage, Timestamp, TypesError, Wei};

/// Positional identifier of a bounty (0, 1, 2, … in creation order).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BountyId(u64);

impl BountyId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u64> for BountyId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for BountyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `getBounty` result: `(issuer, arbiter, deadline, amount, title, description, stage)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBounty(
    pub Identity,
    pub Identity,
    pub u64,
    pub Wei,
    pub String,
    pub String,
    pub u8,
);

/// `getFulfillments` element: `(bounty_id, fulfiller, link, accepted)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFulfillment(pub u64, pub Identity, pub String, pub bool);

/// A decoded bounty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounty {
    pub id: BountyId,
    pub issuer: Identity,
    pub arbiter: Identity,
    pub deadline: Timestamp,
    pub fulfillment_amount: Wei,
    pub title: String,
    pub description: String,
    pub stage: Stage,
}

impl Bounty {
    /// Decode the ledger tuple for the bounty at position `id`.
    pub fn from_raw(id: BountyId, raw: RawBounty) -> Result<Self, TypesError> {
        let RawBounty(issuer, arbiter, deadline, amount, title, description, stage) = raw;
        Ok(Self {
            id,
            issuer,
            arbiter,
            deadline: Timestamp::new(deadline),
            fulfillment_amount: amount,
            title,
            description,
            stage: Stage::try_from(stage)?,
        })
    }

    pub fn to_raw(&self) -> RawBounty {
        RawBounty(
            self.issuer,
            self.arbiter,
            self.deadline.as_secs(),
            self.fulfillment_amount,
            self.title.clone(),
            self.description.clone(),
            self.stage.code(),
        )
    }

    /// Whether `who` may accept fulfillments on this bounty.
    pub fn can_accept(&self, who: &Identity) -> bool {
        *who == self.issuer || *who == self.arbiter
    }
}

/// A decoded fulfillment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub bounty_id: BountyId,
    /// Position within the bounty's fulfillment list.
    pub index: usize,
    pub fulfiller: Identity,
    pub link: String,
    pub accepted: bool,
}

impl Fulfillment {
    pub fn from_raw(index: usize, raw: RawFulfillment) -> Self {
        let RawFulfillment(bounty_id, fulfiller, link, accepted) = raw;
        Self {
            bounty_id: BountyId::new(bounty_id),
            index,
            fulfiller,
            link,
            accepted,
        }
    }

    pub fn to_raw(&self) -> RawFulfillment {
        RawFulfillment(self.bounty_id.value(), self.fulfiller, self.link.clone(), self.accepted)
    }
}
