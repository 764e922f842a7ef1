//! Fundamental types for the bounty protocol.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! account identities, amounts, timestamps, transaction hashes, the bounty stage
//! enum, and both the raw ledger tuples and the typed records decoded from them.

pub mod amount;
pub mod bounty;
pub mod error;
pub mod hash;
pub mod identity;
pub mod request;
pub mod state;
pub mod time;

pub use amount::{Wei, ETHER_DECIMALS, WEI_PER_ETHER};
pub use bounty::{Bounty, BountyId, Fulfillment, RawBounty, RawFulfillment};
pub use error::TypesError;
pub use hash::TxHash;
pub use identity::Identity;
pub use request::RequestId;
pub use state::{Stage, TxStatus};
pub use time::Timestamp;
