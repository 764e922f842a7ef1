//! Bounty ledger.
//!
//! The ledger is the authoritative store of bounty and fulfillment records.
//! Clients talk to it through the [`BountyLedger`] interface; this crate also
//! carries an in-process implementation of the ledger's rules
//! ([`BountyRegistry`]) and a development chain ([`DevChain`]) that layers
//! pending/confirmed transaction semantics on top of it.

pub mod api;
pub mod call;
pub mod chain;
pub mod error;
pub mod registry;

pub use api::BountyLedger;
pub use call::{LedgerCall, TxRequest};
pub use chain::{DevChain, Inclusion, DEFAULT_STATUS_RETENTION};
pub use error::{ErrorKind, LedgerError};
pub use registry::{BountyRegistry, Effect};
