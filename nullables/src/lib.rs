//! Nullable infrastructure for deterministic testing.
//!
//! The ledger and the clock are external collaborators of the client. This
//! crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically (time, block production, faults)
//! - Never touch the network
//!
//! Usage: swap the RPC-backed ledger for [`NullLedger`] in tests.

pub mod clock;
pub mod ledger;

pub use clock::NullClock;
pub use ledger::NullLedger;
