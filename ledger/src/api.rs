//! The interface a client consumes to read and write the bounty ledger.

use std::future::Future;

use bounty_types::{BountyId, Identity, RawBounty, RawFulfillment, TxHash, TxStatus, Wei};

use crate::{LedgerError, TxRequest};

/// Read and write access to a bounty ledger.
///
/// Reads return the ledger's raw tuples; decoding into typed records is the
/// caller's job. Writes return as soon as the ledger accepts the request for
/// processing; finality is observed through [`BountyLedger::transaction_status`].
pub trait BountyLedger: Send + Sync {
    /// `getNumBounties()`: ids `0..n` are valid.
    fn num_bounties(&self) -> impl Future<Output = Result<u64, LedgerError>> + Send;

    /// `getBounty(id)`.
    fn get_bounty(
        &self,
        id: BountyId,
    ) -> impl Future<Output = Result<RawBounty, LedgerError>> + Send;

    /// `getFulfillments(id)`, in submission order.
    fn get_fulfillments(
        &self,
        id: BountyId,
    ) -> impl Future<Output = Result<Vec<RawFulfillment>, LedgerError>> + Send;

    /// Submit a state-changing request. Re-submitting a request with the same
    /// request id returns the original hash and is not applied twice.
    fn submit(
        &self,
        request: TxRequest,
    ) -> impl Future<Output = Result<TxHash, LedgerError>> + Send;

    fn transaction_status(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<TxStatus, LedgerError>> + Send;

    fn balance_of(&self, account: Identity)
        -> impl Future<Output = Result<Wei, LedgerError>> + Send;
}
