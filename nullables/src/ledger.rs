//! Nullable ledger: an in-memory [`BountyLedger`] with fault injection.
//!
//! Wraps a [`DevChain`] so bounty rules behave exactly as on the dev ledger
//! service, and adds knobs tests need: going offline, failing reads of chosen
//! bounties, losing submit responses, delaying reads, and mining on poll.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use bounty_ledger::{BountyLedger, DevChain, LedgerCall, LedgerError, TxRequest};
use bounty_types::{
    BountyId, Identity, RawBounty, RawFulfillment, Timestamp, TxHash, TxStatus, Wei,
};

use crate::NullClock;

#[derive(Default)]
struct Faults {
    offline: bool,
    failing_bounty_reads: HashSet<BountyId>,
    failing_fulfillment_reads: HashSet<BountyId>,
    lost_submit_responses: usize,
    read_delay: Option<Duration>,
    mine_on_poll: bool,
}

/// In-memory ledger for tests.
pub struct NullLedger {
    chain: Mutex<DevChain>,
    clock: NullClock,
    faults: Mutex<Faults>,
    /// Every ledger call received, e.g. `"get_bounty:3"`, in arrival order.
    calls: Mutex<Vec<String>>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self {
            chain: Mutex::new(DevChain::new()),
            clock: NullClock::default(),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn clock(&self) -> &NullClock {
        &self.clock
    }

    pub fn fund(&self, account: Identity, amount: Wei) {
        self.chain.lock().unwrap().fund(account, amount).unwrap();
    }

    /// Create a confirmed bounty directly, bypassing the client.
    ///
    /// # Panics
    /// Panics if the ledger rejects the bounty (e.g. issuer not funded).
    pub fn issue(
        &self,
        issuer: Identity,
        arbiter: Identity,
        deadline: Timestamp,
        amount: Wei,
        title: &str,
        description: &str,
    ) -> BountyId {
        let mut chain = self.chain.lock().unwrap();
        let id = BountyId::new(chain.registry().num_bounties());
        let request = TxRequest::new(
            issuer,
            LedgerCall::IssueBounty {
                arbiter,
                deadline,
                amount,
                title: title.to_string(),
                description: description.to_string(),
            },
        );
        let hash = chain.submit(request, self.clock.now()).unwrap();
        chain.mine(self.clock.now());
        assert_eq!(chain.status(&hash).unwrap(), TxStatus::Confirmed);
        id
    }

    /// Apply a call directly and confirm it, bypassing the client.
    pub fn apply(&self, sender: Identity, call: LedgerCall) -> Result<TxHash, LedgerError> {
        let mut chain = self.chain.lock().unwrap();
        let hash = chain.submit(TxRequest::new(sender, call), self.clock.now())?;
        chain.mine(self.clock.now());
        match chain.status(&hash)? {
            TxStatus::Failed { reason } => Err(LedgerError::Internal(reason)),
            _ => Ok(hash),
        }
    }

    /// Include all pending transactions.
    pub fn mine(&self) -> usize {
        self.chain.lock().unwrap().mine(self.clock.now()).len()
    }

    pub fn pending_count(&self) -> usize {
        self.chain.lock().unwrap().pending_count()
    }

    pub fn escrow_of(&self, id: BountyId) -> Wei {
        self.chain.lock().unwrap().registry().escrow_of(id).unwrap()
    }

    // ── Fault injection ────────────────────────────────────────────────

    /// Every call fails with a connectivity error while offline.
    pub fn set_offline(&self, offline: bool) {
        self.faults.lock().unwrap().offline = offline;
    }

    pub fn fail_bounty_read(&self, id: BountyId) {
        self.faults.lock().unwrap().failing_bounty_reads.insert(id);
    }

    pub fn fail_fulfillment_read(&self, id: BountyId) {
        self.faults.lock().unwrap().failing_fulfillment_reads.insert(id);
    }

    pub fn clear_read_failures(&self) {
        let mut faults = self.faults.lock().unwrap();
        faults.failing_bounty_reads.clear();
        faults.failing_fulfillment_reads.clear();
    }

    /// The next `n` submissions reach the ledger but the caller sees a
    /// connectivity error instead of the hash.
    pub fn lose_submit_responses(&self, n: usize) {
        self.faults.lock().unwrap().lost_submit_responses = n;
    }

    /// Delay every read by `delay` (tokio time).
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.faults.lock().unwrap().read_delay = delay;
    }

    /// Produce a block before answering each status poll.
    pub fn set_mine_on_poll(&self, enabled: bool) {
        self.faults.lock().unwrap().mine_on_poll = enabled;
    }

    // ── Assertions ─────────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) -> Result<(), LedgerError> {
        self.calls.lock().unwrap().push(call);
        if self.faults.lock().unwrap().offline {
            return Err(LedgerError::Connectivity("null ledger is offline".into()));
        }
        Ok(())
    }

    async fn read_delay(&self) {
        let delay = self.faults.lock().unwrap().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl BountyLedger for NullLedger {
    async fn num_bounties(&self) -> Result<u64, LedgerError> {
        self.record("num_bounties".into())?;
        self.read_delay().await;
        Ok(self.chain.lock().unwrap().registry().num_bounties())
    }

    async fn get_bounty(&self, id: BountyId) -> Result<RawBounty, LedgerError> {
        self.record(format!("get_bounty:{id}"))?;
        self.read_delay().await;
        if self.faults.lock().unwrap().failing_bounty_reads.contains(&id) {
            return Err(LedgerError::Connectivity(format!("injected failure reading bounty {id}")));
        }
        self.chain.lock().unwrap().registry().get_bounty(id)
    }

    async fn get_fulfillments(&self, id: BountyId) -> Result<Vec<RawFulfillment>, LedgerError> {
        self.record(format!("get_fulfillments:{id}"))?;
        self.read_delay().await;
        if self.faults.lock().unwrap().failing_fulfillment_reads.contains(&id) {
            return Err(LedgerError::Connectivity(format!(
                "injected failure reading fulfillments of {id}"
            )));
        }
        self.chain.lock().unwrap().registry().get_fulfillments(id)
    }

    async fn submit(&self, request: TxRequest) -> Result<TxHash, LedgerError> {
        self.record(format!("submit:{}", request.call.method()))?;
        let hash = self.chain.lock().unwrap().submit(request, self.clock.now())?;
        let mut faults = self.faults.lock().unwrap();
        if faults.lost_submit_responses > 0 {
            faults.lost_submit_responses -= 1;
            return Err(LedgerError::Connectivity("response lost after submit".into()));
        }
        Ok(hash)
    }

    async fn transaction_status(&self, hash: TxHash) -> Result<TxStatus, LedgerError> {
        self.record(format!("transaction_status:{hash}"))?;
        let mine = self.faults.lock().unwrap().mine_on_poll;
        let mut chain = self.chain.lock().unwrap();
        if mine {
            chain.mine(self.clock.now());
        }
        chain.status(&hash)
    }

    async fn balance_of(&self, account: Identity) -> Result<Wei, LedgerError> {
        self.record(format!("balance_of:{account}"))?;
        Ok(self.chain.lock().unwrap().registry().balance_of(&account))
    }
}
