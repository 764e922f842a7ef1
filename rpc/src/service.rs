//! The ledger behind the HTTP surface: a [`DevChain`] under an async mutex.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use bounty_ledger::{BountyLedger, DevChain, Inclusion, LedgerError, TxRequest};
use bounty_types::{BountyId, Identity, RawBounty, RawFulfillment, Timestamp, TxHash, TxStatus, Wei};

use crate::{LedgerMetrics, RpcError, ShutdownSignal};

pub struct LedgerService {
    chain: Mutex<DevChain>,
    metrics: Option<Arc<LedgerMetrics>>,
}

impl LedgerService {
    pub fn new(chain: DevChain) -> Self {
        Self {
            chain: Mutex::new(chain),
            metrics: None,
        }
    }

    /// A fresh chain with `allocations` funded.
    pub fn from_genesis(allocations: &[(Identity, Wei)]) -> Result<Self, RpcError> {
        let mut chain = DevChain::new();
        for (account, amount) in allocations {
            chain
                .fund(*account, *amount)
                .map_err(|e| RpcError::Genesis(e.to_string()))?;
            info!(%account, %amount, "genesis allocation");
        }
        Ok(Self::new(chain))
    }

    pub fn with_status_retention(mut self, blocks: u64) -> Self {
        self.chain.get_mut().set_status_retention(blocks);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<LedgerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&LedgerMetrics> {
        self.metrics.as_deref()
    }

    pub async fn height(&self) -> u64 {
        self.chain.lock().await.height()
    }

    pub async fn pending_count(&self) -> usize {
        self.chain.lock().await.pending_count()
    }

    /// Include every pending transaction at the current time.
    pub async fn produce_block(&self) -> Vec<Inclusion> {
        self.produce_block_at(Timestamp::now()).await
    }

    pub async fn produce_block_at(&self, now: Timestamp) -> Vec<Inclusion> {
        let mut chain = self.chain.lock().await;
        let included = chain.mine(now);
        if let Some(metrics) = &self.metrics {
            if !included.is_empty() {
                metrics.blocks_produced.inc();
            }
            for inclusion in &included {
                match inclusion.status {
                    TxStatus::Confirmed => metrics.transactions_confirmed.inc(),
                    _ => metrics.transactions_failed.inc(),
                }
            }
            metrics.block_height.set(chain.height() as i64);
            metrics.pending_transactions.set(chain.pending_count() as i64);
            metrics
                .bounty_count
                .set(chain.registry().num_bounties() as i64);
        }
        included
    }
}

/// Produce a block every `interval` until shutdown is signalled.
pub async fn produce_blocks(
    service: Arc<LedgerService>,
    interval: Duration,
    mut shutdown: ShutdownSignal,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(interval_ms = interval.as_millis() as u64, "block producer started");
    loop {
        tokio::select! {
            _ = shutdown.triggered() => break,
            _ = ticker.tick() => {
                let included = service.produce_block().await;
                if !included.is_empty() {
                    debug!(count = included.len(), "block included transactions");
                }
            }
        }
    }
    info!("block producer stopped");
}

impl BountyLedger for LedgerService {
    async fn num_bounties(&self) -> Result<u64, LedgerError> {
        Ok(self.chain.lock().await.registry().num_bounties())
    }

    async fn get_bounty(&self, id: BountyId) -> Result<RawBounty, LedgerError> {
        self.chain.lock().await.registry().get_bounty(id)
    }

    async fn get_fulfillments(&self, id: BountyId) -> Result<Vec<RawFulfillment>, LedgerError> {
        self.chain.lock().await.registry().get_fulfillments(id)
    }

    async fn submit(&self, request: TxRequest) -> Result<TxHash, LedgerError> {
        let mut chain = self.chain.lock().await;
        let before = chain.pending_count();
        let hash = chain.submit(request, Timestamp::now())?;
        if let Some(metrics) = &self.metrics {
            if chain.pending_count() > before {
                metrics.transactions_submitted.inc();
            }
            metrics.pending_transactions.set(chain.pending_count() as i64);
        }
        Ok(hash)
    }

    async fn transaction_status(&self, hash: TxHash) -> Result<TxStatus, LedgerError> {
        self.chain.lock().await.status(&hash)
    }

    async fn balance_of(&self, account: Identity) -> Result<Wei, LedgerError> {
        Ok(self.chain.lock().await.registry().balance_of(&account))
    }
}
