//! Development chain: a [`BountyRegistry`] behind a pending-transaction pool.
//!
//! Submissions are pre-flighted against current state and queued; nothing
//! changes until [`DevChain::mine`] includes them. A call that passed the
//! pre-flight can still fail at inclusion when an earlier call in the same
//! block changed the bounty, exactly as on a real chain.

use std::collections::{HashMap, VecDeque};

use bounty_types::{Identity, RequestId, Timestamp, TxHash, TxStatus, Wei};
use tracing::{debug, info, warn};

use crate::{BountyRegistry, Effect, LedgerError, TxRequest};

/// Blocks a resolved transaction stays queryable by default.
pub const DEFAULT_STATUS_RETENTION: u64 = 10_000;

/// Result of including one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inclusion {
    pub hash: TxHash,
    pub status: TxStatus,
    pub effect: Option<Effect>,
}

/// Statuses and request ids of resolved transactions are kept for
/// `retention` blocks after the block that included them, then dropped.
/// A dropped hash reports [`LedgerError::UnknownTransaction`] and a dropped
/// request id is no longer deduplicated.
#[derive(Debug)]
pub struct DevChain {
    registry: BountyRegistry,
    pending: VecDeque<(TxHash, TxRequest)>,
    statuses: HashMap<TxHash, TxStatus>,
    by_request: HashMap<RequestId, TxHash>,
    /// Included transactions, oldest first, with the height that included them.
    resolved: VecDeque<(u64, TxHash, RequestId)>,
    retention: u64,
    height: u64,
}

impl Default for DevChain {
    fn default() -> Self {
        Self {
            registry: BountyRegistry::default(),
            pending: VecDeque::new(),
            statuses: HashMap::new(),
            by_request: HashMap::new(),
            resolved: VecDeque::new(),
            retention: DEFAULT_STATUS_RETENTION,
            height: 0,
        }
    }
}

impl DevChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: BountyRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    /// Keep resolved statuses for `blocks` blocks (at least one).
    pub fn set_status_retention(&mut self, blocks: u64) {
        self.retention = blocks.max(1);
    }

    pub fn registry(&self) -> &BountyRegistry {
        &self.registry
    }

    /// Genesis-style allocation, applied immediately.
    pub fn fund(&mut self, account: Identity, amount: Wei) -> Result<(), LedgerError> {
        self.registry.fund(account, amount)
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Queue a request after validating it against current state.
    ///
    /// A request id seen before returns the hash it was first given, whatever
    /// became of that transaction.
    pub fn submit(&mut self, request: TxRequest, now: Timestamp) -> Result<TxHash, LedgerError> {
        if let Some(hash) = self.by_request.get(&request.request_id) {
            debug!(request_id = %request.request_id, %hash, "duplicate submission");
            return Ok(*hash);
        }

        self.registry.check(&request.sender, &request.call, now)?;

        let hash = request.hash();
        info!(%hash, sender = %request.sender, call = %request.call, "transaction queued");
        self.by_request.insert(request.request_id, hash);
        self.statuses.insert(hash, TxStatus::Pending);
        self.pending.push_back((hash, request));
        Ok(hash)
    }

    /// Include every pending transaction, in submission order.
    pub fn mine(&mut self, now: Timestamp) -> Vec<Inclusion> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        self.height += 1;

        let mut included = Vec::with_capacity(self.pending.len());
        while let Some((hash, request)) = self.pending.pop_front() {
            let (status, effect) = match self.registry.apply(&request.sender, &request.call, now) {
                Ok(effect) => (TxStatus::Confirmed, Some(effect)),
                Err(e) => {
                    warn!(%hash, call = %request.call, error = %e, "transaction failed at inclusion");
                    (TxStatus::Failed { reason: e.to_string() }, None)
                }
            };
            self.statuses.insert(hash, status.clone());
            self.resolved.push_back((self.height, hash, request.request_id));
            included.push(Inclusion {
                hash,
                status,
                effect,
            });
        }
        debug!(height = self.height, count = included.len(), "block produced");
        self.prune();
        included
    }

    fn prune(&mut self) {
        let mut dropped = 0usize;
        while let Some(&(height, hash, request_id)) = self.resolved.front() {
            if self.height - height < self.retention {
                break;
            }
            self.resolved.pop_front();
            self.statuses.remove(&hash);
            self.by_request.remove(&request_id);
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, retained = self.resolved.len(), "pruned resolved transactions");
        }
    }

    pub fn status(&self, hash: &TxHash) -> Result<TxStatus, LedgerError> {
        self.statuses
            .get(hash)
            .cloned()
            .ok_or(LedgerError::UnknownTransaction(*hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LedgerCall;
    use bounty_types::BountyId;

    fn id(byte: u8) -> Identity {
        Identity::new([byte; 20])
    }

    fn chain_with_bounty() -> DevChain {
        let mut chain = DevChain::new();
        chain.fund(id(1), Wei::from_ether(1).unwrap()).unwrap();
        let issue = TxRequest::new(
            id(1),
            LedgerCall::IssueBounty {
                arbiter: id(1),
                deadline: Timestamp::new(10_000),
                amount: Wei::parse_ether("0.01").unwrap(),
                title: "What is the latest Ethereum news?".into(),
                description: "Find the latest blog posts and provide a brief summary.".into(),
            },
        );
        chain.submit(issue, Timestamp::EPOCH).unwrap();
        chain.mine(Timestamp::EPOCH);
        chain
    }

    #[test]
    fn submission_is_pending_until_mined() {
        let mut chain = chain_with_bounty();
        let req = TxRequest::new(
            id(2),
            LedgerCall::FulfillBounty {
                bounty: BountyId::new(0),
                link: "https://example.org/post".into(),
            },
        );
        let hash = chain.submit(req, Timestamp::EPOCH).unwrap();
        assert_eq!(chain.status(&hash).unwrap(), TxStatus::Pending);
        assert!(chain.registry().get_fulfillments(BountyId::new(0)).unwrap().is_empty());

        let included = chain.mine(Timestamp::EPOCH);
        assert_eq!(included.len(), 1);
        assert_eq!(chain.status(&hash).unwrap(), TxStatus::Confirmed);
        assert_eq!(chain.registry().get_fulfillments(BountyId::new(0)).unwrap().len(), 1);
        assert_eq!(chain.height(), 2);
    }

    #[test]
    fn resubmitting_same_request_id_is_deduplicated() {
        let mut chain = chain_with_bounty();
        let req = TxRequest::new(
            id(2),
            LedgerCall::FulfillBounty {
                bounty: BountyId::new(0),
                link: "https://example.org/post".into(),
            },
        );
        let first = chain.submit(req.clone(), Timestamp::EPOCH).unwrap();
        let second = chain.submit(req, Timestamp::EPOCH).unwrap();
        assert_eq!(first, second);
        assert_eq!(chain.pending_count(), 1);
        chain.mine(Timestamp::EPOCH);
        assert_eq!(chain.registry().get_fulfillments(BountyId::new(0)).unwrap().len(), 1);
    }

    #[test]
    fn preflight_rejects_without_queueing() {
        let mut chain = chain_with_bounty();
        let req = TxRequest::new(
            id(2),
            LedgerCall::FulfillBounty {
                bounty: BountyId::new(5),
                link: "https://example.org/post".into(),
            },
        );
        let err = chain.submit(req, Timestamp::EPOCH).unwrap_err();
        assert_eq!(err, LedgerError::BountyNotFound { id: BountyId::new(5) });
        assert_eq!(chain.pending_count(), 0);
    }

    #[test]
    fn second_settlement_in_same_block_fails_at_inclusion() {
        let mut chain = chain_with_bounty();
        let kill = || {
            TxRequest::new(
                id(1),
                LedgerCall::KillBounty {
                    bounty: BountyId::new(0),
                },
            )
        };
        let a = chain.submit(kill(), Timestamp::EPOCH).unwrap();
        let b = chain.submit(kill(), Timestamp::EPOCH).unwrap();
        chain.mine(Timestamp::EPOCH);
        assert_eq!(chain.status(&a).unwrap(), TxStatus::Confirmed);
        assert!(matches!(chain.status(&b).unwrap(), TxStatus::Failed { .. }));
    }

    #[test]
    fn resolved_statuses_expire_after_retention() {
        let mut chain = chain_with_bounty();
        chain.set_status_retention(1);
        let fulfill = TxRequest::new(
            id(2),
            LedgerCall::FulfillBounty {
                bounty: BountyId::new(0),
                link: "https://example.org/post".into(),
            },
        );
        let hash = chain.submit(fulfill.clone(), Timestamp::EPOCH).unwrap();
        chain.mine(Timestamp::EPOCH);
        assert_eq!(chain.status(&hash).unwrap(), TxStatus::Confirmed);
        assert_eq!(chain.submit(fulfill.clone(), Timestamp::EPOCH).unwrap(), hash);
        assert_eq!(chain.pending_count(), 0);

        let kill = TxRequest::new(
            id(1),
            LedgerCall::KillBounty {
                bounty: BountyId::new(0),
            },
        );
        chain.submit(kill, Timestamp::EPOCH).unwrap();
        chain.mine(Timestamp::EPOCH);
        assert_eq!(chain.height(), 3);
        assert!(matches!(
            chain.status(&hash),
            Err(LedgerError::UnknownTransaction(_))
        ));
    }

    #[test]
    fn empty_blocks_do_not_age_statuses() {
        let mut chain = chain_with_bounty();
        chain.set_status_retention(1);
        let fulfill = TxRequest::new(
            id(2),
            LedgerCall::FulfillBounty {
                bounty: BountyId::new(0),
                link: "https://example.org/post".into(),
            },
        );
        let hash = chain.submit(fulfill, Timestamp::EPOCH).unwrap();
        chain.mine(Timestamp::EPOCH);
        for _ in 0..5 {
            chain.mine(Timestamp::EPOCH);
        }
        assert_eq!(chain.status(&hash).unwrap(), TxStatus::Confirmed);
    }

    #[test]
    fn unknown_hash() {
        let chain = DevChain::new();
        assert!(matches!(
            chain.status(&TxHash::ZERO),
            Err(LedgerError::UnknownTransaction(_))
        ));
    }
}
