//! Read side: batched bounty and fulfillment fetches and the published snapshot.
//!
//! A refresh is a two-phase task graph. Phase one fetches the count and then
//! every bounty `0..n`; phase two fetches fulfillments for exactly the ids
//! phase one returned and only starts once phase one has fully resolved. Each
//! phase fans out with at most `max_concurrency` requests in flight and fans
//! in before continuing. A single failed request aborts the whole refresh and
//! the previously published snapshot stays in place.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, StreamExt, TryStreamExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use bounty_ledger::{BountyLedger, LedgerError};
use bounty_types::{Bounty, BountyId, Fulfillment, Timestamp};

use crate::convert::{decode_bounty, decode_fulfillments};
use crate::error::Phase;
use crate::{ClientConfig, ClientError};

/// A bounty together with its fulfillments, as of one refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BountyEntry {
    pub bounty: Bounty,
    pub fulfillments: Vec<Fulfillment>,
}

/// Immutable view of the ledger produced by a successful refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Bounties in ledger order; `entries[i].bounty.id == i`.
    pub entries: Vec<BountyEntry>,
    /// Increments with every published snapshot; 0 means nothing fetched yet.
    pub version: u64,
    pub fetched_at: Timestamp,
}

impl Snapshot {
    pub fn get(&self, id: BountyId) -> Option<&BountyEntry> {
        self.entries.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct QueryLayer<L> {
    ledger: Arc<L>,
    request_timeout: Duration,
    max_concurrency: usize,
    published: watch::Sender<Arc<Snapshot>>,
}

impl<L: BountyLedger> QueryLayer<L> {
    pub fn new(ledger: Arc<L>, config: &ClientConfig) -> Self {
        let (published, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            ledger,
            request_timeout: config.request_timeout(),
            max_concurrency: config.max_concurrency.max(1),
            published,
        }
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.published.subscribe()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published.borrow().clone()
    }

    pub async fn count(&self) -> Result<u64, ClientError> {
        Ok(self.fetch_count().await?)
    }

    pub async fn bounty(&self, id: BountyId) -> Result<Bounty, ClientError> {
        Ok(self.fetch_bounty(id).await?)
    }

    pub async fn fulfillments(&self, id: BountyId) -> Result<Vec<Fulfillment>, ClientError> {
        Ok(self.fetch_fulfillments(id).await?)
    }

    /// Every bounty in id order, or an error naming the first failed id.
    pub async fn list_bounties(&self) -> Result<Vec<Bounty>, ClientError> {
        let count = self.fetch_count().await?;
        debug!(count, "fetching bounties");
        let ids = (0..count).map(BountyId::new);
        self.fan_out(Phase::Bounties, ids, |id| self.fetch_bounty(id))
            .await
    }

    /// Fulfillment lists for `ids`, positionally aligned with the input.
    pub async fn list_fulfillments(
        &self,
        ids: &[BountyId],
    ) -> Result<Vec<Vec<Fulfillment>>, ClientError> {
        debug!(count = ids.len(), "fetching fulfillments");
        self.fan_out(Phase::Fulfillments, ids.iter().copied(), |id| {
            self.fetch_fulfillments(id)
        })
        .await
    }

    /// Run both phases and publish the result.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, ClientError> {
        let bounties = self.list_bounties().await?;
        let ids: Vec<BountyId> = bounties.iter().map(|b| b.id).collect();
        let fulfillments = self.list_fulfillments(&ids).await?;

        let entries = bounties
            .into_iter()
            .zip(fulfillments)
            .map(|(bounty, fulfillments)| BountyEntry {
                bounty,
                fulfillments,
            })
            .collect();

        let version = self.published.borrow().version + 1;
        let snapshot = Arc::new(Snapshot {
            entries,
            version,
            fetched_at: Timestamp::now(),
        });
        self.published.send_replace(snapshot.clone());
        info!(version, bounties = snapshot.len(), "published snapshot");
        Ok(snapshot)
    }

    // ── Fan-out ────────────────────────────────────────────────────────

    async fn fan_out<T, F, Fut>(
        &self,
        phase: Phase,
        ids: impl Iterator<Item = BountyId>,
        fetch: F,
    ) -> Result<Vec<T>, ClientError>
    where
        F: Fn(BountyId) -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        stream::iter(ids)
            .map(|id| {
                let fut = fetch(id);
                async move { fut.await.map_err(|e| (id, e)) }
            })
            .buffered(self.max_concurrency)
            .try_collect()
            .await
            .map_err(|(id, source)| {
                warn!(%phase, %id, error = %source, "batch aborted");
                ClientError::BatchAborted { phase, id, source }
            })
    }

    // ── Single requests ────────────────────────────────────────────────

    async fn fetch_count(&self) -> Result<u64, LedgerError> {
        self.timed("num_bounties", self.ledger.num_bounties()).await
    }

    async fn fetch_bounty(&self, id: BountyId) -> Result<Bounty, LedgerError> {
        let raw = self.timed("get_bounty", self.ledger.get_bounty(id)).await?;
        decode_bounty(id, raw)
    }

    async fn fetch_fulfillments(&self, id: BountyId) -> Result<Vec<Fulfillment>, LedgerError> {
        let raws = self
            .timed("get_fulfillments", self.ledger.get_fulfillments(id))
            .await?;
        decode_fulfillments(id, raws)
    }

    async fn timed<T>(
        &self,
        what: &str,
        request: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        with_timeout(self.request_timeout, what, request).await
    }
}

/// Bound `request` by `limit`; expiry is a connectivity failure.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    what: &str,
    request: impl Future<Output = Result<T, LedgerError>>,
) -> Result<T, LedgerError> {
    tokio::time::timeout(limit, request).await.map_err(|_| {
        LedgerError::Connectivity(format!("{what} timed out after {} ms", limit.as_millis()))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use bounty_ledger::ErrorKind;
    use bounty_nullables::NullLedger;
    use bounty_types::{Identity, Stage, Wei};

    fn alice() -> Identity {
        Identity::new([0xa1; 20])
    }

    fn bob() -> Identity {
        Identity::new([0xb0; 20])
    }

    fn ledger_with(n: usize) -> Arc<NullLedger> {
        let ledger = NullLedger::new();
        ledger.fund(alice(), Wei::from_ether(100).unwrap());
        for i in 0..n {
            ledger.issue(
                alice(),
                alice(),
                Timestamp::new(1_000_000),
                Wei::parse_ether(if i % 2 == 0 { "0.01" } else { "0.1" }).unwrap(),
                &format!("bounty {i}"),
                "description",
            );
        }
        Arc::new(ledger)
    }

    fn layer(ledger: &Arc<NullLedger>) -> QueryLayer<NullLedger> {
        QueryLayer::new(ledger.clone(), &ClientConfig::default())
    }

    #[tokio::test]
    async fn empty_ledger_gives_empty_snapshot_and_no_fetches() {
        let ledger = ledger_with(0);
        let snapshot = layer(&ledger).refresh().await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.version, 1);
        assert_eq!(ledger.calls(), vec!["num_bounties".to_string()]);
    }

    #[tokio::test]
    async fn bounties_come_back_in_id_order() {
        let ledger = ledger_with(5);
        let bounties = layer(&ledger).list_bounties().await.unwrap();
        let ids: Vec<u64> = bounties.iter().map(|b| b.id.value()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(bounties[3].title, "bounty 3");
        assert_eq!(bounties[0].fulfillment_amount.to_ether_string(), "0.01");
        assert_eq!(bounties[1].fulfillment_amount.to_ether_string(), "0.1");
    }

    #[tokio::test]
    async fn order_holds_with_bounded_concurrency() {
        let ledger = ledger_with(8);
        ledger.set_read_delay(Some(Duration::from_millis(5)));
        let config = ClientConfig {
            max_concurrency: 3,
            ..ClientConfig::default()
        };
        let bounties = QueryLayer::new(ledger.clone(), &config)
            .list_bounties()
            .await
            .unwrap();
        for (i, bounty) in bounties.iter().enumerate() {
            assert_eq!(bounty.id.index(), i);
        }
    }

    #[tokio::test]
    async fn fulfillments_start_only_after_every_bounty_resolved() {
        let ledger = ledger_with(4);
        layer(&ledger).refresh().await.unwrap();
        let calls = ledger.calls();
        let last_bounty = calls.iter().rposition(|c| c.starts_with("get_bounty")).unwrap();
        let first_fulfillment = calls
            .iter()
            .position(|c| c.starts_with("get_fulfillments"))
            .unwrap();
        assert!(last_bounty < first_fulfillment, "{calls:?}");
        assert_eq!(ledger.count_calls("get_fulfillments"), 4);
    }

    #[tokio::test]
    async fn refresh_attaches_fulfillments_to_their_bounty() {
        let ledger = ledger_with(2);
        ledger
            .apply(
                bob(),
                bounty_ledger::LedgerCall::FulfillBounty {
                    bounty: BountyId::new(1),
                    link: "https://gist.example/answer".into(),
                },
            )
            .unwrap();
        let snapshot = layer(&ledger).refresh().await.unwrap();
        assert!(snapshot.entries[0].fulfillments.is_empty());
        let entry = snapshot.get(BountyId::new(1)).unwrap();
        assert_eq!(entry.fulfillments.len(), 1);
        assert_eq!(entry.fulfillments[0].fulfiller, bob());
        assert_eq!(entry.bounty.stage, Stage::Active);
    }

    #[tokio::test]
    async fn failed_bounty_fetch_aborts_with_phase_and_id() {
        let ledger = ledger_with(5);
        ledger.fail_bounty_read(BountyId::new(2));
        let err = layer(&ledger).list_bounties().await.unwrap_err();
        match err {
            ClientError::BatchAborted { phase, id, .. } => {
                assert_eq!(phase, Phase::Bounties);
                assert_eq!(id, BountyId::new(2));
            }
            other => panic!("expected BatchAborted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_fulfillment_fetch_keeps_previous_snapshot() {
        let ledger = ledger_with(3);
        let query = layer(&ledger);
        let first = query.refresh().await.unwrap();

        ledger.fail_fulfillment_read(BountyId::new(1));
        let err = query.refresh().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::BatchAborted {
                phase: Phase::Fulfillments,
                ..
            }
        ));
        assert_eq!(query.snapshot(), first);

        ledger.clear_read_failures();
        let second = query.refresh().await.unwrap();
        assert_eq!(second.version, 2);
    }

    #[tokio::test]
    async fn subscribers_see_published_snapshots() {
        let ledger = ledger_with(1);
        let query = layer(&ledger);
        let mut rx = query.subscribe();
        assert_eq!(rx.borrow().version, 0);
        query.refresh().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }

    #[tokio::test]
    async fn offline_count_is_connectivity() {
        let ledger = ledger_with(1);
        ledger.set_offline(true);
        let err = layer(&ledger).refresh().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
    }

    #[tokio::test]
    async fn missing_bounty_is_not_found() {
        let ledger = ledger_with(1);
        let err = layer(&ledger).bounty(BountyId::new(9)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_read_times_out() {
        let ledger = ledger_with(1);
        ledger.set_read_delay(Some(Duration::from_secs(60)));
        let config = ClientConfig {
            request_timeout_ms: 1_000,
            ..ClientConfig::default()
        };
        let err = QueryLayer::new(ledger.clone(), &config)
            .list_bounties()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert!(err.to_string().contains("timed out"), "{err}");
    }
}
