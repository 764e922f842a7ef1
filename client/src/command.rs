//! Write side: pre-flight checks, overlap tracking, idempotent submission and
//! confirmation tracking.
//!
//! Every write runs the same pipeline:
//! 1. read the bounty (and its fulfillments) and reject locally with the same
//!    error taxonomy the ledger uses;
//! 2. consult the in-flight map: an identical fulfillment or issue already
//!    pending returns the existing handle, and a second settlement (accept or
//!    cancel) on a bounty with one already pending is a state conflict;
//! 3. submit under one request id, retrying only connectivity failures and
//!    always with that same id so the ledger applies the call at most once;
//! 4. hand back a [`PendingTx`] that observes Pending → Confirmed | Failed.
//!
//! Writes never touch the published snapshot; callers refresh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use bounty_ledger::{BountyLedger, LedgerCall, LedgerError, TxRequest};
use bounty_types::{
    Bounty, BountyId, Fulfillment, Identity, RequestId, Timestamp, TxHash, TxStatus, Wei,
};

use crate::convert::{decode_bounty, decode_fulfillments};
use crate::query::with_timeout;
use crate::{ClientConfig, ClientError};

/// Parameters for a new bounty. The sender becomes the issuer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBounty {
    /// Defaults to the issuer when `None`.
    pub arbiter: Option<Identity>,
    pub deadline: Timestamp,
    pub amount: Wei,
    pub title: String,
    pub description: String,
}

#[derive(Clone, Copy, Debug)]
struct Policy {
    request_timeout: Duration,
    submit_attempts: u32,
    retry_backoff: Duration,
    confirm_poll: Duration,
    confirm_timeout: Duration,
}

impl Policy {
    fn from_config(config: &ClientConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            submit_attempts: config.submit_attempts.max(1),
            retry_backoff: config.retry_backoff(),
            confirm_poll: config.confirm_poll(),
            confirm_timeout: config.confirm_timeout(),
        }
    }
}

#[derive(Clone, Debug)]
struct InFlight {
    call: LedgerCall,
    submission: Submission,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Submission {
    /// A submit call is running.
    Sending,
    /// Every attempt failed in transit. The ledger may still have queued
    /// it, so a repeat of the same call reuses the request id.
    Unconfirmed,
    Sent(TxHash),
}

impl Submission {
    fn hash(self) -> Option<TxHash> {
        match self {
            Submission::Sent(hash) => Some(hash),
            Submission::Sending | Submission::Unconfirmed => None,
        }
    }
}

type InFlightMap = Arc<Mutex<HashMap<RequestId, InFlight>>>;

/// Two calls overlap when they are identical, or both settle the same bounty.
fn overlaps(a: &LedgerCall, b: &LedgerCall) -> bool {
    a == b || (a.is_settlement() && b.is_settlement() && a.bounty() == b.bounty())
}

enum Reservation {
    Fresh(RequestId),
    Existing(RequestId, TxHash),
}

// ── CommandLayer ───────────────────────────────────────────────────────

pub struct CommandLayer<L> {
    ledger: Arc<L>,
    account: Identity,
    policy: Policy,
    in_flight: InFlightMap,
}

impl<L: BountyLedger> CommandLayer<L> {
    pub fn new(ledger: Arc<L>, account: Identity, config: &ClientConfig) -> Self {
        Self {
            ledger,
            account,
            policy: Policy::from_config(config),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn account(&self) -> Identity {
        self.account
    }

    /// Number of writes this client still considers in flight.
    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Submit evidence for `bounty`.
    pub async fn fulfill(
        &self,
        bounty: BountyId,
        link: impl Into<String>,
    ) -> Result<PendingTx<L>, ClientError> {
        self.execute(LedgerCall::FulfillBounty {
            bounty,
            link: link.into(),
        })
        .await
    }

    /// Pay out `bounty` to the fulfiller at `fulfillment`.
    pub async fn accept_fulfillment(
        &self,
        bounty: BountyId,
        fulfillment: usize,
    ) -> Result<PendingTx<L>, ClientError> {
        self.execute(LedgerCall::AcceptFulfillment {
            bounty,
            fulfillment,
        })
        .await
    }

    /// Kill `bounty` and refund the escrow to the issuer.
    pub async fn cancel(&self, bounty: BountyId) -> Result<PendingTx<L>, ClientError> {
        self.execute(LedgerCall::KillBounty { bounty }).await
    }

    pub async fn issue(&self, new: NewBounty) -> Result<PendingTx<L>, ClientError> {
        self.execute(LedgerCall::IssueBounty {
            arbiter: new.arbiter.unwrap_or(self.account),
            deadline: new.deadline,
            amount: new.amount,
            title: new.title,
            description: new.description,
        })
        .await
    }

    async fn execute(&self, call: LedgerCall) -> Result<PendingTx<L>, ClientError> {
        self.preflight(&call).await?;

        let request_id = match self.reserve(&call).await? {
            Reservation::Existing(request_id, hash) => {
                info!(%hash, %call, "identical request already pending");
                return Ok(self.handle(request_id, hash, call));
            }
            Reservation::Fresh(request_id) => request_id,
        };

        let request = TxRequest {
            request_id,
            sender: self.account,
            call: call.clone(),
        };
        let hash = match self.submit_with_retry(request).await {
            Ok(hash) => hash,
            Err(e) if e.is_transient() => {
                if let Some(entry) = lock(&self.in_flight).get_mut(&request_id) {
                    entry.submission = Submission::Unconfirmed;
                }
                warn!(%request_id, %call, error = %e, "submission unconfirmed");
                return Err(e.into());
            }
            Err(e) => {
                lock(&self.in_flight).remove(&request_id);
                return Err(e.into());
            }
        };

        if let Some(entry) = lock(&self.in_flight).get_mut(&request_id) {
            entry.submission = Submission::Sent(hash);
        }
        info!(%hash, %call, "submitted");
        Ok(self.handle(request_id, hash, call))
    }

    fn handle(&self, request_id: RequestId, hash: TxHash, call: LedgerCall) -> PendingTx<L> {
        PendingTx {
            ledger: self.ledger.clone(),
            in_flight: self.in_flight.clone(),
            request_id,
            hash,
            call,
            policy: self.policy,
        }
    }

    // ── Pre-flight ─────────────────────────────────────────────────────

    /// Read current ledger state and reject calls the ledger would reject.
    ///
    /// Checks run in the ledger's order: existence, stage, authorization,
    /// then operation-specific conditions. Deadlines are left to the ledger,
    /// whose clock is authoritative.
    async fn preflight(&self, call: &LedgerCall) -> Result<(), ClientError> {
        let sender = self.account;
        match call {
            LedgerCall::IssueBounty { amount, title, .. } => {
                if amount.is_zero() {
                    return Err(invalid("fulfillment amount must be positive"));
                }
                if title.trim().is_empty() {
                    return Err(invalid("title must not be empty"));
                }
                let available = self
                    .timed("balance_of", self.ledger.balance_of(sender))
                    .await?;
                if available < *amount {
                    return Err(LedgerError::InsufficientFunds {
                        needed: *amount,
                        available,
                    }
                    .into());
                }
            }
            LedgerCall::FulfillBounty { bounty, link } => {
                let (info, fulfillments) = self.open_bounty(*bounty).await?;
                ensure_unpaid(*bounty, &fulfillments, "bounty has already been paid")?;
                if sender == info.issuer {
                    return Err(unauthorized(sender, format!("fulfill own bounty {bounty}")));
                }
                if link.trim().is_empty() {
                    return Err(invalid("evidence link must not be empty"));
                }
            }
            LedgerCall::AcceptFulfillment {
                bounty,
                fulfillment,
            } => {
                let (info, fulfillments) = self.open_bounty(*bounty).await?;
                if !info.can_accept(&sender) {
                    return Err(unauthorized(
                        sender,
                        format!("accept fulfillments on bounty {bounty}"),
                    ));
                }
                ensure_unpaid(*bounty, &fulfillments, "")?;
                if *fulfillment >= fulfillments.len() {
                    return Err(LedgerError::FulfillmentNotFound {
                        bounty: *bounty,
                        index: *fulfillment,
                    }
                    .into());
                }
            }
            LedgerCall::KillBounty { bounty } => {
                let (info, fulfillments) = self.open_bounty(*bounty).await?;
                if sender != info.issuer {
                    return Err(unauthorized(sender, format!("kill bounty {bounty}")));
                }
                ensure_unpaid(*bounty, &fulfillments, "")?;
            }
        }
        debug!(%call, "pre-flight passed");
        Ok(())
    }

    /// The bounty and its fulfillments, requiring the bounty to be Active.
    async fn open_bounty(&self, id: BountyId) -> Result<(Bounty, Vec<Fulfillment>), ClientError> {
        let raw = self.timed("get_bounty", self.ledger.get_bounty(id)).await?;
        let bounty = decode_bounty(id, raw)?;
        if bounty.stage.is_terminal() {
            return Err(LedgerError::StateConflict {
                bounty: id,
                reason: "bounty has been killed".into(),
            }
            .into());
        }
        if !bounty.stage.is_open() {
            return Err(LedgerError::StateConflict {
                bounty: id,
                reason: format!("stage is {}, expected Active", bounty.stage),
            }
            .into());
        }
        let raws = self
            .timed("get_fulfillments", self.ledger.get_fulfillments(id))
            .await?;
        Ok((bounty, decode_fulfillments(id, raws)?))
    }

    // ── In-flight tracking ─────────────────────────────────────────────

    /// Claim `call` in the in-flight map.
    ///
    /// Overlapping entries whose transaction has since become final are
    /// dropped first, so a confirmed or failed write never blocks a new one.
    /// A repeat of an unconfirmed call is resent under its original request
    /// id, which the ledger deduplicates.
    async fn reserve(&self, call: &LedgerCall) -> Result<Reservation, ClientError> {
        let candidates: Vec<(RequestId, TxHash)> = lock(&self.in_flight)
            .iter()
            .filter(|(_, entry)| overlaps(&entry.call, call))
            .filter_map(|(id, entry)| entry.submission.hash().map(|hash| (*id, hash)))
            .collect();

        for (request_id, hash) in candidates {
            let status = self
                .timed("transaction_status", self.ledger.transaction_status(hash))
                .await?;
            if status.is_final() {
                debug!(%hash, %status, "clearing settled in-flight entry");
                lock(&self.in_flight).remove(&request_id);
            }
        }

        let mut in_flight = lock(&self.in_flight);
        if let Some((request_id, entry)) = in_flight
            .iter_mut()
            .find(|(_, entry)| overlaps(&entry.call, call))
        {
            let identical = entry.call == *call;
            return match entry.submission {
                Submission::Sent(hash) if identical && !call.is_settlement() => {
                    Ok(Reservation::Existing(*request_id, hash))
                }
                Submission::Unconfirmed if identical => {
                    debug!(%request_id, %call, "resending unconfirmed request");
                    entry.submission = Submission::Sending;
                    Ok(Reservation::Fresh(*request_id))
                }
                Submission::Sent(hash) => Err(ClientError::AlreadyPending {
                    hash: hash.to_string(),
                    call: entry.call.to_string(),
                }),
                Submission::Unconfirmed => Err(ClientError::AlreadyPending {
                    hash: "(unconfirmed)".into(),
                    call: entry.call.to_string(),
                }),
                Submission::Sending => Err(ClientError::AlreadyPending {
                    hash: "(submitting)".into(),
                    call: entry.call.to_string(),
                }),
            };
        }

        let request_id = RequestId::random();
        in_flight.insert(
            request_id,
            InFlight {
                call: call.clone(),
                submission: Submission::Sending,
            },
        );
        Ok(Reservation::Fresh(request_id))
    }

    // ── Submission ─────────────────────────────────────────────────────

    async fn submit_with_retry(&self, request: TxRequest) -> Result<TxHash, LedgerError> {
        let mut attempt = 1;
        loop {
            match self
                .timed("submit", self.ledger.submit(request.clone()))
                .await
            {
                Ok(hash) => return Ok(hash),
                Err(e) if e.is_transient() && attempt < self.policy.submit_attempts => {
                    warn!(
                        request_id = %request.request_id,
                        attempt,
                        error = %e,
                        "submit failed, retrying with the same request id"
                    );
                    tokio::time::sleep(self.policy.retry_backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn timed<T>(
        &self,
        what: &str,
        request: impl std::future::Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        with_timeout(self.policy.request_timeout, what, request).await
    }
}

fn ensure_unpaid(
    bounty: BountyId,
    fulfillments: &[Fulfillment],
    reason: &str,
) -> Result<(), ClientError> {
    match fulfillments.iter().find(|f| f.accepted) {
        None => Ok(()),
        Some(accepted) => {
            let reason = if reason.is_empty() {
                format!("fulfillment {} was already accepted", accepted.index)
            } else {
                reason.to_string()
            };
            Err(LedgerError::StateConflict { bounty, reason }.into())
        }
    }
}

fn invalid(reason: &str) -> ClientError {
    LedgerError::InvalidRequest(reason.to_string()).into()
}

fn unauthorized(who: Identity, action: String) -> ClientError {
    LedgerError::Unauthorized { who, action }.into()
}

fn lock(map: &InFlightMap) -> std::sync::MutexGuard<'_, HashMap<RequestId, InFlight>> {
    // A poisoned map only means another writer panicked mid-update; the
    // entries themselves are still plain data.
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── PendingTx ──────────────────────────────────────────────────────────

/// A submitted write whose outcome is not yet known.
pub struct PendingTx<L> {
    ledger: Arc<L>,
    in_flight: InFlightMap,
    request_id: RequestId,
    hash: TxHash,
    call: LedgerCall,
    policy: Policy,
}

impl<L> Clone for PendingTx<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            in_flight: self.in_flight.clone(),
            request_id: self.request_id,
            hash: self.hash,
            call: self.call.clone(),
            policy: self.policy,
        }
    }
}

impl<L> std::fmt::Debug for PendingTx<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTx")
            .field("hash", &self.hash)
            .field("request_id", &self.request_id)
            .field("call", &self.call)
            .finish()
    }
}

impl<L: BountyLedger> PendingTx<L> {
    pub fn hash(&self) -> TxHash {
        self.hash
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn call(&self) -> &LedgerCall {
        &self.call
    }

    /// Poll the ledger once.
    pub async fn status(&self) -> Result<TxStatus, ClientError> {
        let status = with_timeout(
            self.policy.request_timeout,
            "transaction_status",
            self.ledger.transaction_status(self.hash),
        )
        .await?;
        if status.is_final() {
            lock(&self.in_flight).remove(&self.request_id);
        }
        Ok(status)
    }

    /// Poll until the transaction is final or the confirmation timeout elapses.
    ///
    /// A failed transaction surfaces as [`ClientError::TransactionFailed`]
    /// carrying the ledger's reason.
    pub async fn wait(&self) -> Result<TxHash, ClientError> {
        let started = tokio::time::Instant::now();
        loop {
            match self.status().await? {
                TxStatus::Confirmed => {
                    info!(hash = %self.hash, call = %self.call, "confirmed");
                    return Ok(self.hash);
                }
                TxStatus::Failed { reason } => {
                    warn!(hash = %self.hash, call = %self.call, %reason, "transaction failed");
                    return Err(ClientError::TransactionFailed {
                        hash: self.hash,
                        reason,
                    });
                }
                TxStatus::Pending => {}
            }
            let waited = started.elapsed();
            if waited >= self.policy.confirm_timeout {
                return Err(ClientError::ConfirmationTimeout {
                    hash: self.hash,
                    waited_ms: waited.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.policy.confirm_poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bounty_ledger::ErrorKind;
    use bounty_nullables::NullLedger;
    use bounty_types::Stage;

    fn issuer() -> Identity {
        Identity::new([0x11; 20])
    }

    fn arbiter() -> Identity {
        Identity::new([0x22; 20])
    }

    fn worker() -> Identity {
        Identity::new([0x33; 20])
    }

    fn stranger() -> Identity {
        Identity::new([0x44; 20])
    }

    fn config() -> ClientConfig {
        ClientConfig {
            retry_backoff_ms: 10,
            confirm_poll_ms: 10,
            confirm_timeout_ms: 1_000,
            ..ClientConfig::default()
        }
    }

    /// One Active bounty (id 0) worth 0.1 ETH, issued by `issuer` with `arbiter`.
    fn ledger() -> Arc<NullLedger> {
        let ledger = NullLedger::new();
        ledger.clock().set(1_000);
        ledger.fund(issuer(), Wei::from_ether(1).unwrap());
        ledger.issue(
            issuer(),
            arbiter(),
            Timestamp::new(10_000),
            Wei::parse_ether("0.1").unwrap(),
            "Write docs",
            "For the CLI",
        );
        Arc::new(ledger)
    }

    fn as_user(ledger: &Arc<NullLedger>, who: Identity) -> CommandLayer<NullLedger> {
        CommandLayer::new(ledger.clone(), who, &config())
    }

    fn fulfill_directly(ledger: &NullLedger, who: Identity) {
        ledger
            .apply(
                who,
                LedgerCall::FulfillBounty {
                    bounty: BountyId::new(0),
                    link: "https://example.org/pr/1".into(),
                },
            )
            .unwrap();
    }

    async fn stage_of(ledger: &NullLedger) -> Stage {
        let raw = ledger.get_bounty(BountyId::new(0)).await.unwrap();
        Stage::try_from(raw.6).unwrap()
    }

    #[tokio::test]
    async fn fulfill_is_pending_until_mined() {
        let ledger = ledger();
        let pending = as_user(&ledger, worker())
            .fulfill(BountyId::new(0), "https://example.org/pr/1")
            .await
            .unwrap();
        assert_eq!(pending.status().await.unwrap(), TxStatus::Pending);
        assert!(ledger.get_fulfillments(BountyId::new(0)).await.unwrap().is_empty());

        ledger.mine();
        assert_eq!(pending.status().await.unwrap(), TxStatus::Confirmed);
        let fulfillments = ledger.get_fulfillments(BountyId::new(0)).await.unwrap();
        assert_eq!(fulfillments.len(), 1);
        assert_eq!(fulfillments[0].1, worker());
    }

    #[tokio::test]
    async fn preflight_reads_state_before_submitting() {
        let ledger = ledger();
        as_user(&ledger, worker())
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap();
        let calls = ledger.calls();
        let read = calls.iter().position(|c| c == "get_bounty:0").unwrap();
        let submit = calls.iter().position(|c| c == "submit:fulfillBounty").unwrap();
        assert!(read < submit, "{calls:?}");
    }

    #[tokio::test]
    async fn missing_bounty_rejected_without_submitting() {
        let ledger = ledger();
        let err = as_user(&ledger, worker())
            .fulfill(BountyId::new(5), "https://example.org")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(ledger.count_calls("submit"), 0);
    }

    #[tokio::test]
    async fn issuer_cannot_fulfill_own_bounty() {
        let ledger = ledger();
        let err = as_user(&ledger, issuer())
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn accept_pays_fulfiller_exactly_once() {
        let ledger = ledger();
        fulfill_directly(&ledger, worker());

        let commands = as_user(&ledger, arbiter());
        let pending = commands.accept_fulfillment(BountyId::new(0), 0).await.unwrap();
        ledger.mine();
        pending.wait().await.unwrap();
        assert_eq!(
            ledger.balance_of(worker()).await.unwrap(),
            Wei::parse_ether("0.1").unwrap()
        );
        assert_eq!(ledger.escrow_of(BountyId::new(0)), Wei::ZERO);

        let err = commands
            .accept_fulfillment(BountyId::new(0), 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(
            ledger.balance_of(worker()).await.unwrap(),
            Wei::parse_ether("0.1").unwrap()
        );
    }

    #[tokio::test]
    async fn second_accept_while_first_pending_conflicts() {
        let ledger = ledger();
        fulfill_directly(&ledger, worker());
        fulfill_directly(&ledger, stranger());
        let commands = as_user(&ledger, issuer());

        commands.accept_fulfillment(BountyId::new(0), 0).await.unwrap();
        let err = commands
            .accept_fulfillment(BountyId::new(0), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::AlreadyPending { .. }), "{err:?}");
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(ledger.count_calls("submit:acceptFulfillment"), 1);
    }

    #[tokio::test]
    async fn cancel_while_accept_pending_conflicts() {
        let ledger = ledger();
        fulfill_directly(&ledger, worker());
        let commands = as_user(&ledger, issuer());
        commands.accept_fulfillment(BountyId::new(0), 0).await.unwrap();
        let err = commands.cancel(BountyId::new(0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[tokio::test]
    async fn identical_fulfill_returns_existing_handle() {
        let ledger = ledger();
        let commands = as_user(&ledger, worker());
        let first = commands
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap();
        let second = commands
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap();
        assert_eq!(first.hash(), second.hash());
        assert_eq!(ledger.count_calls("submit"), 1);
        assert_eq!(ledger.pending_count(), 1);
    }

    #[tokio::test]
    async fn settled_entries_stop_blocking_new_writes() {
        let ledger = ledger();
        let commands = as_user(&ledger, worker());
        let first = commands
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap();
        ledger.mine();
        let second = commands
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap();
        assert_ne!(first.hash(), second.hash());
        assert_eq!(commands.in_flight_count(), 1);
    }

    #[tokio::test]
    async fn unauthorized_accept_and_cancel() {
        let ledger = ledger();
        fulfill_directly(&ledger, worker());
        let commands = as_user(&ledger, stranger());

        let err = commands
            .accept_fulfillment(BountyId::new(0), 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        let err = commands.cancel(BountyId::new(0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        // The arbiter may accept but not cancel.
        let err = as_user(&ledger, arbiter())
            .cancel(BountyId::new(0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn accept_unknown_fulfillment_is_not_found() {
        let ledger = ledger();
        let err = as_user(&ledger, issuer())
            .accept_fulfillment(BountyId::new(0), 3)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn cancel_refunds_and_kills() {
        let ledger = ledger();
        let commands = as_user(&ledger, issuer());
        let pending = commands.cancel(BountyId::new(0)).await.unwrap();
        ledger.mine();
        pending.wait().await.unwrap();
        assert_eq!(stage_of(&ledger).await, Stage::Dead);
        assert_eq!(
            ledger.balance_of(issuer()).await.unwrap(),
            Wei::from_ether(1).unwrap()
        );

        let err = as_user(&ledger, worker())
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert!(err.to_string().contains("bounty has been killed"), "{err}");
        assert_eq!(ledger.count_calls("submit:fulfillBounty"), 0);
    }

    #[tokio::test]
    async fn cancel_after_payout_conflicts() {
        let ledger = ledger();
        fulfill_directly(&ledger, worker());
        ledger
            .apply(
                issuer(),
                LedgerCall::AcceptFulfillment {
                    bounty: BountyId::new(0),
                    fulfillment: 0,
                },
            )
            .unwrap();
        let err = as_user(&ledger, issuer())
            .cancel(BountyId::new(0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[tokio::test]
    async fn issue_checks_balance() {
        let ledger = ledger();
        let new = NewBounty {
            arbiter: None,
            deadline: Timestamp::new(50_000),
            amount: Wei::from_ether(5).unwrap(),
            title: "Too expensive".into(),
            description: String::new(),
        };
        let err = as_user(&ledger, issuer()).issue(new).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Ledger(LedgerError::InsufficientFunds { .. })
        ));
    }

    #[tokio::test]
    async fn issue_creates_active_bounty() {
        let ledger = ledger();
        let new = NewBounty {
            arbiter: Some(arbiter()),
            deadline: Timestamp::new(50_000),
            amount: Wei::parse_ether("0.01").unwrap(),
            title: "Second".into(),
            description: "Another one".into(),
        };
        let pending = as_user(&ledger, issuer()).issue(new).await.unwrap();
        ledger.mine();
        pending.wait().await.unwrap();
        let raw = ledger.get_bounty(BountyId::new(1)).await.unwrap();
        assert_eq!(raw.1, arbiter());
        assert_eq!(Stage::try_from(raw.6).unwrap(), Stage::Active);
    }

    #[tokio::test]
    async fn lost_response_retried_with_same_request_id() {
        let ledger = ledger();
        ledger.lose_submit_responses(2);
        let pending = as_user(&ledger, worker())
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap();
        assert_eq!(ledger.count_calls("submit"), 3);
        assert_eq!(ledger.pending_count(), 1);
        ledger.mine();
        pending.wait().await.unwrap();
        assert_eq!(ledger.get_fulfillments(BountyId::new(0)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retries_give_up_after_configured_attempts() {
        let ledger = ledger();
        ledger.lose_submit_responses(10);
        let commands = as_user(&ledger, worker());
        let err = commands
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert_eq!(ledger.count_calls("submit"), 3);
        assert_eq!(commands.in_flight_count(), 1);

        ledger.lose_submit_responses(0);
        let pending = commands
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap();
        assert_eq!(ledger.count_calls("submit"), 4);
        assert_eq!(ledger.pending_count(), 1);
        assert_eq!(commands.in_flight_count(), 1);
        ledger.mine();
        pending.wait().await.unwrap();
        assert_eq!(ledger.get_fulfillments(BountyId::new(0)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeated_fulfill_after_lost_responses_is_not_duplicated() {
        let ledger = ledger();
        ledger.lose_submit_responses(3);
        let commands = as_user(&ledger, worker());
        commands
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap_err();
        let pending = commands
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap();
        assert_eq!(ledger.pending_count(), 1);
        ledger.mine();
        assert_eq!(pending.status().await.unwrap(), TxStatus::Confirmed);
        assert_eq!(ledger.get_fulfillments(BountyId::new(0)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unconfirmed_settlement_blocks_a_different_settlement() {
        let ledger = ledger();
        ledger.lose_submit_responses(3);
        let commands = as_user(&ledger, issuer());
        fulfill_directly(&ledger, worker());
        commands.accept_fulfillment(BountyId::new(0), 0).await.unwrap_err();
        ledger.lose_submit_responses(0);
        let err = commands.cancel(BountyId::new(0)).await.unwrap_err();
        assert!(matches!(err, ClientError::AlreadyPending { .. }));
    }

    #[tokio::test]
    async fn rejected_submission_is_forgotten() {
        let ledger = ledger();
        let commands = as_user(&ledger, worker());
        ledger.clock().set(20_000);
        commands
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap_err();
        assert_eq!(commands.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn inclusion_failure_surfaces_reason() {
        let ledger = ledger();
        fulfill_directly(&ledger, worker());
        let accept = as_user(&ledger, arbiter())
            .accept_fulfillment(BountyId::new(0), 0)
            .await
            .unwrap();
        // A second client races a cancel in before the accept is mined.
        let cancel = as_user(&ledger, issuer()).cancel(BountyId::new(0)).await.unwrap();
        ledger.mine();

        assert_eq!(accept.wait().await.unwrap(), accept.hash());
        match cancel.wait().await.unwrap_err() {
            ClientError::TransactionFailed { reason, .. } => {
                assert!(reason.contains("already accepted"), "{reason}")
            }
            other => panic!("expected TransactionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wait_confirms_when_ledger_mines_on_poll() {
        let ledger = ledger();
        ledger.set_mine_on_poll(true);
        let pending = as_user(&ledger, worker())
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap();
        assert_eq!(pending.wait().await.unwrap(), pending.hash());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_when_never_mined() {
        let ledger = ledger();
        let pending = as_user(&ledger, worker())
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap();
        let err = pending.wait().await.unwrap_err();
        assert!(matches!(err, ClientError::ConfirmationTimeout { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn offline_write_is_connectivity_and_not_submitted() {
        let ledger = ledger();
        ledger.set_offline(true);
        let err = as_user(&ledger, worker())
            .fulfill(BountyId::new(0), "https://example.org")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        ledger.set_offline(false);
        assert_eq!(ledger.pending_count(), 0);
    }
}
