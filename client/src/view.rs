//! Display records and the action hooks a front-end binds to.

use std::fmt::Write as _;
use std::future::Future;

use serde::Serialize;

use bounty_ledger::BountyLedger;
use bounty_types::BountyId;

use crate::command::{CommandLayer, PendingTx};
use crate::convert::{amount_text, deadline_text};
use crate::query::{BountyEntry, Snapshot};
use crate::ClientError;

/// Shown when the ledger holds no bounties.
pub const EMPTY_LIST_MESSAGE: &str = "No bounties available. Be the first to create one.";

/// One bounty, ready for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BountyRow {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub issuer: String,
    pub arbiter: String,
    pub deadline: String,
    pub fulfillment_amount: String,
    pub stage: String,
    pub fulfillments: Vec<FulfillmentRow>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FulfillmentRow {
    pub index: usize,
    pub fulfiller: String,
    pub link: String,
    pub accepted: bool,
}

impl From<&BountyEntry> for BountyRow {
    fn from(entry: &BountyEntry) -> Self {
        let bounty = &entry.bounty;
        Self {
            id: bounty.id.value(),
            title: bounty.title.clone(),
            description: bounty.description.clone(),
            issuer: bounty.issuer.to_string(),
            arbiter: bounty.arbiter.to_string(),
            deadline: deadline_text(bounty.deadline),
            fulfillment_amount: amount_text(bounty.fulfillment_amount),
            stage: bounty.stage.label().to_string(),
            fulfillments: entry
                .fulfillments
                .iter()
                .map(|f| FulfillmentRow {
                    index: f.index,
                    fulfiller: f.fulfiller.to_string(),
                    link: f.link.clone(),
                    accepted: f.accepted,
                })
                .collect(),
        }
    }
}

/// Display rows in ledger order.
pub fn rows(snapshot: &Snapshot) -> Vec<BountyRow> {
    snapshot.entries.iter().map(BountyRow::from).collect()
}

/// Plain-text listing for terminals.
pub fn render(rows: &[BountyRow]) -> String {
    if rows.is_empty() {
        return format!("{EMPTY_LIST_MESSAGE}\n");
    }
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(
            out,
            "#{} {} [{}] {} due {}",
            row.id, row.title, row.stage, row.fulfillment_amount, row.deadline
        );
        if !row.description.is_empty() {
            let _ = writeln!(out, "    {}", row.description);
        }
        let _ = writeln!(out, "    issuer {}  arbiter {}", row.issuer, row.arbiter);
        for f in &row.fulfillments {
            let mark = if f.accepted { " (accepted)" } else { "" };
            let _ = writeln!(out, "    [{}] {} {}{}", f.index, f.fulfiller, f.link, mark);
        }
    }
    out
}

/// Hooks a presentation layer invokes on user actions.
pub trait BountyActions {
    type Pending;

    fn on_fulfill(
        &self,
        bounty: BountyId,
        link: String,
    ) -> impl Future<Output = Result<Self::Pending, ClientError>>;

    fn on_accept(
        &self,
        bounty: BountyId,
        fulfillment: usize,
    ) -> impl Future<Output = Result<Self::Pending, ClientError>>;

    fn on_cancel(&self, bounty: BountyId)
        -> impl Future<Output = Result<Self::Pending, ClientError>>;
}

impl<L: BountyLedger> BountyActions for CommandLayer<L> {
    type Pending = PendingTx<L>;

    async fn on_fulfill(&self, bounty: BountyId, link: String) -> Result<PendingTx<L>, ClientError> {
        self.fulfill(bounty, link).await
    }

    async fn on_accept(
        &self,
        bounty: BountyId,
        fulfillment: usize,
    ) -> Result<PendingTx<L>, ClientError> {
        self.accept_fulfillment(bounty, fulfillment).await
    }

    async fn on_cancel(&self, bounty: BountyId) -> Result<PendingTx<L>, ClientError> {
        self.cancel(bounty).await
    }
}
