//! The bounty state machine.
//!
//! Holds every bounty, its fulfillments and escrow, plus account balances.
//! Each operation is validated in full before anything is mutated, so a
//! rejected call leaves the registry exactly as it was.
//!
//! Checks run in a fixed order: existence, stage, authorization, then the
//! operation's own preconditions.

use std::collections::HashMap;

use bounty_types::{
    Bounty, BountyId, Fulfillment, Identity, RawBounty, RawFulfillment, Stage, Timestamp, Wei,
};
use tracing::debug;

use crate::{LedgerCall, LedgerError};

/// What an applied call changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Issued { bounty: BountyId, escrow: Wei },
    Fulfilled { bounty: BountyId, index: usize },
    Paid { bounty: BountyId, to: Identity, amount: Wei },
    Killed { bounty: BountyId, refund: Wei },
}

#[derive(Clone, Debug)]
struct Entry {
    bounty: Bounty,
    fulfillments: Vec<Fulfillment>,
    accepted: Option<usize>,
    escrow: Wei,
}

/// In-memory authoritative bounty ledger state.
#[derive(Clone, Debug, Default)]
pub struct BountyRegistry {
    entries: Vec<Entry>,
    balances: HashMap<Identity, Wei>,
}

impl BountyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account, e.g. from a genesis allocation.
    pub fn fund(&mut self, account: Identity, amount: Wei) -> Result<(), LedgerError> {
        let balance = self.balance_of(&account);
        let credited = balance.checked_add(amount).ok_or_else(|| {
            LedgerError::InvalidRequest(format!("balance overflow funding {account}"))
        })?;
        self.balances.insert(account, credited);
        Ok(())
    }

    pub fn balance_of(&self, account: &Identity) -> Wei {
        self.balances.get(account).copied().unwrap_or(Wei::ZERO)
    }

    pub fn num_bounties(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn get_bounty(&self, id: BountyId) -> Result<RawBounty, LedgerError> {
        self.entry(id).map(|e| e.bounty.to_raw())
    }

    pub fn get_fulfillments(&self, id: BountyId) -> Result<Vec<RawFulfillment>, LedgerError> {
        self.entry(id)
            .map(|e| e.fulfillments.iter().map(Fulfillment::to_raw).collect())
    }

    /// Amount currently held in escrow for a bounty.
    pub fn escrow_of(&self, id: BountyId) -> Result<Wei, LedgerError> {
        self.entry(id).map(|e| e.escrow)
    }

    /// Validate `call` from `sender` at time `now` without applying it.
    pub fn check(
        &self,
        sender: &Identity,
        call: &LedgerCall,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if sender.is_zero() {
            return Err(LedgerError::InvalidRequest("sender is the zero address".into()));
        }
        match call {
            LedgerCall::IssueBounty {
                arbiter,
                deadline,
                amount,
                title,
                ..
            } => {
                if amount.is_zero() {
                    return Err(LedgerError::InvalidRequest(
                        "fulfillment amount must be positive".into(),
                    ));
                }
                if title.trim().is_empty() {
                    return Err(LedgerError::InvalidRequest("title must not be empty".into()));
                }
                if arbiter.is_zero() {
                    return Err(LedgerError::InvalidRequest("arbiter is the zero address".into()));
                }
                if deadline.has_passed(now) {
                    return Err(LedgerError::InvalidRequest(format!(
                        "deadline {} is already in the past",
                        deadline.as_secs()
                    )));
                }
                let available = self.balance_of(sender);
                if available < *amount {
                    return Err(LedgerError::InsufficientFunds {
                        needed: *amount,
                        available,
                    });
                }
                Ok(())
            }
            LedgerCall::FulfillBounty { bounty, link } => {
                let entry = self.open_entry(*bounty)?;
                if entry.accepted.is_some() {
                    return Err(LedgerError::conflict(*bounty, "bounty has already been paid"));
                }
                if entry.bounty.deadline.has_passed(now) {
                    return Err(LedgerError::conflict(*bounty, "deadline has passed"));
                }
                if *sender == entry.bounty.issuer {
                    return Err(LedgerError::Unauthorized {
                        who: *sender,
                        action: format!("fulfill own bounty {bounty}"),
                    });
                }
                if link.trim().is_empty() {
                    return Err(LedgerError::InvalidRequest("evidence link must not be empty".into()));
                }
                Ok(())
            }
            LedgerCall::AcceptFulfillment {
                bounty,
                fulfillment,
            } => {
                let entry = self.open_entry(*bounty)?;
                if !entry.bounty.can_accept(sender) {
                    return Err(LedgerError::Unauthorized {
                        who: *sender,
                        action: format!("accept fulfillments on bounty {bounty}"),
                    });
                }
                if let Some(accepted) = entry.accepted {
                    return Err(LedgerError::conflict(
                        *bounty,
                        format!("fulfillment {accepted} was already accepted"),
                    ));
                }
                if *fulfillment >= entry.fulfillments.len() {
                    return Err(LedgerError::FulfillmentNotFound {
                        bounty: *bounty,
                        index: *fulfillment,
                    });
                }
                Ok(())
            }
            LedgerCall::KillBounty { bounty } => {
                let entry = self.open_entry(*bounty)?;
                if *sender != entry.bounty.issuer {
                    return Err(LedgerError::Unauthorized {
                        who: *sender,
                        action: format!("kill bounty {bounty}"),
                    });
                }
                if let Some(accepted) = entry.accepted {
                    return Err(LedgerError::conflict(
                        *bounty,
                        format!("fulfillment {accepted} was already accepted"),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Validate and apply `call`.
    pub fn apply(
        &mut self,
        sender: &Identity,
        call: &LedgerCall,
        now: Timestamp,
    ) -> Result<Effect, LedgerError> {
        self.check(sender, call, now)?;

        let effect = match call {
            LedgerCall::IssueBounty {
                arbiter,
                deadline,
                amount,
                title,
                description,
            } => {
                let id = BountyId::new(self.num_bounties());
                let remaining = self.balance_of(sender).saturating_sub(*amount);
                self.balances.insert(*sender, remaining);
                self.entries.push(Entry {
                    bounty: Bounty {
                        id,
                        issuer: *sender,
                        arbiter: *arbiter,
                        deadline: *deadline,
                        fulfillment_amount: *amount,
                        title: title.clone(),
                        description: description.clone(),
                        stage: Stage::Active,
                    },
                    fulfillments: Vec::new(),
                    accepted: None,
                    escrow: *amount,
                });
                Effect::Issued {
                    bounty: id,
                    escrow: *amount,
                }
            }
            LedgerCall::FulfillBounty { bounty, link } => {
                let entry = self.entry_mut(*bounty)?;
                let index = entry.fulfillments.len();
                entry.fulfillments.push(Fulfillment {
                    bounty_id: *bounty,
                    index,
                    fulfiller: *sender,
                    link: link.clone(),
                    accepted: false,
                });
                Effect::Fulfilled {
                    bounty: *bounty,
                    index,
                }
            }
            LedgerCall::AcceptFulfillment {
                bounty,
                fulfillment,
            } => {
                let (to, amount) = {
                    let entry = self.entry(*bounty)?;
                    (entry.fulfillments[*fulfillment].fulfiller, entry.escrow)
                };
                let credited = self.credit_target(&to, amount)?;
                self.balances.insert(to, credited);
                let entry = self.entry_mut(*bounty)?;
                entry.fulfillments[*fulfillment].accepted = true;
                entry.accepted = Some(*fulfillment);
                entry.escrow = Wei::ZERO;
                Effect::Paid {
                    bounty: *bounty,
                    to,
                    amount,
                }
            }
            LedgerCall::KillBounty { bounty } => {
                let (issuer, refund) = {
                    let entry = self.entry(*bounty)?;
                    (entry.bounty.issuer, entry.escrow)
                };
                let credited = self.credit_target(&issuer, refund)?;
                self.balances.insert(issuer, credited);
                let entry = self.entry_mut(*bounty)?;
                entry.bounty.stage = Stage::Dead;
                entry.escrow = Wei::ZERO;
                Effect::Killed {
                    bounty: *bounty,
                    refund,
                }
            }
        };

        debug!(method = call.method(), %sender, ?effect, "applied ledger call");
        Ok(effect)
    }

    fn entry(&self, id: BountyId) -> Result<&Entry, LedgerError> {
        self.entries
            .get(id.index())
            .ok_or(LedgerError::BountyNotFound { id })
    }

    fn entry_mut(&mut self, id: BountyId) -> Result<&mut Entry, LedgerError> {
        self.entries
            .get_mut(id.index())
            .ok_or(LedgerError::BountyNotFound { id })
    }

    /// An existing bounty that still accepts calls.
    fn open_entry(&self, id: BountyId) -> Result<&Entry, LedgerError> {
        let entry = self.entry(id)?;
        let stage = entry.bounty.stage;
        if stage.is_terminal() {
            return Err(LedgerError::conflict(id, "bounty has been killed"));
        }
        if !stage.is_open() {
            return Err(LedgerError::conflict(
                id,
                format!("stage is {stage}, expected Active"),
            ));
        }
        Ok(entry)
    }

    fn credit_target(&self, account: &Identity, amount: Wei) -> Result<Wei, LedgerError> {
        self.balance_of(account)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Internal(format!("balance overflow crediting {account}")))
    }
}
