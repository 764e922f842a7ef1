//! Conversions between ledger tuples, domain records and display text.

use bounty_ledger::LedgerError;
use bounty_types::{Bounty, BountyId, Fulfillment, RawBounty, RawFulfillment, Timestamp, Wei};

/// Decode the `getBounty` tuple for `id`.
pub fn decode_bounty(id: BountyId, raw: RawBounty) -> Result<Bounty, LedgerError> {
    Bounty::from_raw(id, raw).map_err(|e| LedgerError::Decode(format!("bounty {id}: {e}")))
}

/// Decode the `getFulfillments` list for `id`, assigning positional indices.
///
/// Every element must reference `id`; a mismatch means the ledger answered
/// for the wrong bounty.
pub fn decode_fulfillments(
    id: BountyId,
    raws: Vec<RawFulfillment>,
) -> Result<Vec<Fulfillment>, LedgerError> {
    raws.into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let fulfillment = Fulfillment::from_raw(index, raw);
            if fulfillment.bounty_id != id {
                return Err(LedgerError::Decode(format!(
                    "fulfillment {index} of bounty {id} references bounty {}",
                    fulfillment.bounty_id
                )));
            }
            Ok(fulfillment)
        })
        .collect()
}

/// `0.01 ETH`
pub fn amount_text(amount: Wei) -> String {
    format!("{} ETH", amount.to_ether_string())
}

/// `Thu Mar 15, 2018`
pub fn deadline_text(deadline: Timestamp) -> String {
    deadline.to_calendar_date()
}
