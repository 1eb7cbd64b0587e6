//! Per-account batch position accounting.
//!
//! The batch index tells a user "this is the Nth transaction from account X
//! using sequence numbers (or tickets) in this batch". It is informational
//! only and depends on envelope contents at call time, so it is always
//! recomputed and never stored.

use serde::Serialize;

use super::envelope::{BatchEnvelope, RawTransaction};
use super::types::SequenceRef;
use crate::identity::AccountId;

/// Count the wrapped transactions from `account` sharing the same sequencing
/// mode, plus one when `account` is the outer account.
///
/// The outer account's envelope itself consumes a sequence, which is why its
/// inner transactions start one position later.
pub fn compute_batch_index(
    existing: &[RawTransaction],
    account: &AccountId,
    uses_ticket: bool,
    outer_account: &AccountId,
) -> u32 {
    let prior = existing
        .iter()
        .filter(|raw| raw.account() == account && raw.uses_ticket() == uses_ticket)
        .count() as u32;

    if account == outer_account {
        prior + 1
    } else {
        prior
    }
}

/// Position of one wrapped transaction, as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchPosition {
    pub account: AccountId,
    pub transaction_type: String,
    pub sequence: SequenceRef,
    pub batch_index: u32,
}

/// Batch index of every wrapped transaction, each computed against the
/// transactions appended before it.
pub fn describe_positions(envelope: &BatchEnvelope) -> Vec<BatchPosition> {
    let raws = envelope.raw_transactions();
    raws.iter()
        .enumerate()
        .map(|(i, raw)| BatchPosition {
            account: *raw.account(),
            transaction_type: raw.transaction_type().to_string(),
            sequence: raw.sequence(),
            batch_index: compute_batch_index(
                &raws[..i],
                raw.account(),
                raw.uses_ticket(),
                envelope.outer_account(),
            ),
        })
        .collect()
}
