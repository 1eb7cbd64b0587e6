//! Envelope fee schedule.
//!
//! Inner transactions pay nothing; the envelope pays for everyone:
//!
//! ```text
//! fee = base_fee * (signers + inner_transactions + 2)
//! ```
//!
//! The two extra units cover the outer account's own transaction cost and
//! batch processing overhead. The network sets this schedule; only
//! `base_fee` varies (fetched from a node at planning time).

use crate::config::FEE_OVERHEAD_UNITS;

/// Envelope fee in drops. Saturates at `u64::MAX` rather than wrapping.
pub fn compute_envelope_fee(base_fee: u64, signer_count: u32, inner_count: u32) -> u64 {
    let units = u64::from(signer_count) + u64::from(inner_count) + FEE_OVERHEAD_UNITS;
    base_fee.saturating_mul(units)
}
