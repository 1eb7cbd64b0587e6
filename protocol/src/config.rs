//! # Protocol Configuration & Constants
//!
//! Every magic number the batch protocol depends on lives here. Most of them
//! are not ours to choose: hash prefixes, flag bits, and the taxon scramble
//! are fixed by the ledger network, and a single wrong bit produces
//! signatures the network rejects.
//!
//! The only tunable values are in [`BatchConfig`], which is passed explicitly
//! to the envelope builder. There is no process-wide lookup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Version of this library, reported by the CLI.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Network ID used when the deployment does not configure one. This is the
/// batch devnet the tooling was first exercised against.
pub const DEFAULT_NETWORK_ID: u32 = 21336;

/// Networks with an ID at or below this value are legacy networks that never
/// carry a `NetworkID` field. The planner drops the field when a node reports
/// such an ID; the builder itself stamps whatever the caller configures.
pub const LEGACY_NETWORK_ID_MAX: u32 = 1024;

// ---------------------------------------------------------------------------
// Hash Prefixes
// ---------------------------------------------------------------------------

/// `TXN\0` — prepended to a canonically encoded transaction before hashing
/// it into a transaction identifier.
pub const HASH_PREFIX_TRANSACTION_ID: u32 = 0x5458_4E00;

/// `STX\0` — prepended to the signing encoding of a single-signed
/// transaction. Used for the outer envelope signature.
pub const HASH_PREFIX_TX_SIGN: u32 = 0x5354_5800;

/// `BCH\0` — domain separator for the inner batch digest every co-signer
/// signs.
pub const HASH_PREFIX_BATCH: u32 = 0x4243_4800;

// ---------------------------------------------------------------------------
// Ledger Object Identifiers
// ---------------------------------------------------------------------------

/// Ledger space key for token offers. The offer identifier is
/// `SHA512Half(0x0071 || owner || sequence)`.
pub const OFFER_SPACE_KEY: [u8; 2] = [0x00, 0x71];

/// Multiplier of the taxon scramble. Network-mandated.
pub const TAXON_SCRAMBLE_MULTIPLIER: u32 = 384_160_001;

/// Increment of the taxon scramble. Network-mandated.
pub const TAXON_SCRAMBLE_INCREMENT: u32 = 2_459;

// ---------------------------------------------------------------------------
// Batch Flags
// ---------------------------------------------------------------------------

/// Every inner transaction either succeeds or the whole batch is dropped.
pub const TF_ALL_OR_NOTHING: u32 = 0x0001_0000;

/// Inner transactions are tried in order until the first one succeeds.
pub const TF_ONLY_ONE: u32 = 0x0002_0000;

/// Inner transactions are applied in order until the first failure.
pub const TF_UNTIL_FAILURE: u32 = 0x0004_0000;

/// Every inner transaction is applied independently (best effort).
pub const TF_INDEPENDENT: u32 = 0x0008_0000;

/// Union of all execution-mode bits. Exactly one of them must be set.
pub const BATCH_MODE_MASK: u32 =
    TF_ALL_OR_NOTHING | TF_ONLY_ONE | TF_UNTIL_FAILURE | TF_INDEPENDENT;

/// Marks a transaction as being carried inside a batch. The network refuses
/// to apply such a transaction on its own.
pub const TF_INNER_BATCH_TXN: u32 = 0x4000_0000;

/// Transaction type tag of the envelope.
pub const BATCH_TRANSACTION_TYPE: &str = "Batch";

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Fee units charged on top of one unit per signer and per inner
/// transaction: the outer account's own base cost plus batch overhead.
pub const FEE_OVERHEAD_UNITS: u64 = 2;

/// Inner transactions never pay fees; only the envelope does.
pub const INNER_TRANSACTION_FEE: &str = "0";

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Default number of attempts for read-only ledger lookups.
pub const DEFAULT_LOOKUP_ATTEMPTS: u32 = 3;

/// Initial backoff between lookup attempts. Doubles on each retry.
pub const DEFAULT_LOOKUP_BACKOFF: Duration = Duration::from_millis(250);

/// Backoff ceiling for lookup retries.
pub const MAX_LOOKUP_BACKOFF: Duration = Duration::from_secs(4);

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Retry behaviour for idempotent, read-only lookups (fees, sequences,
/// definitions). Submission is never retried, whatever this says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.initial_backoff_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_LOOKUP_ATTEMPTS,
            initial_backoff_ms: DEFAULT_LOOKUP_BACKOFF.as_millis() as u64,
            max_backoff_ms: MAX_LOOKUP_BACKOFF.as_millis() as u64,
        }
    }
}

/// Deployment configuration handed to the envelope builder and planner.
///
/// `network_id` is stamped on every wrapped inner transaction and on the
/// envelope. `None` leaves the `NetworkID` field out entirely, which is what
/// legacy networks expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Network identifier to stamp, if any.
    pub network_id: Option<u32>,
    /// Retry policy for read-only lookups.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl BatchConfig {
    /// Configuration for a specific network.
    pub fn for_network(network_id: u32) -> Self {
        Self {
            network_id: Some(network_id),
            retry: RetryPolicy::default(),
        }
    }

    /// Configuration that omits `NetworkID` everywhere.
    pub fn without_network_id() -> Self {
        Self {
            network_id: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::for_network(DEFAULT_NETWORK_ID)
    }
}
