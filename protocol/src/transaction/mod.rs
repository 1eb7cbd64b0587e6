//! # Transaction Module
//!
//! Assembly, indexing, fees and two-tier signing of atomic batch envelopes.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        — ExecutionMode, BatchFlags, SequenceRef, InnerTransaction
//! envelope.rs     — RawTransaction wrapping, SignerEntry, BatchEnvelope, EnvelopeBuilder
//! index.rs        — per-account batch index
//! fee.rs          — envelope fee schedule
//! signing.rs      — inner/outer preimages, AssembledBatch, FinalizedBatch
//! verification.rs — independent re-verification of a finished envelope
//! error.rs        — BatchError
//! ```
//!
//! ## Batch Lifecycle
//!
//! 1. **Build** — append inner transactions to an [`EnvelopeBuilder`], then
//!    set the fee with [`EnvelopeBuilder::compute_fee`].
//! 2. **Assemble** — [`EnvelopeBuilder::assemble`] freezes the envelope and
//!    derives the transaction IDs and the inner preimage.
//! 3. **Co-sign** — each contributing account signs the inner preimage,
//!    locally via [`AssembledBatch::sign_inner`] or elsewhere and merged
//!    with [`AssembledBatch::merge_signer`].
//! 4. **Finalize** — the outer account signs the complete envelope with
//!    [`AssembledBatch::finalize`].
//! 5. **Submit** — [`FinalizedBatch::encode_wire`] and hand the bytes to a
//!    ledger client.
//!
//! Each phase is its own type, so finalizing before every co-signer is in,
//! or appending after assembly, does not compile or fails loudly.

pub mod envelope;
pub mod error;
pub mod fee;
pub mod index;
pub mod signing;
pub mod types;
pub mod verification;

pub use envelope::{BatchEnvelope, EnvelopeBuilder, RawTransaction, SignerEntry};
pub use error::BatchError;
pub use fee::compute_envelope_fee;
pub use index::{compute_batch_index, describe_positions, BatchPosition};
pub use signing::{
    inner_digest_preimage, outer_signing_preimage, sign_inner_preimage, AssembledBatch,
    FinalizedBatch, TransactionId,
};
pub use types::{BatchFlags, ExecutionMode, InnerTransaction, SequenceRef};
pub use verification::{
    verify_batch_signatures, verify_inner_signature, SignerCheck, VerificationReport,
};
