//! Two-tier batch signing.
//!
//! ```text
//!   EnvelopeBuilder ──assemble──▶ AssembledBatch ──finalize──▶ FinalizedBatch
//!     (Empty)                    (InnerSigned k/n)             (OuterFinalized)
//!                                  ▲        │
//!                                  └─sign───┘  one entry per contributing account
//! ```
//!
//! **Inner tier.** Every contributing account other than the outer account
//! signs the same preimage:
//!
//! ```text
//! "BCH\0" | flags (BE u32) | count (BE u32) | txid_0 | txid_1 | ... | txid_n-1
//! ```
//!
//! where `txid_i = SHA512Half("TXN\0" | encode(raw_transaction_i))`. The
//! preimage covers flags and transaction order but never the signer list, so
//! co-signers can sign in parallel, off-system, in any order.
//!
//! **Outer tier.** The outer account signs
//! `"STX\0" | encode_for_signing(envelope)` after all co-signers are in.
//! That preimage includes `BatchSigners`, which is why it must come last.
//!
//! The inner preimage is computed once, at assembly, from an envelope that
//! can no longer change. Merged signatures are verified against it on the
//! way in.

use serde_json::Value;
use tracing::{debug, info};

use super::envelope::{BatchEnvelope, SignerEntry};
use super::error::BatchError;
use super::verification::{verify_batch_signatures, VerificationReport};
use crate::config::{HASH_PREFIX_BATCH, HASH_PREFIX_TX_SIGN};
use crate::crypto::{transaction_id, KeyError, KeyPair};
use crate::identity::AccountId;
use crate::wire::{CanonicalCodec, CodecError};

/// A 256-bit transaction identifier.
pub type TransactionId = [u8; 32];

// ---------------------------------------------------------------------------
// Preimages
// ---------------------------------------------------------------------------

/// The inner batch preimage every co-signer signs.
pub fn inner_digest_preimage(flags: u32, transaction_ids: &[TransactionId]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(12 + 32 * transaction_ids.len());
    buf.extend_from_slice(&HASH_PREFIX_BATCH.to_be_bytes());
    buf.extend_from_slice(&flags.to_be_bytes());
    buf.extend_from_slice(&(transaction_ids.len() as u32).to_be_bytes());
    for id in transaction_ids {
        buf.extend_from_slice(id);
    }
    buf
}

/// The single-signature preimage of a whole transaction.
pub fn outer_signing_preimage(
    envelope: &Value,
    codec: &dyn CanonicalCodec,
) -> Result<Vec<u8>, CodecError> {
    let mut buf = HASH_PREFIX_TX_SIGN.to_be_bytes().to_vec();
    buf.extend_from_slice(&codec.encode_for_signing(envelope)?);
    Ok(buf)
}

/// Produce a signer entry for an exported inner preimage.
///
/// This is what a co-signer runs on their own machine: it needs nothing but
/// the preimage bytes and their key. The result is handed back to whoever
/// holds the [`AssembledBatch`] and merged with
/// [`AssembledBatch::merge_signer`].
pub fn sign_inner_preimage(keypair: &KeyPair, preimage: &[u8]) -> Result<SignerEntry, KeyError> {
    let public_key = keypair.public_key();
    Ok(SignerEntry {
        account: AccountId::from_public_key(&public_key),
        public_key,
        signature: keypair.sign(preimage)?,
    })
}

// ---------------------------------------------------------------------------
// AssembledBatch
// ---------------------------------------------------------------------------

/// A frozen envelope collecting co-signatures.
#[derive(Debug, Clone)]
pub struct AssembledBatch {
    envelope: BatchEnvelope,
    transaction_ids: Vec<TransactionId>,
    inner_preimage: Vec<u8>,
    required_signers: Vec<AccountId>,
}

impl AssembledBatch {
    pub(crate) fn from_envelope(
        envelope: BatchEnvelope,
        codec: &dyn CanonicalCodec,
    ) -> Result<Self, BatchError> {
        let transaction_ids = envelope
            .raw_transactions()
            .iter()
            .map(|raw| Ok(transaction_id(&codec.encode(&raw.to_json())?)))
            .collect::<Result<Vec<_>, CodecError>>()?;

        let inner_preimage = inner_digest_preimage(envelope.flags().bits(), &transaction_ids);
        let required_signers = envelope.contributing_accounts();

        info!(
            outer = %envelope.outer_account(),
            transactions = transaction_ids.len(),
            required_signers = required_signers.len(),
            mode = %envelope.flags().mode(),
            "batch assembled"
        );

        Ok(Self {
            envelope,
            transaction_ids,
            inner_preimage,
            required_signers,
        })
    }

    pub fn envelope(&self) -> &BatchEnvelope {
        &self.envelope
    }

    /// Transaction IDs of the wrapped transactions, in envelope order.
    pub fn transaction_ids(&self) -> &[TransactionId] {
        &self.transaction_ids
    }

    pub fn transaction_ids_hex(&self) -> Vec<String> {
        self.transaction_ids.iter().map(hex::encode_upper).collect()
    }

    /// The bytes each co-signer signs. Safe to export.
    pub fn inner_preimage(&self) -> &[u8] {
        &self.inner_preimage
    }

    /// Accounts that must co-sign before finalization.
    pub fn required_signers(&self) -> &[AccountId] {
        &self.required_signers
    }

    /// Required signers that have not signed yet, in required order.
    pub fn pending_signers(&self) -> Vec<AccountId> {
        self.required_signers
            .iter()
            .filter(|acct| !self.has_signed(acct))
            .copied()
            .collect()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.pending_signers().is_empty()
    }

    fn has_signed(&self, account: &AccountId) -> bool {
        self.envelope.signers.iter().any(|s| &s.account == account)
    }

    fn check_signer(&self, account: &AccountId) -> Result<(), BatchError> {
        if account == self.envelope.outer_account() {
            return Err(BatchError::OuterAccountCosign(*account));
        }
        if !self.required_signers.contains(account) {
            return Err(BatchError::UnexpectedSigner(*account));
        }
        if self.has_signed(account) {
            return Err(BatchError::DuplicateSigner(*account));
        }
        Ok(())
    }

    /// Co-sign with a locally held key and append the entry.
    pub fn sign_inner(&mut self, keypair: &KeyPair) -> Result<&SignerEntry, BatchError> {
        let account = AccountId::from_public_key(&keypair.public_key());
        self.check_signer(&account)?;

        let entry = sign_inner_preimage(keypair, &self.inner_preimage)?;
        Ok(self.push_signer(entry))
    }

    /// Accept a signer entry produced elsewhere.
    ///
    /// The signature must verify against this batch's inner preimage and the
    /// public key must belong to the entry's account.
    pub fn merge_signer(&mut self, entry: SignerEntry) -> Result<(), BatchError> {
        self.check_signer(&entry.account)?;

        let key_account = AccountId::from_public_key(&entry.public_key);
        if key_account != entry.account {
            return Err(BatchError::KeyMismatch {
                account: entry.account,
                key_account,
            });
        }
        if !entry.public_key.verify(&self.inner_preimage, &entry.signature) {
            return Err(BatchError::InvalidSignature(entry.account));
        }

        self.push_signer(entry);
        Ok(())
    }

    fn push_signer(&mut self, entry: SignerEntry) -> &SignerEntry {
        debug!(
            signer = %entry.account,
            remaining = self
                .required_signers
                .len()
                .saturating_sub(self.envelope.signers.len() + 1),
            "batch signer accepted"
        );
        self.envelope.signers.push(entry);
        // Just pushed.
        &self.envelope.signers[self.envelope.signers.len() - 1]
    }

    /// Produce the outer-signed envelope.
    ///
    /// Fails with [`BatchError::MissingSigner`] while any contributing account
    /// has not signed. `outer` must be the outer account's master key.
    ///
    /// Takes `&self`: the assembled batch stays usable, so a failed
    /// submission can be re-finalized from the same signatures without
    /// touching the already-finalized value.
    pub fn finalize(
        &self,
        outer: &KeyPair,
        codec: &dyn CanonicalCodec,
    ) -> Result<FinalizedBatch, BatchError> {
        let pending = self.pending_signers();
        if !pending.is_empty() {
            return Err(BatchError::MissingSigner(pending));
        }

        let public_key = outer.public_key();
        let key_account = AccountId::from_public_key(&public_key);
        if &key_account != self.envelope.outer_account() {
            return Err(BatchError::KeyMismatch {
                account: *self.envelope.outer_account(),
                key_account,
            });
        }

        let mut envelope = self.envelope.clone();
        envelope.outer_public_key = Some(public_key);
        envelope.outer_signature = None;

        let preimage = outer_signing_preimage(&envelope.to_json(), codec)?;
        envelope.outer_signature = Some(outer.sign(&preimage)?);

        info!(
            outer = %envelope.outer_account(),
            signers = envelope.signers().len(),
            fee = envelope.fee(),
            "batch finalized"
        );

        Ok(FinalizedBatch {
            envelope,
            transaction_ids: self.transaction_ids.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// FinalizedBatch
// ---------------------------------------------------------------------------

/// A fully signed envelope. Immutable; any change means building a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedBatch {
    envelope: BatchEnvelope,
    transaction_ids: Vec<TransactionId>,
}

impl FinalizedBatch {
    pub fn envelope(&self) -> &BatchEnvelope {
        &self.envelope
    }

    pub fn transaction_ids(&self) -> &[TransactionId] {
        &self.transaction_ids
    }

    pub fn to_json(&self) -> Value {
        self.envelope.to_json()
    }

    /// Wire bytes for submission.
    pub fn encode_wire(&self, codec: &dyn CanonicalCodec) -> Result<Vec<u8>, BatchError> {
        Ok(codec.encode(&self.envelope.to_json())?)
    }

    /// Uppercase hex wire blob, the form `submit` expects.
    pub fn wire_hex(&self, codec: &dyn CanonicalCodec) -> Result<String, BatchError> {
        Ok(hex::encode_upper(self.encode_wire(codec)?))
    }

    /// Transaction ID of the envelope itself.
    pub fn hash(&self, codec: &dyn CanonicalCodec) -> Result<TransactionId, BatchError> {
        Ok(transaction_id(&self.encode_wire(codec)?))
    }

    /// Re-check every signature from scratch.
    pub fn verify(&self, codec: &dyn CanonicalCodec) -> Result<VerificationReport, BatchError> {
        verify_batch_signatures(&self.envelope.to_json(), codec)
    }
}
