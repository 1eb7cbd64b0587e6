//! Batch envelope assembly.
//!
//! [`EnvelopeBuilder`] is the `Empty` phase of the signing state machine: it
//! collects inner transactions, wraps each one into a fee-free
//! [`RawTransaction`], and hands a frozen
//! [`AssembledBatch`](super::signing::AssembledBatch) to the signer.
//!
//! Wrapping normalizes every inner transaction the same way:
//!
//! | Field            | Value                                   |
//! |------------------|-----------------------------------------|
//! | `Flags`          | caller flags OR `tfInnerBatchTxn`       |
//! | `Fee`            | `"0"`                                   |
//! | `SigningPubKey`  | `""`                                    |
//! | `Sequence`       | plain sequence, or 0 when ticketed      |
//! | `TicketSequence` | ticket, when ticketed                   |
//! | `NetworkID`      | configured network, when configured     |

use serde_json::{json, Map, Value};
use tracing::debug;

use super::error::BatchError;
use super::fee::compute_envelope_fee;
use super::index::compute_batch_index;
use super::signing::AssembledBatch;
use super::types::{BatchFlags, InnerTransaction, SequenceRef};
use crate::config::{BatchConfig, BATCH_TRANSACTION_TYPE, INNER_TRANSACTION_FEE, TF_INNER_BATCH_TXN};
use crate::crypto::{PublicKey, Signature};
use crate::identity::AccountId;
use crate::wire::CanonicalCodec;

/// Fields owned by the wrapper. Whatever the caller put there is replaced.
const WRAPPER_OWNED_FIELDS: [&str; 9] = [
    "TransactionType",
    "Account",
    "Flags",
    "Fee",
    "SigningPubKey",
    "TxnSignature",
    "Sequence",
    "TicketSequence",
    "NetworkID",
];

// ---------------------------------------------------------------------------
// RawTransaction
// ---------------------------------------------------------------------------

/// One inner transaction, normalized for inclusion in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTransaction {
    inner: InnerTransaction,
    sequence: SequenceRef,
    network_id: Option<u32>,
    flags: u32,
}

impl RawTransaction {
    /// Wrap `inner`. Fails if its `Flags` field is not a valid u32.
    pub fn wrap(
        inner: InnerTransaction,
        sequence: SequenceRef,
        network_id: Option<u32>,
    ) -> Result<Self, BatchError> {
        let flags = inner.flags()? | TF_INNER_BATCH_TXN;
        Ok(Self {
            inner,
            sequence,
            network_id,
            flags,
        })
    }

    pub fn account(&self) -> &AccountId {
        self.inner.account()
    }

    pub fn sequence(&self) -> SequenceRef {
        self.sequence
    }

    pub fn uses_ticket(&self) -> bool {
        self.sequence.uses_ticket()
    }

    pub fn transaction_type(&self) -> &str {
        self.inner.transaction_type()
    }

    /// Wrapped `Flags`, inner-batch bit included.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// The caller's original transaction.
    pub fn inner(&self) -> &InnerTransaction {
        &self.inner
    }

    /// The wrapped transaction as a standalone JSON object. This is what
    /// gets encoded to derive the transaction ID.
    pub fn to_json(&self) -> Value {
        let mut obj: Map<String, Value> = self
            .inner
            .fields()
            .iter()
            .filter(|(k, _)| !WRAPPER_OWNED_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        obj.insert(
            "TransactionType".into(),
            Value::String(self.inner.transaction_type().to_string()),
        );
        obj.insert("Account".into(), Value::String(self.account().to_address()));
        obj.insert("Flags".into(), Value::from(self.flags));
        obj.insert("Fee".into(), Value::String(INNER_TRANSACTION_FEE.to_string()));
        obj.insert("SigningPubKey".into(), Value::String(String::new()));
        obj.insert("Sequence".into(), Value::from(self.sequence.sequence_field()));
        if let Some(ticket) = self.sequence.ticket_field() {
            obj.insert("TicketSequence".into(), Value::from(ticket));
        }
        if let Some(network_id) = self.network_id {
            obj.insert("NetworkID".into(), Value::from(network_id));
        }
        Value::Object(obj)
    }

    /// `{"RawTransaction": {...}}`, the array element form inside the
    /// envelope.
    pub fn to_array_entry(&self) -> Value {
        json!({ "RawTransaction": self.to_json() })
    }
}

// ---------------------------------------------------------------------------
// SignerEntry
// ---------------------------------------------------------------------------

/// One contributing account's signature over the inner digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerEntry {
    pub account: AccountId,
    pub public_key: PublicKey,
    pub signature: Signature,
}

impl SignerEntry {
    /// `{"BatchSigner": {...}}`, the array element form inside the envelope.
    pub fn to_array_entry(&self) -> Value {
        json!({
            "BatchSigner": {
                "Account": self.account.to_address(),
                "SigningPubKey": self.public_key.to_hex(),
                "TxnSignature": self.signature.to_hex(),
            }
        })
    }

    /// Parse either the wrapped `{"BatchSigner": {...}}` form or the bare
    /// inner object.
    pub fn from_json(value: &Value) -> Result<Self, BatchError> {
        let obj = value.get("BatchSigner").unwrap_or(value);
        let field = |name: &str| {
            obj.get(name).and_then(Value::as_str).ok_or_else(|| {
                BatchError::MalformedTransaction(format!("batch signer missing {}", name))
            })
        };

        Ok(Self {
            account: AccountId::parse(field("Account")?)?,
            public_key: PublicKey::from_hex(field("SigningPubKey")?)?,
            signature: Signature::from_hex(field("TxnSignature")?)?,
        })
    }
}

// ---------------------------------------------------------------------------
// BatchEnvelope
// ---------------------------------------------------------------------------

/// The outer `Batch` transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEnvelope {
    pub(crate) outer_account: AccountId,
    pub(crate) flags: BatchFlags,
    pub(crate) fee: u64,
    pub(crate) sequence: SequenceRef,
    pub(crate) network_id: Option<u32>,
    pub(crate) outer_public_key: Option<PublicKey>,
    pub(crate) raw_transactions: Vec<RawTransaction>,
    pub(crate) signers: Vec<SignerEntry>,
    pub(crate) outer_signature: Option<Signature>,
}

impl BatchEnvelope {
    pub fn outer_account(&self) -> &AccountId {
        &self.outer_account
    }

    pub fn flags(&self) -> BatchFlags {
        self.flags
    }

    /// Envelope fee in drops.
    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn sequence(&self) -> SequenceRef {
        self.sequence
    }

    pub fn network_id(&self) -> Option<u32> {
        self.network_id
    }

    pub fn outer_public_key(&self) -> Option<&PublicKey> {
        self.outer_public_key.as_ref()
    }

    pub fn raw_transactions(&self) -> &[RawTransaction] {
        &self.raw_transactions
    }

    pub fn signers(&self) -> &[SignerEntry] {
        &self.signers
    }

    pub fn outer_signature(&self) -> Option<&Signature> {
        self.outer_signature.as_ref()
    }

    /// Distinct accounts with at least one inner transaction, excluding the
    /// outer account, in order of first appearance. Exactly these accounts
    /// must appear in the signer list.
    pub fn contributing_accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = Vec::new();
        for raw in &self.raw_transactions {
            let account = *raw.account();
            if account != self.outer_account && !accounts.contains(&account) {
                accounts.push(account);
            }
        }
        accounts
    }

    /// JSON form of the envelope. `BatchSigners` is omitted while empty and
    /// `TxnSignature` until the outer signature exists.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "TransactionType".into(),
            Value::String(BATCH_TRANSACTION_TYPE.to_string()),
        );
        obj.insert("Account".into(), Value::String(self.outer_account.to_address()));
        obj.insert("Flags".into(), Value::from(self.flags.bits()));
        obj.insert("Fee".into(), Value::String(self.fee.to_string()));
        obj.insert("Sequence".into(), Value::from(self.sequence.sequence_field()));
        if let Some(ticket) = self.sequence.ticket_field() {
            obj.insert("TicketSequence".into(), Value::from(ticket));
        }
        if let Some(network_id) = self.network_id {
            obj.insert("NetworkID".into(), Value::from(network_id));
        }
        obj.insert(
            "SigningPubKey".into(),
            Value::String(
                self.outer_public_key
                    .map(|pk| pk.to_hex())
                    .unwrap_or_default(),
            ),
        );
        obj.insert(
            "RawTransactions".into(),
            Value::Array(
                self.raw_transactions
                    .iter()
                    .map(RawTransaction::to_array_entry)
                    .collect(),
            ),
        );
        if !self.signers.is_empty() {
            obj.insert(
                "BatchSigners".into(),
                Value::Array(
                    self.signers
                        .iter()
                        .map(SignerEntry::to_array_entry)
                        .collect(),
                ),
            );
        }
        if let Some(sig) = &self.outer_signature {
            obj.insert("TxnSignature".into(), Value::String(sig.to_hex()));
        }
        Value::Object(obj)
    }
}

// ---------------------------------------------------------------------------
// EnvelopeBuilder
// ---------------------------------------------------------------------------

/// Collects inner transactions for one batch.
///
/// The network ID comes from the [`BatchConfig`] passed in; nothing is read
/// from the environment.
///
/// # Example
///
/// ```
/// use batch_protocol::config::BatchConfig;
/// use batch_protocol::identity::AccountId;
/// use batch_protocol::transaction::{
///     EnvelopeBuilder, ExecutionMode, InnerTransaction, SequenceRef,
/// };
///
/// let outer = AccountId::from_bytes([1u8; 20]);
/// let bob = AccountId::from_bytes([2u8; 20]);
///
/// let mut builder = EnvelopeBuilder::new(
///     &BatchConfig::default(),
///     outer,
///     ExecutionMode::AllOrNothing.into(),
///     SequenceRef::Plain(10),
/// );
/// builder.append(InnerTransaction::payment(bob, outer, 5), SequenceRef::Plain(3)).unwrap();
/// assert_eq!(builder.compute_fee(10), 40);
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    envelope: BatchEnvelope,
}

impl EnvelopeBuilder {
    pub fn new(
        config: &BatchConfig,
        outer_account: AccountId,
        flags: BatchFlags,
        sequence: SequenceRef,
    ) -> Self {
        Self {
            envelope: BatchEnvelope {
                outer_account,
                flags,
                fee: 0,
                sequence,
                network_id: config.network_id,
                outer_public_key: None,
                raw_transactions: Vec::new(),
                signers: Vec::new(),
                outer_signature: None,
            },
        }
    }

    /// Wrap `inner` and append it. Returns its batch index.
    pub fn append(
        &mut self,
        inner: InnerTransaction,
        sequence: SequenceRef,
    ) -> Result<u32, BatchError> {
        let account = *inner.account();
        let index = self.batch_index(&account, sequence.uses_ticket());
        let raw = RawTransaction::wrap(inner, sequence, self.envelope.network_id)?;

        debug!(
            account = %account,
            tx_type = raw.transaction_type(),
            %sequence,
            batch_index = index,
            "wrapped inner transaction"
        );
        self.envelope.raw_transactions.push(raw);
        Ok(index)
    }

    /// [`append`](Self::append) for loosely-typed input where the sequence
    /// and ticket arrive as separate optional values.
    pub fn append_parts(
        &mut self,
        inner: InnerTransaction,
        sequence: Option<u32>,
        ticket: Option<u32>,
    ) -> Result<u32, BatchError> {
        let sequence = SequenceRef::from_parts(sequence, ticket)?;
        self.append(inner, sequence)
    }

    /// Batch index a new transaction from `account` would get right now.
    pub fn batch_index(&self, account: &AccountId, uses_ticket: bool) -> u32 {
        compute_batch_index(
            &self.envelope.raw_transactions,
            account,
            uses_ticket,
            &self.envelope.outer_account,
        )
    }

    /// Set the envelope fee explicitly, in drops.
    pub fn set_fee(&mut self, fee: u64) -> &mut Self {
        self.envelope.fee = fee;
        self
    }

    /// Set the fee from the network fee schedule for the current contents and
    /// return it. Call after the last append.
    pub fn compute_fee(&mut self, base_fee: u64) -> u64 {
        let signers = self.envelope.contributing_accounts().len() as u32;
        let inner = self.envelope.raw_transactions.len() as u32;
        self.envelope.fee = compute_envelope_fee(base_fee, signers, inner);
        self.envelope.fee
    }

    pub fn envelope(&self) -> &BatchEnvelope {
        &self.envelope
    }

    pub fn len(&self) -> usize {
        self.envelope.raw_transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelope.raw_transactions.is_empty()
    }

    /// Freeze the envelope and derive everything signers need.
    ///
    /// Consumes the builder: once assembled, no transaction can be added or
    /// reordered, so signatures collected afterwards cannot go stale.
    pub fn assemble(self, codec: &dyn CanonicalCodec) -> Result<AssembledBatch, BatchError> {
        if self.envelope.raw_transactions.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        AssembledBatch::from_envelope(self.envelope, codec)
    }
}
