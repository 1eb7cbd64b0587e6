//! Core type definitions for batch transactions.
//!
//! These are the vocabulary the envelope builder and signer speak: how a
//! batch executes, how an inner transaction is sequenced, and the inner
//! transaction payload itself.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::error::BatchError;
use crate::config::{
    BATCH_MODE_MASK, TF_ALL_OR_NOTHING, TF_INDEPENDENT, TF_ONLY_ONE, TF_UNTIL_FAILURE,
};
use crate::identity::AccountId;
use crate::objects::ObjectId;

/// `Flags` bit of a sell-side token offer.
const TF_SELL_NFTOKEN: u32 = 0x0000_0001;

// ---------------------------------------------------------------------------
// ExecutionMode
// ---------------------------------------------------------------------------

/// How the network applies the inner transactions of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// All succeed, or the whole batch is rolled back.
    AllOrNothing,
    /// Applied in order until the first success.
    OnlyOne,
    /// Applied in order until the first failure.
    UntilFailure,
    /// Every transaction applied independently.
    Independent,
}

impl ExecutionMode {
    /// The envelope flag bit for this mode.
    pub fn bit(self) -> u32 {
        match self {
            Self::AllOrNothing => TF_ALL_OR_NOTHING,
            Self::OnlyOne => TF_ONLY_ONE,
            Self::UntilFailure => TF_UNTIL_FAILURE,
            Self::Independent => TF_INDEPENDENT,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllOrNothing => write!(f, "all-or-nothing"),
            Self::OnlyOne => write!(f, "only-one"),
            Self::UntilFailure => write!(f, "until-failure"),
            Self::Independent => write!(f, "independent"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "all-or-nothing" => Ok(Self::AllOrNothing),
            "only-one" => Ok(Self::OnlyOne),
            "until-failure" => Ok(Self::UntilFailure),
            "independent" => Ok(Self::Independent),
            other => Err(format!("unknown execution mode '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// BatchFlags
// ---------------------------------------------------------------------------

/// Envelope flags with exactly one execution-mode bit set.
///
/// Bits outside the mode mask (universal transaction flags) pass through
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BatchFlags(u32);

impl BatchFlags {
    /// Validate raw flags.
    pub fn from_bits(bits: u32) -> Result<Self, BatchError> {
        if (bits & BATCH_MODE_MASK).count_ones() != 1 {
            return Err(BatchError::InvalidExecutionMode { flags: bits });
        }
        Ok(Self(bits))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn mode(self) -> ExecutionMode {
        match self.0 & BATCH_MODE_MASK {
            TF_ALL_OR_NOTHING => ExecutionMode::AllOrNothing,
            TF_ONLY_ONE => ExecutionMode::OnlyOne,
            TF_UNTIL_FAILURE => ExecutionMode::UntilFailure,
            // Construction guarantees exactly one mode bit.
            _ => ExecutionMode::Independent,
        }
    }
}

impl From<ExecutionMode> for BatchFlags {
    fn from(mode: ExecutionMode) -> Self {
        Self(mode.bit())
    }
}

impl TryFrom<u32> for BatchFlags {
    type Error = BatchError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::from_bits(bits)
    }
}

impl From<BatchFlags> for u32 {
    fn from(flags: BatchFlags) -> Self {
        flags.0
    }
}

// ---------------------------------------------------------------------------
// SequenceRef
// ---------------------------------------------------------------------------

/// How a transaction consumes its account's sequencing: the next account
/// sequence number, or a pre-reserved ticket. Never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceRef {
    Plain(u32),
    Ticket(u32),
}

impl SequenceRef {
    /// Build from the optional `Sequence` / `TicketSequence` pair found on
    /// loosely-typed transactions.
    ///
    /// A ticket may be accompanied by `Sequence: 0`, which is how ticketed
    /// transactions appear on the wire.
    pub fn from_parts(sequence: Option<u32>, ticket: Option<u32>) -> Result<Self, BatchError> {
        match (sequence, ticket) {
            (None, None) => Err(BatchError::InvalidSequencing(
                "neither a sequence nor a ticket was supplied",
            )),
            (Some(seq), None) => Ok(Self::Plain(seq)),
            (None, Some(t)) | (Some(0), Some(t)) => Ok(Self::Ticket(t)),
            (Some(_), Some(_)) => Err(BatchError::InvalidSequencing(
                "a ticketed transaction must not also carry a sequence",
            )),
        }
    }

    pub fn uses_ticket(&self) -> bool {
        matches!(self, Self::Ticket(_))
    }

    /// Value of the `Sequence` field: the sequence itself, or 0 for tickets.
    pub fn sequence_field(&self) -> u32 {
        match self {
            Self::Plain(seq) => *seq,
            Self::Ticket(_) => 0,
        }
    }

    /// Value of the `TicketSequence` field, if any.
    pub fn ticket_field(&self) -> Option<u32> {
        match self {
            Self::Plain(_) => None,
            Self::Ticket(t) => Some(*t),
        }
    }
}

impl fmt::Display for SequenceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(seq) => write!(f, "sequence {}", seq),
            Self::Ticket(t) => write!(f, "ticket {}", t),
        }
    }
}

// ---------------------------------------------------------------------------
// InnerTransaction
// ---------------------------------------------------------------------------

/// One caller-supplied transaction payload: a type tag, the account it acts
/// for, and its type-specific fields.
///
/// Treated as an immutable value. Wrapping copies it; nothing in the crate
/// edits the caller's copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnerTransaction {
    transaction_type: String,
    account: AccountId,
    fields: Map<String, Value>,
}

impl InnerTransaction {
    /// Generic constructor for any transaction type.
    ///
    /// `TransactionType` and `Account` entries in `fields` are dropped; the
    /// explicit arguments win.
    pub fn new(
        transaction_type: impl Into<String>,
        account: AccountId,
        mut fields: Map<String, Value>,
    ) -> Self {
        fields.remove("TransactionType");
        fields.remove("Account");
        Self {
            transaction_type: transaction_type.into(),
            account,
            fields,
        }
    }

    /// Parse a transaction from its JSON form.
    pub fn from_json(value: &Value) -> Result<Self, BatchError> {
        let obj = value
            .as_object()
            .ok_or_else(|| BatchError::MalformedTransaction("expected a JSON object".into()))?;

        let tx_type = obj
            .get("TransactionType")
            .and_then(Value::as_str)
            .ok_or_else(|| BatchError::MalformedTransaction("missing TransactionType".into()))?;
        let account = obj
            .get("Account")
            .and_then(Value::as_str)
            .ok_or_else(|| BatchError::MalformedTransaction("missing Account".into()))?;
        let account = AccountId::parse(account)?;

        Ok(Self::new(tx_type, account, obj.clone()))
    }

    /// XRP payment of `amount_drops` to `destination`.
    pub fn payment(account: AccountId, destination: AccountId, amount_drops: u64) -> Self {
        let mut fields = Map::new();
        fields.insert("Destination".into(), Value::String(destination.to_address()));
        fields.insert("Amount".into(), Value::String(amount_drops.to_string()));
        Self::new("Payment", account, fields)
    }

    /// Mint a token under `taxon`. `token_flags` lands in `Flags`;
    /// `transfer_fee` is in basis points of a percent (0..=50000).
    pub fn nftoken_mint(
        account: AccountId,
        taxon: u32,
        token_flags: u32,
        transfer_fee: Option<u16>,
    ) -> Self {
        let mut fields = Map::new();
        fields.insert("NFTokenTaxon".into(), Value::from(taxon));
        if token_flags != 0 {
            fields.insert("Flags".into(), Value::from(token_flags));
        }
        if let Some(fee) = transfer_fee {
            fields.insert("TransferFee".into(), Value::from(fee));
        }
        Self::new("NFTokenMint", account, fields)
    }

    /// Offer to sell `token` for `amount_drops`, optionally only to
    /// `destination`.
    pub fn nftoken_create_sell_offer(
        account: AccountId,
        token: &ObjectId,
        amount_drops: u64,
        destination: Option<AccountId>,
    ) -> Self {
        let mut fields = Map::new();
        fields.insert("NFTokenID".into(), Value::String(token.to_hex()));
        fields.insert("Amount".into(), Value::String(amount_drops.to_string()));
        fields.insert("Flags".into(), Value::from(TF_SELL_NFTOKEN));
        if let Some(dest) = destination {
            fields.insert("Destination".into(), Value::String(dest.to_address()));
        }
        Self::new("NFTokenCreateOffer", account, fields)
    }

    /// Accept an existing sell offer.
    pub fn nftoken_accept_sell_offer(account: AccountId, offer: &ObjectId) -> Self {
        let mut fields = Map::new();
        fields.insert("NFTokenSellOffer".into(), Value::String(offer.to_hex()));
        Self::new("NFTokenAcceptOffer", account, fields)
    }

    /// Add or replace a field.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        if name != "TransactionType" && name != "Account" {
            self.fields.insert(name, value);
        }
        self
    }

    pub fn transaction_type(&self) -> &str {
        &self.transaction_type
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The caller's `Flags`, or 0 when absent.
    pub fn flags(&self) -> Result<u32, BatchError> {
        match self.fields.get("Flags") {
            None => Ok(0),
            Some(v) => v
                .as_u64()
                .and_then(|f| u32::try_from(f).ok())
                .ok_or_else(|| {
                    BatchError::MalformedTransaction(format!("Flags must be a u32, got {}", v))
                }),
        }
    }

    /// Full JSON form.
    pub fn to_json(&self) -> Value {
        let mut obj = self.fields.clone();
        obj.insert(
            "TransactionType".into(),
            Value::String(self.transaction_type.clone()),
        );
        obj.insert("Account".into(), Value::String(self.account.to_address()));
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> AccountId {
        AccountId::from_bytes([0xA1; 20])
    }

    #[test]
    fn execution_mode_bits_roundtrip_through_flags() {
        for mode in [
            ExecutionMode::AllOrNothing,
            ExecutionMode::OnlyOne,
            ExecutionMode::UntilFailure,
            ExecutionMode::Independent,
        ] {
            let flags = BatchFlags::from(mode);
            assert_eq!(flags.mode(), mode);
            assert_eq!(BatchFlags::from_bits(flags.bits()).unwrap(), flags);
        }
    }

    #[test]
    fn test_flags_require_exactly_one_mode() {
        assert!(BatchFlags::from_bits(0).is_err());
        assert!(BatchFlags::from_bits(TF_ALL_OR_NOTHING | TF_INDEPENDENT).is_err());
        // Non-mode bits are allowed alongside a single mode bit.
        let flags = BatchFlags::from_bits(TF_ONLY_ONE | 0x8000_0000).unwrap();
        assert_eq!(flags.mode(), ExecutionMode::OnlyOne);
    }

    #[test]
    fn flags_serde_validates() {
        assert!(serde_json::from_str::<BatchFlags>("65536").is_ok());
        assert!(serde_json::from_str::<BatchFlags>("0").is_err());
        assert_eq!(
            serde_json::to_string(&BatchFlags::from(ExecutionMode::Independent)).unwrap(),
            "524288"
        );
    }

    #[test]
    fn execution_mode_parses_cli_spellings() {
        assert_eq!(
            "all-or-nothing".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::AllOrNothing
        );
        assert_eq!(
            "UNTIL_FAILURE".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::UntilFailure
        );
        assert!("sometimes".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_sequence_from_parts() {
        assert_eq!(
            SequenceRef::from_parts(Some(5), None).unwrap(),
            SequenceRef::Plain(5)
        );
        assert_eq!(
            SequenceRef::from_parts(None, Some(9)).unwrap(),
            SequenceRef::Ticket(9)
        );
        assert_eq!(
            SequenceRef::from_parts(Some(0), Some(9)).unwrap(),
            SequenceRef::Ticket(9)
        );
        assert!(matches!(
            SequenceRef::from_parts(None, None),
            Err(BatchError::InvalidSequencing(_))
        ));
        assert!(matches!(
            SequenceRef::from_parts(Some(3), Some(9)),
            Err(BatchError::InvalidSequencing(_))
        ));
    }

    #[test]
    fn ticket_renders_sequence_zero() {
        let t = SequenceRef::Ticket(12);
        assert!(t.uses_ticket());
        assert_eq!(t.sequence_field(), 0);
        assert_eq!(t.ticket_field(), Some(12));

        let p = SequenceRef::Plain(7);
        assert!(!p.uses_ticket());
        assert_eq!(p.sequence_field(), 7);
        assert_eq!(p.ticket_field(), None);
    }

    #[test]
    fn inner_transaction_from_json() {
        let tx = InnerTransaction::from_json(&json!({
            "TransactionType": "Payment",
            "Account": "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh",
            "Destination": "rrrrrrrrrrrrrrrrrrrrrhoLvTp",
            "Amount": "1000"
        }))
        .unwrap();
        assert_eq!(tx.transaction_type(), "Payment");
        assert_eq!(
            tx.account().to_address(),
            "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh"
        );
        assert!(!tx.fields().contains_key("Account"));
        assert_eq!(tx.fields()["Amount"], "1000");
    }

    #[test]
    fn inner_transaction_from_json_requires_type_and_account() {
        assert!(matches!(
            InnerTransaction::from_json(&json!({ "Account": "rrrrrrrrrrrrrrrrrrrrrhoLvTp" })),
            Err(BatchError::MalformedTransaction(_))
        ));
        assert!(matches!(
            InnerTransaction::from_json(&json!({ "TransactionType": "Payment" })),
            Err(BatchError::MalformedTransaction(_))
        ));
        let bad_account = json!({ "TransactionType": "Payment", "Account": "rBAD" });
        assert!(matches!(
            InnerTransaction::from_json(&bad_account),
            Err(BatchError::MalformedAccount(_))
        ));
    }

    #[test]
    fn intent_constructors() {
        let bob = AccountId::from_bytes([0xB0; 20]);
        let pay = InnerTransaction::payment(alice(), bob, 1_000_000);
        assert_eq!(pay.to_json()["Amount"], "1000000");
        assert_eq!(pay.to_json()["Destination"], bob.to_address());

        let mint = InnerTransaction::nftoken_mint(alice(), 0, 8, Some(500));
        assert_eq!(mint.flags().unwrap(), 8);
        assert_eq!(mint.fields()["TransferFee"], 500);

        let token = ObjectId::from_bytes([0x11; 32]);
        let offer = InnerTransaction::nftoken_create_sell_offer(alice(), &token, 10, Some(bob));
        assert_eq!(offer.flags().unwrap(), TF_SELL_NFTOKEN);
        assert_eq!(offer.fields()["NFTokenID"], token.to_hex());

        let accept = InnerTransaction::nftoken_accept_sell_offer(bob, &token);
        assert_eq!(accept.transaction_type(), "NFTokenAcceptOffer");
        assert_eq!(accept.flags().unwrap(), 0);
    }

    #[test]
    fn malformed_flags_reported() {
        let tx = InnerTransaction::payment(alice(), alice(), 1).with_field("Flags", json!("lots"));
        assert!(matches!(tx.flags(), Err(BatchError::MalformedTransaction(_))));
    }

    #[test]
    fn with_field_cannot_override_identity() {
        let tx = InnerTransaction::payment(alice(), alice(), 1)
            .with_field("Account", json!("rrrrrrrrrrrrrrrrrrrrrhoLvTp"))
            .with_field("Memo", json!("x"));
        assert_eq!(tx.account(), &alice());
        assert_eq!(tx.fields()["Memo"], "x");
    }
}
