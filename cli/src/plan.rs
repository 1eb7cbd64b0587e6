//! Plan and intents files.
//!
//! A **plan** is fully specified and offline: every sequence, the base fee,
//! and the secrets of the outer account and every co-signer. `preview` turns
//! it into a finalized envelope without touching the network.
//!
//! An **intents** file only names what should happen. `plan` asks a node for
//! the fee, the network ID and each account's next sequence, then prints the
//! unsigned envelope and the accounts that must co-sign it. Transaction IDs
//! and the inner preimage are only printed when an offline codec is chosen,
//! and are then marked as not valid for the network.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use batch_protocol::config::{BatchConfig, DEFAULT_NETWORK_ID};
use batch_protocol::crypto::KeyPair;
use batch_protocol::identity::AccountId;
use batch_protocol::network::{BatchPlan, PlannedTransaction};
use batch_protocol::transaction::{
    describe_positions, AssembledBatch, BatchFlags, BatchPosition, EnvelopeBuilder, ExecutionMode,
    InnerTransaction, SequenceRef,
};
use batch_protocol::wire::CanonicalCodec;

fn default_network_id() -> Option<u32> {
    Some(DEFAULT_NETWORK_ID)
}

fn read_json_file<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

// ---------------------------------------------------------------------------
// Plan file
// ---------------------------------------------------------------------------

/// Offline batch description.
///
/// ```json
/// {
///   "network_id": 21336,
///   "mode": "all_or_nothing",
///   "base_fee": 10,
///   "outer": { "secret": "ED…", "sequence": 12 },
///   "transactions": [
///     { "transaction": { "TransactionType": "Payment", "Account": "r…", … }, "sequence": 13 }
///   ],
///   "cosigner_secrets": ["ED…"]
/// }
/// ```
///
/// `network_id: null` omits `NetworkID` everywhere. A transaction entry
/// without `sequence`/`ticket` falls back to the transaction's own
/// `Sequence`/`TicketSequence` fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanFile {
    #[serde(default = "default_network_id")]
    pub network_id: Option<u32>,
    pub mode: ExecutionMode,
    pub base_fee: u64,
    pub outer: OuterSigner,
    pub transactions: Vec<PlanEntry>,
    #[serde(default)]
    pub cosigner_secrets: Vec<String>,
}

/// The outer account and how its envelope is sequenced.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OuterSigner {
    /// Optional; checked against the secret when both are present.
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub sequence: Option<u32>,
    #[serde(default)]
    pub ticket: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanEntry {
    pub transaction: Value,
    #[serde(default)]
    pub sequence: Option<u32>,
    #[serde(default)]
    pub ticket: Option<u32>,
}

impl PlanEntry {
    fn sequence_ref(&self) -> Result<SequenceRef> {
        let from_tx = |field: &str| {
            self.transaction
                .get(field)
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
        };
        let (sequence, ticket) = if self.sequence.is_some() || self.ticket.is_some() {
            (self.sequence, self.ticket)
        } else {
            (from_tx("Sequence"), from_tx("TicketSequence"))
        };
        Ok(SequenceRef::from_parts(sequence, ticket)?)
    }
}

/// Everything `preview` prints.
#[derive(Debug, Serialize)]
pub struct PreviewOutput {
    pub envelope: Value,
    pub fee: u64,
    pub transaction_ids: Vec<String>,
    /// Bytes every co-signer signed, uppercase hex.
    pub inner_preimage: String,
    pub positions: Vec<BatchPosition>,
    pub envelope_hash: String,
}

impl PlanFile {
    pub fn load(path: &Path) -> Result<Self> {
        read_json_file(path)
    }

    /// Resolve the outer key: the override wins over the plan's own secret.
    pub fn outer_key(&self, secret_override: Option<&str>) -> Result<KeyPair> {
        let secret = secret_override
            .or(self.outer.secret.as_deref())
            .context("no outer secret: set BATCH_OUTER_SECRET or outer.secret")?;
        let key = KeyPair::from_hex(secret).context("invalid outer secret")?;

        if let Some(declared) = &self.outer.account {
            let declared = AccountId::parse(declared).context("invalid outer.account")?;
            let derived = AccountId::from_public_key(&key.public_key());
            if declared != derived {
                bail!("outer secret belongs to {derived}, plan names {declared}");
            }
        }
        Ok(key)
    }

    /// Wrap every transaction and set the fee.
    pub fn build(&self, outer: AccountId, network_id: Option<u32>) -> Result<EnvelopeBuilder> {
        let config = BatchConfig {
            network_id,
            ..BatchConfig::default()
        };
        let envelope_sequence = SequenceRef::from_parts(self.outer.sequence, self.outer.ticket)
            .context("outer needs a sequence or a ticket")?;
        let mut builder = EnvelopeBuilder::new(
            &config,
            outer,
            BatchFlags::from(self.mode),
            envelope_sequence,
        );

        for (i, entry) in self.transactions.iter().enumerate() {
            let inner = InnerTransaction::from_json(&entry.transaction)
                .with_context(|| format!("transaction #{i}"))?;
            let sequence = entry
                .sequence_ref()
                .with_context(|| format!("transaction #{i}"))?;
            builder.append(inner, sequence)?;
        }
        builder.compute_fee(self.base_fee);
        Ok(builder)
    }

    /// Assemble, co-sign and finalize.
    pub fn preview(
        &self,
        outer_secret: Option<&str>,
        network_id_override: Option<u32>,
        codec: &dyn CanonicalCodec,
    ) -> Result<PreviewOutput> {
        let outer_key = self.outer_key(outer_secret)?;
        let outer = AccountId::from_public_key(&outer_key.public_key());
        let network_id = network_id_override.or(self.network_id);

        let builder = self.build(outer, network_id)?;
        let positions = describe_positions(builder.envelope());
        let mut assembled = builder.assemble(codec)?;

        for (i, secret) in self.cosigner_secrets.iter().enumerate() {
            let key = KeyPair::from_hex(secret)
                .with_context(|| format!("invalid co-signer secret #{i}"))?;
            assembled
                .sign_inner(&key)
                .with_context(|| format!("co-signer #{i}"))?;
        }

        let finalized = assembled.finalize(&outer_key, codec)?;
        Ok(PreviewOutput {
            envelope: finalized.to_json(),
            fee: finalized.envelope().fee(),
            transaction_ids: assembled.transaction_ids_hex(),
            inner_preimage: hex::encode_upper(assembled.inner_preimage()),
            positions,
            envelope_hash: hex::encode_upper(finalized.hash(codec)?),
        })
    }
}

// ---------------------------------------------------------------------------
// Intents file
// ---------------------------------------------------------------------------

/// Networked batch description; sequences come from the node.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntentsFile {
    pub outer: String,
    pub mode: ExecutionMode,
    #[serde(default)]
    pub outer_ticket: Option<u32>,
    pub transactions: Vec<Intent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Intent {
    pub transaction: Value,
    #[serde(default)]
    pub ticket: Option<u32>,
}

impl IntentsFile {
    pub fn load(path: &Path) -> Result<Self> {
        read_json_file(path)
    }

    pub fn outer_account(&self) -> Result<AccountId> {
        AccountId::parse(&self.outer).context("invalid outer account")
    }

    pub fn planned_transactions(&self) -> Result<Vec<PlannedTransaction>> {
        self.transactions
            .iter()
            .enumerate()
            .map(|(i, intent)| {
                let inner = InnerTransaction::from_json(&intent.transaction)
                    .with_context(|| format!("transaction #{i}"))?;
                Ok(match intent.ticket {
                    Some(ticket) => PlannedTransaction::ticketed(inner, ticket),
                    None => PlannedTransaction::sequenced(inner),
                })
            })
            .collect()
    }
}

/// Label attached to `plan` output encoded with the offline codec.
pub const OFFLINE_CODEC_LABEL: &str = "sorted-json (offline, not network-valid)";

/// Everything `plan` prints: the unsigned envelope and who must co-sign it.
///
/// `transaction_ids` and `inner_preimage` depend on the canonical encoding.
/// They are present only when an offline codec was requested, together with
/// `codec` naming it.
#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub base_fee: u64,
    pub network_id: Option<u32>,
    pub fee: u64,
    pub envelope: Value,
    pub positions: Vec<BatchPosition>,
    pub required_signers: Vec<AccountId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_preimage: Option<String>,
}

impl PlanOutput {
    /// Describe a planned batch. With `offline_codec`, also assemble it and
    /// include the codec-dependent IDs and preimage.
    pub fn new(plan: BatchPlan, offline_codec: Option<&dyn CanonicalCodec>) -> Result<Self> {
        let BatchPlan {
            builder,
            base_fee,
            network_id,
            ..
        } = plan;
        let envelope = builder.envelope();
        let mut output = Self {
            base_fee,
            network_id,
            fee: envelope.fee(),
            envelope: envelope.to_json(),
            positions: describe_positions(envelope),
            required_signers: envelope.contributing_accounts(),
            codec: None,
            transaction_ids: None,
            inner_preimage: None,
        };

        if let Some(codec) = offline_codec {
            let assembled: AssembledBatch = builder.assemble(codec)?;
            output.codec = Some(OFFLINE_CODEC_LABEL);
            output.transaction_ids = Some(assembled.transaction_ids_hex());
            output.inner_preimage = Some(hex::encode_upper(assembled.inner_preimage()));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch_protocol::transaction::verify_batch_signatures;
    use batch_protocol::wire::{NetworkDefinitions, SortedJsonCodec};
    use serde_json::json;

    fn secret(b: u8) -> String {
        format!("ED{}", hex::encode_upper([b; 32]))
    }

    fn address(b: u8) -> String {
        let key = KeyPair::from_ed25519_secret(&[b; 32]);
        AccountId::from_public_key(&key.public_key()).to_address()
    }

    fn payment(from: &str, to: &str, drops: &str) -> Value {
        json!({
            "TransactionType": "Payment",
            "Account": from,
            "Destination": to,
            "Amount": drops,
        })
    }

    fn two_party_plan() -> PlanFile {
        let (o, b) = (address(1), address(2));
        let mut returned = payment(&b, &o, "500");
        returned["Sequence"] = json!(40);
        serde_json::from_value(json!({
            "mode": "all_or_nothing",
            "base_fee": 10,
            "outer": { "secret": secret(1), "sequence": 5 },
            "transactions": [
                { "transaction": payment(&o, &b, "1000"), "sequence": 6 },
                { "transaction": returned }
            ],
            "cosigner_secrets": [secret(2)]
        }))
        .unwrap()
    }

    /// A networked plan as the planner would hand it back.
    fn planned_batch() -> BatchPlan {
        let plan = two_party_plan();
        let key = KeyPair::from_ed25519_secret(&[1; 32]);
        let outer = AccountId::from_public_key(&key.public_key());
        let definitions = NetworkDefinitions::from_json(&json!({
            "TYPES": { "UInt16": 1 },
            "FIELDS": [["TransactionType", { "nth": 2, "type": "UInt16" }]],
            "TRANSACTION_TYPES": { "Payment": 0, "Batch": 71 },
            "LEDGER_ENTRY_TYPES": { "AccountRoot": 97 },
            "TRANSACTION_RESULTS": { "tesSUCCESS": 0 }
        }))
        .unwrap();
        BatchPlan {
            builder: plan.build(outer, Some(21336)).unwrap(),
            base_fee: 10,
            network_id: Some(21336),
            definitions,
        }
    }

    #[test]
    fn test_preview_produces_verifiable_envelope() {
        let plan = two_party_plan();
        let codec = SortedJsonCodec::new();
        let out = plan.preview(None, None, &codec).unwrap();

        // 1 co-signer + 2 inner + 2.
        assert_eq!(out.fee, 50);
        assert_eq!(out.transaction_ids.len(), 2);
        assert_eq!(out.envelope["NetworkID"], json!(DEFAULT_NETWORK_ID));
        assert_eq!(
            out.envelope["RawTransactions"][1]["RawTransaction"]["Sequence"],
            json!(40)
        );
        assert!(out.inner_preimage.starts_with("42434800"));

        let report = verify_batch_signatures(&out.envelope, &codec).unwrap();
        assert!(report.is_valid());
    }

    #[test]
    fn null_network_id_omits_field() {
        let mut plan = two_party_plan();
        plan.network_id = None;
        let out = plan.preview(None, None, &SortedJsonCodec::new()).unwrap();
        assert!(out.envelope.get("NetworkID").is_none());

        let out = plan.preview(None, Some(7), &SortedJsonCodec::new()).unwrap();
        assert_eq!(out.envelope["NetworkID"], json!(7));
    }

    #[test]
    fn missing_cosigner_fails_preview() {
        let mut plan = two_party_plan();
        plan.cosigner_secrets.clear();
        let err = plan.preview(None, None, &SortedJsonCodec::new()).unwrap_err();
        assert!(err.to_string().contains("missing"), "{err:#}");
    }

    #[test]
    fn outer_secret_override_and_account_check() {
        let mut plan = two_party_plan();
        plan.outer.secret = None;
        assert!(plan.outer_key(None).is_err());
        assert!(plan.outer_key(Some(&secret(1))).is_ok());

        plan.outer.account = Some(address(3));
        assert!(plan.outer_key(Some(&secret(1))).is_err());
    }

    #[test]
    fn entry_without_any_sequencing_is_rejected() {
        let mut plan = two_party_plan();
        plan.transactions[1].transaction = payment(&address(2), &address(1), "1");
        assert!(plan.preview(None, None, &SortedJsonCodec::new()).is_err());
    }

    #[test]
    fn unknown_plan_fields_rejected() {
        let result: Result<PlanFile, _> = serde_json::from_value(json!({
            "mode": "independent",
            "base_fee": 1,
            "outer": { "sequence": 1 },
            "transactions": [],
            "signers": []
        }));
        assert!(result.is_err());
    }

    #[test]
    fn intents_parse_into_planned_transactions() {
        let intents: IntentsFile = serde_json::from_value(json!({
            "outer": address(1),
            "mode": "only_one",
            "transactions": [
                { "transaction": payment(&address(1), &address(2), "1") },
                { "transaction": payment(&address(2), &address(1), "1"), "ticket": 9 }
            ]
        }))
        .unwrap();
        let planned = intents.planned_transactions().unwrap();
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].ticket, None);
        assert_eq!(planned[1].ticket, Some(9));
        assert_eq!(intents.outer_account().unwrap().to_address(), address(1));
    }

    #[test]
    fn networked_plan_output_omits_codec_dependent_fields() {
        let out = PlanOutput::new(planned_batch(), None).unwrap();
        assert_eq!(out.fee, 50);
        assert_eq!(out.required_signers.len(), 1);
        assert_eq!(out.required_signers[0].to_address(), address(2));

        let printed = serde_json::to_value(&out).unwrap();
        assert!(printed.get("transaction_ids").is_none());
        assert!(printed.get("inner_preimage").is_none());
        assert!(printed.get("codec").is_none());
        assert_eq!(printed["envelope"]["NetworkID"], json!(21336));
    }

    #[test]
    fn offline_codec_output_is_labelled() {
        let plan = planned_batch();
        let codec = SortedJsonCodec::with_definitions(plan.definitions.clone());
        let out = PlanOutput::new(plan, Some(&codec)).unwrap();

        let printed = serde_json::to_value(&out).unwrap();
        assert_eq!(printed["codec"], json!(OFFLINE_CODEC_LABEL));
        assert_eq!(printed["transaction_ids"].as_array().map(Vec::len), Some(2));
        let preimage = printed["inner_preimage"].as_str().unwrap();
        assert!(preimage.starts_with("42434800"));
    }
}
