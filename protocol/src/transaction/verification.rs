//! Independent verification of a finished batch envelope.
//!
//! Works from the envelope's JSON alone: the inner preimage is rebuilt from
//! `Flags` and the ordered `RawTransactions`, not taken from whoever built
//! the batch. A verifier therefore catches any tampering with flags, order,
//! or transaction contents after signing.
//!
//! The checks, in order:
//!
//! 1. **Structure** — `Flags`, `Account`, non-empty `RawTransactions`.
//! 2. **Transaction IDs** — re-derived through the codec.
//! 3. **Signer coverage** — every contributing account signed exactly once,
//!    nobody else did.
//! 4. **Inner signatures** — each against the rebuilt preimage.
//! 5. **Outer signature** — over the signing encoding of the whole envelope.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::envelope::SignerEntry;
use super::error::BatchError;
use super::signing::{inner_digest_preimage, outer_signing_preimage, TransactionId};
use crate::crypto::{transaction_id, PublicKey, Signature};
use crate::identity::AccountId;
use crate::wire::CanonicalCodec;

/// Result of checking one signer entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignerCheck {
    pub account: AccountId,
    /// The public key hashes to `account`.
    pub key_matches_account: bool,
    /// The signature verifies against the rebuilt inner preimage.
    pub signature_valid: bool,
}

impl SignerCheck {
    pub fn is_valid(&self) -> bool {
        self.key_matches_account && self.signature_valid
    }
}

/// Outcome of [`verify_batch_signatures`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Re-derived inner transaction IDs, uppercase hex, envelope order.
    pub transaction_ids: Vec<String>,
    pub signers: Vec<SignerCheck>,
    /// Contributing accounts with no signer entry.
    pub missing_signers: Vec<AccountId>,
    /// Signer entries for the outer account, non-contributing accounts, or
    /// repeated accounts.
    pub unexpected_signers: Vec<AccountId>,
    pub outer_signature_valid: bool,
}

impl VerificationReport {
    /// Everything checks out.
    pub fn is_valid(&self) -> bool {
        self.outer_signature_valid
            && self.missing_signers.is_empty()
            && self.unexpected_signers.is_empty()
            && self.signers.iter().all(SignerCheck::is_valid)
    }
}

/// Verify one signer entry against flags and an ordered ID list.
pub fn verify_inner_signature(
    flags: u32,
    transaction_ids: &[TransactionId],
    entry: &SignerEntry,
) -> bool {
    let preimage = inner_digest_preimage(flags, transaction_ids);
    entry.public_key.verify(&preimage, &entry.signature)
}

/// Verify every signature on a batch envelope in JSON form.
///
/// Structural problems (missing fields, undecodable accounts or keys) are
/// errors; signature failures are reported in the returned
/// [`VerificationReport`].
pub fn verify_batch_signatures(
    envelope: &Value,
    codec: &dyn CanonicalCodec,
) -> Result<VerificationReport, BatchError> {
    let obj = envelope
        .as_object()
        .ok_or_else(|| malformed("envelope must be a JSON object"))?;

    let flags = obj
        .get("Flags")
        .and_then(Value::as_u64)
        .and_then(|f| u32::try_from(f).ok())
        .ok_or_else(|| malformed("envelope Flags missing or not a u32"))?;
    let outer = AccountId::parse(str_field(obj, "Account")?)?;

    // 1-2. Inner transactions and their IDs.
    let raws = obj
        .get("RawTransactions")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("envelope RawTransactions missing"))?;
    if raws.is_empty() {
        return Err(BatchError::EmptyBatch);
    }

    let mut transaction_ids = Vec::with_capacity(raws.len());
    let mut contributing: Vec<AccountId> = Vec::new();
    for wrapper in raws {
        let inner = wrapper
            .get("RawTransaction")
            .filter(|v| v.is_object())
            .ok_or_else(|| malformed("RawTransactions entry is not a RawTransaction object"))?;
        transaction_ids.push(transaction_id(&codec.encode(inner)?));

        let account = inner
            .get("Account")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("inner transaction missing Account"))?;
        let account = AccountId::parse(account)?;
        if account != outer && !contributing.contains(&account) {
            contributing.push(account);
        }
    }

    // 3-4. Signer coverage and inner signatures.
    let entries = match obj.get("BatchSigners") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(SignerEntry::from_json)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(malformed("BatchSigners must be an array")),
    };

    let preimage = inner_digest_preimage(flags, &transaction_ids);
    let mut seen: Vec<AccountId> = Vec::new();
    let mut unexpected = Vec::new();
    let mut signers = Vec::with_capacity(entries.len());
    for entry in &entries {
        if !contributing.contains(&entry.account) || seen.contains(&entry.account) {
            unexpected.push(entry.account);
        }
        seen.push(entry.account);

        signers.push(SignerCheck {
            account: entry.account,
            key_matches_account: AccountId::from_public_key(&entry.public_key) == entry.account,
            signature_valid: entry.public_key.verify(&preimage, &entry.signature),
        });
    }
    let missing_signers: Vec<AccountId> = contributing
        .iter()
        .filter(|acct| !seen.contains(acct))
        .copied()
        .collect();

    // 5. Outer signature.
    let outer_signature_valid = verify_outer_signature(obj, envelope, &outer, codec)?;

    let report = VerificationReport {
        transaction_ids: transaction_ids.iter().map(hex::encode_upper).collect(),
        signers,
        missing_signers,
        unexpected_signers: unexpected,
        outer_signature_valid,
    };

    debug!(
        outer = %outer,
        transactions = report.transaction_ids.len(),
        signers = report.signers.len(),
        valid = report.is_valid(),
        "batch verified"
    );
    Ok(report)
}

fn verify_outer_signature(
    obj: &Map<String, Value>,
    envelope: &Value,
    outer: &AccountId,
    codec: &dyn CanonicalCodec,
) -> Result<bool, BatchError> {
    let key_hex = optional_str(obj, "SigningPubKey");
    let sig_hex = optional_str(obj, "TxnSignature");
    if key_hex.is_empty() || sig_hex.is_empty() {
        return Ok(false);
    }

    let public_key = PublicKey::from_hex(key_hex)?;
    let signature = Signature::from_hex(sig_hex)?;
    if &AccountId::from_public_key(&public_key) != outer {
        return Ok(false);
    }

    let preimage = outer_signing_preimage(envelope, codec)?;
    Ok(public_key.verify(&preimage, &signature))
}

fn str_field<'a>(obj: &'a Map<String, Value>, name: &str) -> Result<&'a str, BatchError> {
    obj.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(&format!("envelope {} missing", name)))
}

/// An absent or non-string field reads as empty.
fn optional_str<'a>(obj: &'a Map<String, Value>, name: &str) -> &'a str {
    obj.get(name).and_then(Value::as_str).unwrap_or("")
}

fn malformed(msg: &str) -> BatchError {
    BatchError::MalformedTransaction(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatchConfig, TF_INDEPENDENT};
    use crate::crypto::KeyPair;
    use crate::transaction::envelope::EnvelopeBuilder;
    use crate::transaction::signing::FinalizedBatch;
    use crate::transaction::types::{ExecutionMode, InnerTransaction, SequenceRef};
    use crate::wire::SortedJsonCodec;
    use serde_json::json;

    fn key(seed: u8) -> (KeyPair, AccountId) {
        let kp = KeyPair::from_ed25519_secret(&[seed; 32]);
        let account = AccountId::from_public_key(&kp.public_key());
        (kp, account)
    }

    fn finalized() -> FinalizedBatch {
        let codec = SortedJsonCodec::new();
        let (ok, o) = key(1);
        let (bk, b) = key(2);
        let mut builder = EnvelopeBuilder::new(
            &BatchConfig::default(),
            o,
            ExecutionMode::AllOrNothing.into(),
            SequenceRef::Plain(20),
        );
        builder
            .append(InnerTransaction::payment(o, b, 100), SequenceRef::Plain(21))
            .unwrap();
        builder
            .append(InnerTransaction::payment(b, o, 50), SequenceRef::Plain(3))
            .unwrap();
        builder.compute_fee(10);
        let mut batch = builder.assemble(&codec).unwrap();
        batch.sign_inner(&bk).unwrap();
        batch.finalize(&ok, &codec).unwrap()
    }

    #[test]
    fn valid_envelope_passes() {
        let codec = SortedJsonCodec::new();
        let batch = finalized();
        let report = verify_batch_signatures(&batch.to_json(), &codec).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.signers.len(), 1);
        assert_eq!(report.transaction_ids.len(), 2);
        assert_eq!(
            report.transaction_ids[0],
            hex::encode_upper(batch.transaction_ids()[0])
        );
    }

    #[test]
    fn test_flag_mutation_breaks_inner_and_outer() {
        let codec = SortedJsonCodec::new();
        let mut json = finalized().to_json();
        json["Flags"] = json!(TF_INDEPENDENT);

        let report = verify_batch_signatures(&json, &codec).unwrap();
        assert!(!report.signers[0].signature_valid);
        assert!(!report.outer_signature_valid);
        assert!(!report.is_valid());
    }

    #[test]
    fn reordering_breaks_inner_signatures() {
        let codec = SortedJsonCodec::new();
        let mut json = finalized().to_json();
        json["RawTransactions"].as_array_mut().unwrap().reverse();

        let report = verify_batch_signatures(&json, &codec).unwrap();
        assert!(!report.signers[0].signature_valid);
    }

    #[test]
    fn inner_content_tampering_detected() {
        let codec = SortedJsonCodec::new();
        let mut json = finalized().to_json();
        json["RawTransactions"][1]["RawTransaction"]["Amount"] = json!("5000000");
        let report = verify_batch_signatures(&json, &codec).unwrap();
        assert!(!report.signers[0].signature_valid);
    }

    #[test]
    fn unsigned_envelope_reports_missing() {
        let codec = SortedJsonCodec::new();
        let mut json = finalized().to_json();
        let obj = json.as_object_mut().unwrap();
        obj.remove("BatchSigners");
        obj.remove("TxnSignature");

        let report = verify_batch_signatures(&json, &codec).unwrap();
        assert_eq!(report.missing_signers.len(), 1);
        assert!(!report.outer_signature_valid);
    }

    #[test]
    fn duplicate_signer_flagged_unexpected() {
        let codec = SortedJsonCodec::new();
        let mut json = finalized().to_json();
        let dup = json["BatchSigners"][0].clone();
        json["BatchSigners"].as_array_mut().unwrap().push(dup);

        let report = verify_batch_signatures(&json, &codec).unwrap();
        assert_eq!(report.unexpected_signers.len(), 1);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_structural_errors() {
        let codec = SortedJsonCodec::new();
        assert!(verify_batch_signatures(&json!([]), &codec).is_err());

        let mut json = finalized().to_json();
        json["RawTransactions"] = json!([]);
        assert!(matches!(
            verify_batch_signatures(&json, &codec),
            Err(BatchError::EmptyBatch)
        ));

        let mut json = finalized().to_json();
        json.as_object_mut().unwrap().remove("Flags");
        assert!(matches!(
            verify_batch_signatures(&json, &codec),
            Err(BatchError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn verify_inner_signature_helper() {
        let batch = finalized();
        let entry = &batch.envelope().signers()[0];
        let flags = batch.envelope().flags().bits();
        assert!(verify_inner_signature(flags, batch.transaction_ids(), entry));
        assert!(!verify_inner_signature(flags ^ 1, batch.transaction_ids(), entry));
    }
}
