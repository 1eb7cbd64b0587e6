//! The canonical encoding contract and an offline implementation of it.
//!
//! The batch core never serializes transactions itself. It asks a
//! [`CanonicalCodec`] for bytes at exactly three points:
//!
//! 1. `encode(inner)` once per wrapped transaction, to derive its ID.
//! 2. `encode_for_signing(envelope)` once, for the outer signature preimage.
//! 3. `encode(envelope)` once, for the final wire blob.
//!
//! Codecs return raw field bytes. Hash prefixes (`TXN\0`, `STX\0`) are added
//! by the caller, never by the codec.

use serde_json::{Map, Value};
use thiserror::Error;

use super::definitions::NetworkDefinitions;

/// Errors raised while encoding or decoding transactions.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The definitions response lacked required sections. Nothing encoded
    /// under partial definitions can be trusted, so the response is refused.
    #[error("network definitions incomplete; missing sections: {}", missing.join(", "))]
    IncompleteNetworkDefinitions { missing: Vec<String> },

    #[error("transaction type '{0}' is not known to the loaded network definitions")]
    UnknownTransactionType(String),

    #[error("malformed transaction: {0}")]
    Malformed(String),
}

/// Deterministic transaction serialization.
///
/// Implementations must be pure: the same JSON value always yields the same
/// bytes. `Send + Sync` so one codec can serve concurrent signers.
pub trait CanonicalCodec: Send + Sync {
    /// Full canonical encoding, including signature fields.
    fn encode(&self, tx: &Value) -> Result<Vec<u8>, CodecError>;

    /// Encoding used as the single-signature preimage: everything except the
    /// top-level `TxnSignature`.
    fn encode_for_signing(&self, tx: &Value) -> Result<Vec<u8>, CodecError>;

    /// Inverse of [`encode`](Self::encode).
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

// ---------------------------------------------------------------------------
// SortedJsonCodec
// ---------------------------------------------------------------------------

/// Offline codec: compact JSON with object keys sorted at every depth.
///
/// Deterministic and dependency-free, which makes it suitable for previews,
/// tests and benches. It is NOT the network's binary format; envelopes bound
/// for a real node must go through a binary codec implementing the same
/// trait.
///
/// When constructed with definitions, every `TransactionType` it sees (the
/// envelope's and each inner transaction's) must be known to them.
#[derive(Debug, Clone, Default)]
pub struct SortedJsonCodec {
    definitions: Option<NetworkDefinitions>,
}

impl SortedJsonCodec {
    /// Codec that accepts any transaction type.
    pub fn new() -> Self {
        Self { definitions: None }
    }

    /// Codec that validates transaction types against `definitions`.
    pub fn with_definitions(definitions: NetworkDefinitions) -> Self {
        Self {
            definitions: Some(definitions),
        }
    }

    pub fn definitions(&self) -> Option<&NetworkDefinitions> {
        self.definitions.as_ref()
    }

    fn check_types(&self, tx: &Map<String, Value>) -> Result<(), CodecError> {
        let Some(defs) = &self.definitions else {
            return Ok(());
        };

        let check = |obj: &Map<String, Value>| -> Result<(), CodecError> {
            let tx_type = obj
                .get("TransactionType")
                .and_then(Value::as_str)
                .ok_or_else(|| CodecError::Malformed("missing TransactionType".into()))?;
            if defs.knows_transaction_type(tx_type) {
                Ok(())
            } else {
                Err(CodecError::UnknownTransactionType(tx_type.to_string()))
            }
        };

        check(tx)?;
        if let Some(raw) = tx.get("RawTransactions").and_then(Value::as_array) {
            for wrapper in raw {
                if let Some(inner) = wrapper.get("RawTransaction").and_then(Value::as_object) {
                    check(inner)?;
                }
            }
        }
        Ok(())
    }

    fn encode_object(&self, tx: &Value, signing: bool) -> Result<Vec<u8>, CodecError> {
        let obj = tx
            .as_object()
            .ok_or_else(|| CodecError::Malformed("transaction must be a JSON object".into()))?;
        self.check_types(obj)?;

        let mut sorted = sort_keys(tx);
        if signing {
            if let Value::Object(map) = &mut sorted {
                map.remove("TxnSignature");
            }
        }
        serde_json::to_vec(&sorted).map_err(|e| CodecError::Malformed(e.to_string()))
    }
}

impl CanonicalCodec for SortedJsonCodec {
    fn encode(&self, tx: &Value) -> Result<Vec<u8>, CodecError> {
        self.encode_object(tx, false)
    }

    fn encode_for_signing(&self, tx: &Value) -> Result<Vec<u8>, CodecError> {
        self.encode_object(tx, true)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(CodecError::Malformed("transaction must be a JSON object".into()));
        }
        Ok(value)
    }
}

/// Rebuild `value` with object keys in lexicographic order at every depth.
/// Array order is preserved.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::definitions::sample_definitions_json;
    use serde_json::json;

    #[test]
    fn encoding_ignores_key_insertion_order() {
        let codec = SortedJsonCodec::new();
        let a = json!({
            "TransactionType": "Payment",
            "Amount": "10",
            "Nested": { "z": 1, "a": 2 }
        });
        let b = json!({
            "Nested": { "a": 2, "z": 1 },
            "Amount": "10",
            "TransactionType": "Payment"
        });
        assert_eq!(codec.encode(&a).unwrap(), codec.encode(&b).unwrap());
    }

    #[test]
    fn signing_form_drops_top_level_signature_only() {
        let codec = SortedJsonCodec::new();
        let tx = json!({
            "TransactionType": "Batch",
            "TxnSignature": "AA",
            "BatchSigners": [{ "BatchSigner": { "TxnSignature": "BB" } }]
        });
        let signing = String::from_utf8(codec.encode_for_signing(&tx).unwrap()).unwrap();
        assert!(!signing.contains("\"AA\""));
        assert!(signing.contains("\"BB\""));

        let full = String::from_utf8(codec.encode(&tx).unwrap()).unwrap();
        assert!(full.contains("\"AA\""));
    }

    #[test]
    fn test_unknown_transaction_type_rejected_with_definitions() {
        let defs = NetworkDefinitions::from_json(&sample_definitions_json()).unwrap();
        let codec = SortedJsonCodec::with_definitions(defs);

        assert!(codec.encode(&json!({ "TransactionType": "Payment" })).is_ok());
        assert!(matches!(
            codec.encode(&json!({ "TransactionType": "Teleport" })),
            Err(CodecError::UnknownTransactionType(t)) if t == "Teleport"
        ));

        let envelope = json!({
            "TransactionType": "Batch",
            "RawTransactions": [{ "RawTransaction": { "TransactionType": "Teleport" } }]
        });
        assert!(matches!(
            codec.encode(&envelope),
            Err(CodecError::UnknownTransactionType(_))
        ));
    }

    #[test]
    fn without_definitions_any_type_encodes() {
        let codec = SortedJsonCodec::new();
        assert!(codec.encode(&json!({ "TransactionType": "Teleport" })).is_ok());
    }

    #[test]
    fn non_object_rejected() {
        let codec = SortedJsonCodec::new();
        assert!(matches!(codec.encode(&json!([1, 2])), Err(CodecError::Malformed(_))));
        assert!(codec.decode(b"[1,2]").is_err());
    }

    #[test]
    fn decode_inverts_encode() {
        let codec = SortedJsonCodec::new();
        let tx = json!({ "TransactionType": "Payment", "Fee": "0", "Flags": 1073741824u32 });
        let bytes = codec.encode(&tx).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), tx);
    }

    #[test]
    fn incomplete_definitions_message_lists_sections() {
        let err = CodecError::IncompleteNetworkDefinitions {
            missing: vec!["TYPES".into(), "FIELDS".into()],
        };
        assert_eq!(
            err.to_string(),
            "network definitions incomplete; missing sections: TYPES, FIELDS"
        );
    }
}
