//! Network type definitions, as published by a node's `server_definitions`
//! method.
//!
//! Canonical encoding depends on these tables (field codes, type codes,
//! transaction type codes). A response with some sections missing would let
//! an encoder fall back to stale built-in tables and silently produce bytes
//! the network hashes differently, so [`NetworkDefinitions::from_json`]
//! rejects the whole response if any required section is absent.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::codec::CodecError;

/// Sections every definitions response must carry.
pub const REQUIRED_SECTIONS: [&str; 5] = [
    "TYPES",
    "FIELDS",
    "TRANSACTION_TYPES",
    "LEDGER_ENTRY_TYPES",
    "TRANSACTION_RESULTS",
];

/// Validated network definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkDefinitions {
    types: BTreeMap<String, i64>,
    fields: Vec<Value>,
    transaction_types: BTreeMap<String, i64>,
    ledger_entry_types: BTreeMap<String, i64>,
    transaction_results: BTreeMap<String, i64>,
    hash: Option<String>,
}

impl NetworkDefinitions {
    /// Validate a `server_definitions` result object.
    ///
    /// Every section in [`REQUIRED_SECTIONS`] must be present, non-null and of
    /// the expected shape. All offending sections are reported at once.
    pub fn from_json(value: &Value) -> Result<Self, CodecError> {
        let obj = value.as_object().ok_or_else(|| CodecError::IncompleteNetworkDefinitions {
            missing: REQUIRED_SECTIONS.iter().map(|s| s.to_string()).collect(),
        })?;

        let mut missing = Vec::new();
        let types = code_table(obj, "TYPES", &mut missing);
        let transaction_types = code_table(obj, "TRANSACTION_TYPES", &mut missing);
        let ledger_entry_types = code_table(obj, "LEDGER_ENTRY_TYPES", &mut missing);
        let transaction_results = code_table(obj, "TRANSACTION_RESULTS", &mut missing);
        let fields = match obj.get("FIELDS").and_then(Value::as_array) {
            Some(fields) if !fields.is_empty() => fields.clone(),
            _ => {
                missing.push("FIELDS".to_string());
                Vec::new()
            }
        };

        if !missing.is_empty() {
            // Report in canonical order regardless of which check ran first.
            missing.sort_by_key(|name| {
                REQUIRED_SECTIONS
                    .iter()
                    .position(|s| s == name)
                    .unwrap_or(REQUIRED_SECTIONS.len())
            });
            return Err(CodecError::IncompleteNetworkDefinitions { missing });
        }

        Ok(Self {
            types,
            fields,
            transaction_types,
            ledger_entry_types,
            transaction_results,
            hash: obj.get("hash").and_then(Value::as_str).map(str::to_string),
        })
    }

    /// Parse and validate a definitions document from its JSON text.
    pub fn from_json_str(s: &str) -> Result<Self, CodecError> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| CodecError::Malformed(e.to_string()))?;
        Self::from_json(&value)
    }

    /// Numeric code of a transaction type, if the network knows it.
    pub fn transaction_type_code(&self, name: &str) -> Option<i64> {
        self.transaction_types.get(name).copied()
    }

    pub fn knows_transaction_type(&self, name: &str) -> bool {
        self.transaction_types.contains_key(name)
    }

    pub fn type_code(&self, name: &str) -> Option<i64> {
        self.types.get(name).copied()
    }

    pub fn ledger_entry_type_code(&self, name: &str) -> Option<i64> {
        self.ledger_entry_types.get(name).copied()
    }

    pub fn transaction_result_code(&self, name: &str) -> Option<i64> {
        self.transaction_results.get(name).copied()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Definitions hash reported by the node, when present.
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }
}

/// Read a `{ name: code }` section. Records the section as missing when it is
/// absent, null, empty or not a map of integers.
fn code_table(
    obj: &Map<String, Value>,
    section: &str,
    missing: &mut Vec<String>,
) -> BTreeMap<String, i64> {
    let section_map = obj.get(section).and_then(Value::as_object);
    let table = section_map.and_then(|map| {
        map.iter()
            .map(|(k, v)| v.as_i64().map(|code| (k.clone(), code)))
            .collect::<Option<BTreeMap<_, _>>>()
    });

    match table {
        Some(table) if !table.is_empty() => table,
        _ => {
            missing.push(section.to_string());
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_definitions_json() -> Value {
    serde_json::json!({
        "TYPES": {
            "UInt16": 1, "UInt32": 2, "Amount": 6, "Blob": 7, "AccountID": 8,
            "STObject": 14, "STArray": 15
        },
        "FIELDS": [
            ["TransactionType", {
                "nth": 2, "isVLEncoded": false, "isSerialized": true,
                "isSigningField": true, "type": "UInt16"
            }],
            ["Flags", {
                "nth": 2, "isVLEncoded": false, "isSerialized": true,
                "isSigningField": true, "type": "UInt32"
            }],
            ["TxnSignature", {
                "nth": 4, "isVLEncoded": true, "isSerialized": true,
                "isSigningField": false, "type": "Blob"
            }]
        ],
        "TRANSACTION_TYPES": {
            "Invalid": -1, "Payment": 0, "NFTokenMint": 25, "NFTokenCreateOffer": 27,
            "NFTokenAcceptOffer": 29, "Batch": 71
        },
        "LEDGER_ENTRY_TYPES": { "AccountRoot": 97, "NFTokenOffer": 55 },
        "TRANSACTION_RESULTS": { "tesSUCCESS": 0, "tecUNFUNDED": 101 },
        "hash": "ABC123"
    })
}
