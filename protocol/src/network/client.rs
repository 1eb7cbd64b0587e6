//! The ledger client contract.
//!
//! Everything the batch workflow needs from a node, and nothing more:
//! fee and sequence lookups, the network ID, type definitions, submission.
//! The protocol core never calls a node directly; it goes through
//! [`LedgerClient`], which keeps the core testable against an in-memory
//! implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::identity::AccountId;
use crate::wire::{CodecError, NetworkDefinitions};

/// RPC error codes a busy or still-syncing node answers with. Read-only
/// lookups that fail with one of these are retried like transport errors.
const TRANSIENT_RPC_ERRORS: [&str; 5] =
    ["tooBusy", "noNetwork", "noCurrent", "noClosed", "slowDown"];

/// Engine result of an applied transaction.
pub const ENGINE_SUCCESS: &str = "tesSUCCESS";

/// Errors talking to a ledger node.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a usable HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with an RPC error object.
    #[error("rpc error {error}: {message}")]
    Rpc { error: String, message: String },

    /// The node answered, but not in the shape expected.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// `server_definitions` was missing required sections.
    #[error(transparent)]
    Definitions(#[from] CodecError),
}

impl ClientError {
    /// Whether retrying the same read-only request may succeed.
    ///
    /// Transport failures and the node-busy RPC errors in
    /// `TRANSIENT_RPC_ERRORS` are transient. Any other RPC error, a malformed
    /// response or incomplete definitions is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rpc { error, .. } => TRANSIENT_RPC_ERRORS.contains(&error.as_str()),
            Self::MalformedResponse(_) | Self::Definitions(_) => false,
        }
    }
}

/// What the node said about a submitted blob.
///
/// Returned verbatim; the batch core does not interpret engine results
/// beyond [`is_success`](Self::is_success).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub engine_result: String,
    pub engine_result_code: Option<i64>,
    pub engine_result_message: Option<String>,
    pub tx_hash: Option<String>,
    /// The complete `result` object as received.
    pub raw: Value,
}

impl SubmitResult {
    /// Parse a `submit` result object.
    pub fn from_result(result: &Value) -> Result<Self, ClientError> {
        let engine_result = result
            .get("engine_result")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ClientError::MalformedResponse("submit result lacks engine_result".into())
            })?
            .to_string();

        Ok(Self {
            engine_result,
            engine_result_code: result.get("engine_result_code").and_then(Value::as_i64),
            engine_result_message: result
                .get("engine_result_message")
                .and_then(Value::as_str)
                .map(str::to_string),
            tx_hash: result
                .get("tx_json")
                .and_then(|tx| tx.get("hash"))
                .and_then(Value::as_str)
                .map(str::to_string),
            raw: result.clone(),
        })
    }

    pub fn is_success(&self) -> bool {
        self.engine_result == ENGINE_SUCCESS
    }
}

/// A connection to a ledger node.
///
/// Lookups (`fetch_*`) are idempotent and may be retried. `submit` is not
/// retried by anything in this crate.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current open-ledger fee per transaction unit, in drops.
    async fn fetch_base_fee(&self) -> Result<u64, ClientError>;

    /// Next sequence number of `account`.
    async fn fetch_sequence(&self, account: &AccountId) -> Result<u32, ClientError>;

    /// The node's network ID. `None` on networks that do not report one.
    async fn fetch_network_id(&self) -> Result<Option<u32>, ClientError>;

    /// Validated type definitions.
    async fn fetch_definitions(&self) -> Result<NetworkDefinitions, ClientError>;

    /// Submit an uppercase-hex wire blob.
    async fn submit(&self, tx_blob: &str) -> Result<SubmitResult, ClientError>;

    /// Close the current ledger. Only standalone test nodes accept this.
    async fn ledger_accept(&self) -> Result<(), ClientError>;
}
