//! # JSON-RPC Ledger Client
//!
//! [`LedgerClient`] over a node's HTTP JSON-RPC endpoint.
//!
//! ## Method Index
//!
//! | Method               | Used for                                   |
//! |----------------------|--------------------------------------------|
//! | `fee`                | `drops.open_ledger_fee`                    |
//! | `account_info`       | `account_data.Sequence`                    |
//! | `server_info`        | `info.network_id`                          |
//! | `server_definitions` | encoding tables (validated, all-or-nothing)|
//! | `submit`             | `engine_result` of a signed blob           |
//! | `ledger_accept`      | closing a ledger on standalone nodes       |
//!
//! Requests use the node's native envelope, `{"method": m, "params": [p]}`.
//! Failures come back inside `result` with `status: "error"`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::client::{ClientError, LedgerClient, SubmitResult};
use crate::identity::AccountId;
use crate::wire::NetworkDefinitions;

/// Per-request timeout of the default HTTP client.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Ledger client over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    url: String,
    http: Client,
}

impl JsonRpcClient {
    /// Client with a default HTTP configuration.
    pub fn new(url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self::with_client(url, http))
    }

    /// Client reusing an existing `reqwest::Client`.
    pub fn with_client(url: impl Into<String>, http: Client) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one RPC call and return its `result` object.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        debug!(method, url = %self.url, "rpc request");

        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "method": method, "params": [params] }))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!("HTTP {} from {}", status, method)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;
        extract_result(body)
    }
}

/// Pull `result` out of a response body, mapping error results.
pub(crate) fn extract_result(mut body: Value) -> Result<Value, ClientError> {
    let result = body
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| ClientError::MalformedResponse("response has no result".into()))?;

    if result.get("status").and_then(Value::as_str) == Some("error") {
        let error = result
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let message = result
            .get("error_message")
            .or_else(|| result.get("error_exception"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ClientError::Rpc { error, message });
    }
    Ok(result)
}

fn parse_base_fee(result: &Value) -> Result<u64, ClientError> {
    result
        .get("drops")
        .and_then(|d| d.get("open_ledger_fee"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| {
            ClientError::MalformedResponse("fee result lacks drops.open_ledger_fee".into())
        })
}

fn parse_sequence(result: &Value) -> Result<u32, ClientError> {
    result
        .get("account_data")
        .and_then(|d| d.get("Sequence"))
        .and_then(Value::as_u64)
        .and_then(|s| u32::try_from(s).ok())
        .ok_or_else(|| {
            ClientError::MalformedResponse("account_info result lacks account_data.Sequence".into())
        })
}

fn parse_network_id(result: &Value) -> Result<Option<u32>, ClientError> {
    match result.get("info").and_then(|i| i.get("network_id")) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .map(Some)
            .ok_or_else(|| ClientError::MalformedResponse(format!("invalid network_id {}", v))),
    }
}

#[async_trait]
impl LedgerClient for JsonRpcClient {
    async fn fetch_base_fee(&self) -> Result<u64, ClientError> {
        parse_base_fee(&self.call("fee", json!({})).await?)
    }

    async fn fetch_sequence(&self, account: &AccountId) -> Result<u32, ClientError> {
        let result = self
            .call(
                "account_info",
                json!({ "account": account.to_address(), "ledger_index": "current" }),
            )
            .await?;
        parse_sequence(&result)
    }

    async fn fetch_network_id(&self) -> Result<Option<u32>, ClientError> {
        parse_network_id(&self.call("server_info", json!({})).await?)
    }

    async fn fetch_definitions(&self) -> Result<NetworkDefinitions, ClientError> {
        let result = self.call("server_definitions", json!({})).await?;
        Ok(NetworkDefinitions::from_json(&result)?)
    }

    async fn submit(&self, tx_blob: &str) -> Result<SubmitResult, ClientError> {
        let result = self.call("submit", json!({ "tx_blob": tx_blob })).await?;
        let submitted = SubmitResult::from_result(&result)?;
        info!(
            engine_result = %submitted.engine_result,
            tx_hash = submitted.tx_hash.as_deref().unwrap_or("-"),
            "blob submitted"
        );
        Ok(submitted)
    }

    async fn ledger_accept(&self) -> Result<(), ClientError> {
        self.call("ledger_accept", json!({})).await?;
        Ok(())
    }
}
