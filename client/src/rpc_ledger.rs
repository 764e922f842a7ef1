//! [`BountyLedger`] over the ledger service's JSON-RPC interface.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use bounty_ledger::{BountyLedger, LedgerError, TxRequest};
use bounty_types::{BountyId, Identity, RawBounty, RawFulfillment, TxHash, TxStatus, Wei};

// ── RpcLedger ──────────────────────────────────────────────────────────

/// HTTP client for a bounty ledger service.
///
/// Wraps `reqwest::Client` with the service URL. Every action posts
/// `{"action": .., ..params}` and reads `result`, or rebuilds the ledger's
/// own error from the `error`/`detail` pair.
#[derive(Clone)]
pub struct RpcLedger {
    http: reqwest::Client,
    endpoint: String,
}

impl RpcLedger {
    /// Create a client targeting `endpoint` (e.g. `http://127.0.0.1:7545`).
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| LedgerError::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a JSON-RPC request and return the `result` field.
    async fn rpc_call(&self, action: &str, params: Value) -> Result<Value, LedgerError> {
        let mut body = params;
        body.as_object_mut()
            .ok_or_else(|| LedgerError::InvalidRequest("params must be a JSON object".into()))?
            .insert("action".to_string(), json!(action));

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Connectivity(format!("{action}: {e}")))?;

        let status = response.status();
        let json: Value = match response.json().await {
            Ok(json) => json,
            Err(_) if status.is_server_error() => {
                return Err(LedgerError::Connectivity(format!(
                    "{action}: ledger returned HTTP {status}"
                )))
            }
            Err(e) => return Err(LedgerError::Decode(format!("{action}: invalid JSON response: {e}"))),
        };

        if json.get("error").is_some() {
            return Err(decode_error(json));
        }
        if !status.is_success() {
            return Err(LedgerError::Connectivity(format!(
                "{action}: ledger returned HTTP {status}"
            )));
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| LedgerError::Decode(format!("{action}: response has no result")))
    }

    async fn call<T: DeserializeOwned>(&self, action: &str, params: Value) -> Result<T, LedgerError> {
        let result = self.rpc_call(action, params).await?;
        serde_json::from_value(result)
            .map_err(|e| LedgerError::Decode(format!("invalid {action} response: {e}")))
    }
}

/// Rebuild a [`LedgerError`] from an error body, falling back to the message.
fn decode_error(body: Value) -> LedgerError {
    let message = body
        .get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("unknown ledger error")
        .to_string();
    serde_json::from_value(body).unwrap_or(LedgerError::Internal(message))
}

impl BountyLedger for RpcLedger {
    async fn num_bounties(&self) -> Result<u64, LedgerError> {
        self.call("num_bounties", json!({})).await
    }

    async fn get_bounty(&self, id: BountyId) -> Result<RawBounty, LedgerError> {
        self.call("get_bounty", json!({ "id": id })).await
    }

    async fn get_fulfillments(&self, id: BountyId) -> Result<Vec<RawFulfillment>, LedgerError> {
        self.call("get_fulfillments", json!({ "id": id })).await
    }

    async fn submit(&self, request: TxRequest) -> Result<TxHash, LedgerError> {
        self.call("submit", json!({ "request": request })).await
    }

    async fn transaction_status(&self, hash: TxHash) -> Result<TxStatus, LedgerError> {
        self.call("transaction_status", json!({ "hash": hash })).await
    }

    async fn balance_of(&self, account: Identity) -> Result<Wei, LedgerError> {
        self.call("balance_of", json!({ "account": account })).await
    }
}
