//! RPC request handlers.
//!
//! Every ledger action goes through `POST /` as `{"action": .., ..params}`.
//! Success is `{"result": ..}`. Failure carries the ledger error itself
//! (`error` + `detail`) plus its `kind` and a readable `message`, so a
//! remote client can rebuild the exact error.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info_span, Instrument};

use bounty_ledger::{BountyLedger, ErrorKind, LedgerError, TxRequest};
use bounty_types::{BountyId, Identity, TxHash};

use crate::LedgerService;

// ── Requests ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RpcRequest {
    NumBounties,
    GetBounty { id: BountyId },
    GetFulfillments { id: BountyId },
    Submit { request: TxRequest },
    TransactionStatus { hash: TxHash },
    BalanceOf { account: Identity },
}

impl RpcRequest {
    pub fn action(&self) -> &'static str {
        match self {
            Self::NumBounties => "num_bounties",
            Self::GetBounty { .. } => "get_bounty",
            Self::GetFulfillments { .. } => "get_fulfillments",
            Self::Submit { .. } => "submit",
            Self::TransactionStatus { .. } => "transaction_status",
            Self::BalanceOf { .. } => "balance_of",
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────

/// A ledger error on its way back to the caller.
pub struct ApiError(pub LedgerError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Connectivity => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::StateConflict => StatusCode::CONFLICT,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        let mut body = serde_json::to_value(&self.0).unwrap_or_else(|_| json!({ "error": "internal" }));
        if let Some(fields) = body.as_object_mut() {
            fields.insert("kind".into(), json!(self.0.kind()));
            fields.insert("message".into(), json!(self.0.to_string()));
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

/// Metrics label for bodies that do not parse as a request.
const MALFORMED_ACTION: &str = "malformed";

pub async fn rpc(State(service): State<Arc<LedgerService>>, body: Bytes) -> Response {
    let started = Instant::now();
    let (action, result) = match serde_json::from_slice::<RpcRequest>(&body) {
        Ok(request) => {
            let action = request.action();
            let result = dispatch(&service, request)
                .instrument(info_span!("rpc", action))
                .await;
            (action, result)
        }
        Err(e) => (
            MALFORMED_ACTION,
            Err(LedgerError::InvalidRequest(format!("malformed request: {e}"))),
        ),
    };

    if let Some(metrics) = service.metrics() {
        metrics.requests.with_label_values(&[action]).inc();
        metrics
            .request_latency_ms
            .observe(started.elapsed().as_secs_f64() * 1_000.0);
    }

    match result {
        Ok(result) => Json(json!({ "result": result })).into_response(),
        Err(error) => {
            debug!(action, %error, "rpc error");
            record_error(&service, &error);
            ApiError(error).into_response()
        }
    }
}

async fn dispatch(service: &LedgerService, request: RpcRequest) -> Result<Value, LedgerError> {
    match request {
        RpcRequest::NumBounties => to_value(service.num_bounties().await?),
        RpcRequest::GetBounty { id } => to_value(service.get_bounty(id).await?),
        RpcRequest::GetFulfillments { id } => to_value(service.get_fulfillments(id).await?),
        RpcRequest::Submit { request } => to_value(service.submit(request).await?),
        RpcRequest::TransactionStatus { hash } => {
            to_value(service.transaction_status(hash).await?)
        }
        RpcRequest::BalanceOf { account } => to_value(service.balance_of(account).await?),
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, LedgerError> {
    serde_json::to_value(value).map_err(|e| LedgerError::Internal(e.to_string()))
}

fn record_error(service: &LedgerService, error: &LedgerError) {
    if let Some(metrics) = service.metrics() {
        let kind = serde_json::to_value(error.kind())
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "other".into());
        metrics.request_errors.with_label_values(&[kind.as_str()]).inc();
    }
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn metrics(State(service): State<Arc<LedgerService>>) -> Response {
    let Some(metrics) = service.metrics() else {
        return (StatusCode::NOT_FOUND, "metrics disabled").into_response();
    };
    match metrics.encode() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
