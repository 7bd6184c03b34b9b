//! JSON-RPC 2.0 ledger client

use super::{LedgerClient, OperationStatus};
use crate::operation::{OperationRef, SignedOperation};
use crate::types::{Address, LcId, LetterOfCredit};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error};

/// Node error code for a stale or out-of-order nonce
pub const SEQUENCE_COLLISION_CODE: i64 = -32010;

/// Node error code for a fee rate below the floor
pub const UNDERPRICED_CODE: i64 = -32011;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct CollisionData {
    signer: Address,
    offered: u64,
    expected: u64,
}

#[derive(Debug, Deserialize)]
struct UnderpricedData {
    offered: u64,
    minimum: u64,
}

impl RpcError {
    fn into_error(self) -> Error {
        match self.code {
            SEQUENCE_COLLISION_CODE => match serde_json::from_value::<CollisionData>(self.data) {
                Ok(data) => Error::SequenceCollision {
                    signer: data.signer,
                    offered: data.offered,
                    expected: data.expected,
                },
                Err(e) => Error::Decode(format!("Malformed collision data: {}", e)),
            },
            UNDERPRICED_CODE => match serde_json::from_value::<UnderpricedData>(self.data) {
                Ok(data) => Error::UnderpricedOperation {
                    offered: data.offered,
                    minimum: data.minimum,
                },
                Err(e) => Error::Decode(format!("Malformed underpriced data: {}", e)),
            },
            code => Error::Rejected(format!("{} (code {})", self.message, code)),
        }
    }
}

/// Ledger node reached over JSON-RPC
pub struct RpcLedgerClient {
    url: String,
    client: Client,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl std::fmt::Debug for RpcLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedgerClient")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl RpcLedgerClient {
    /// Create a client for the node at `url`
    pub fn new(url: &str, request_timeout: Duration, poll_interval: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.to_string(),
            client,
            poll_interval,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, id = request.id, "JSON-RPC call");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(method, "Ledger request failed: {}", e);
                Error::LedgerUnavailable(format!("{} request failed: {}", method, e))
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Error::LedgerUnavailable(format!(
                "{} failed with status {}",
                method, status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rejected(format!(
                "{} failed with status {}: {}",
                method, status, body
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("Invalid {} response: {}", method, e)))?;

        if let Some(rpc_error) = body.error {
            return Err(rpc_error.into_error());
        }

        serde_json::from_value(body.result)
            .map_err(|e| Error::Decode(format!("Unexpected {} result: {}", method, e)))
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn next_sequence_number(&self, signer: &Address) -> Result<u64> {
        self.call("lc_getNextSequence", json!([signer])).await
    }

    async fn current_fee_rate(&self) -> Result<u64> {
        self.call("lc_feeRate", json!([])).await
    }

    async fn submit_signed_operation(&self, operation: &SignedOperation) -> Result<OperationRef> {
        self.call("lc_submitOperation", json!([operation])).await
    }

    async fn operation_status(&self, reference: &OperationRef) -> Result<OperationStatus> {
        self.call("lc_getOperationStatus", json!([reference])).await
    }

    async fn query_state(&self, lc_id: LcId) -> Result<LetterOfCredit> {
        let lc: Option<LetterOfCredit> = self.call("lc_getLetterOfCredit", json!([lc_id])).await?;
        lc.ok_or_else(|| Error::NotFound(format!("LC {}", lc_id)))
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
