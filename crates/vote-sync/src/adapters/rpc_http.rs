//! JSON-RPC client for the ledger node over HTTP.

use crate::ports::{LedgerTransport, RpcFailure};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

/// JSON-RPC request structure.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// JSON-RPC response structure. A `null` result is a valid answer.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error structure.
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// RPC client for the ledger node.
pub struct HttpRpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    request_id: AtomicU64,
}

impl HttpRpcClient {
    /// Create a new RPC client with the default 10 s timeout.
    pub fn new(rpc_url: impl Into<String>) -> Result<Self, RpcFailure> {
        Self::with_timeout(rpc_url, Duration::from_secs(10))
    }

    /// Create a new RPC client with a custom timeout.
    pub fn with_timeout(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, RpcFailure> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            rpc_url: rpc_url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    /// Make a JSON-RPC call.
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        trace!(method, id, "[vote-sync] rpc request");

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;

        let rpc_response: JsonRpcResponse = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                RpcFailure::Decode(e.to_string())
            } else {
                RpcFailure::Transport(format!("HTTP {status}: {text}"))
            }
        })?;

        if let Some(error) = rpc_response.error {
            return Err(RpcFailure::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(rpc_response.result)
    }
}

#[async_trait]
impl LedgerTransport for HttpRpcClient {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        self.call(method, params).await
    }

    fn endpoint(&self) -> &str {
        &self.rpc_url
    }
}
