//! # Outbound Ports
//!
//! Traits for the ledger JSON-RPC transport, the realtime log subscription and
//! the EIP-1193 wallet provider, plus in-memory mocks for tests.

use crate::codec::abi::{encode_hex, selector};
use crate::codec::RpcLog;
use crate::domain::VoteSyncError;
use async_trait::async_trait;
use parking_lot::Mutex;
use primitive_types::{H160, H256};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// JSON-RPC error code for a request the user declined (EIP-1193).
pub const USER_REJECTED_CODE: i64 = 4001;

/// JSON-RPC error code for a chain the wallet does not know (EIP-3326).
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Failure of a single JSON-RPC request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcFailure {
    /// Connection, timeout or HTTP-level failure.
    #[error("transport: {0}")]
    Transport(String),

    /// The endpoint answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// The response envelope or result did not decode.
    #[error("decode: {0}")]
    Decode(String),
}

impl RpcFailure {
    /// JSON-RPC error code, if the endpoint returned one.
    pub fn code(&self) -> Option<i64> {
        match self {
            RpcFailure::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<RpcFailure> for VoteSyncError {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Decode(msg) => VoteSyncError::MalformedResponse(msg),
            other => VoteSyncError::Unavailable(other.to_string()),
        }
    }
}

/// Request/response JSON-RPC transport to the ledger - outbound port.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Send one request and return its `result`.
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcFailure>;

    /// Endpoint description for logs.
    fn endpoint(&self) -> &str;
}

/// EIP-1193 wallet provider - outbound port.
///
/// Holds the user's keys; every signed write goes through it.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Send one request to the provider.
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcFailure>;
}

/// Log filter for one event of one contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogFilter {
    /// Contract address.
    pub address: H160,
    /// Event signature topic.
    pub topic0: H256,
}

impl LogFilter {
    /// Filter object accepted by `eth_subscribe("logs")` and `eth_getLogs`.
    pub fn to_json(&self) -> Value {
        json!({
            "address": format!("{:?}", self.address),
            "topics": [format!("{:?}", self.topic0)],
        })
    }

    /// Filter object bounded to a block range.
    pub fn with_range(&self, from_block: u64, to_block: u64) -> Value {
        let mut filter = self.to_json();
        filter["fromBlock"] = json!(format!("0x{:x}", from_block));
        filter["toBlock"] = json!(format!("0x{:x}", to_block));
        filter
    }
}

/// A live log subscription.
///
/// The channel closes when the remote side drops the connection.
pub struct LogFeed {
    /// Matching logs in arrival order.
    pub logs: mpsc::UnboundedReceiver<RpcLog>,
    /// Reader task; aborted on teardown.
    pub task: Option<JoinHandle<()>>,
}

/// Realtime log subscription - outbound port.
#[async_trait]
pub trait LogSubscriber: Send + Sync {
    /// Establish the subscription. An error means the realtime transport is
    /// unavailable and the caller should fall back to polling.
    async fn subscribe_logs(&self, filter: LogFilter) -> Result<LogFeed, RpcFailure>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

type Reply = Result<Value, RpcFailure>;

/// Scripted JSON-RPC endpoint usable as both ledger transport and wallet.
///
/// Replies are looked up by method; `eth_call` replies are keyed by function
/// selector. One-shot replies are consumed first, then the sticky reply.
pub struct MockRpc {
    /// Endpoint name.
    pub id: String,
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    sticky: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl Default for MockRpc {
    fn default() -> Self {
        Self {
            id: "mock-rpc".to_string(),
            queued: Mutex::new(HashMap::new()),
            sticky: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockRpc {
    /// Empty mock; every method fails with "method not found".
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock with contract code deployed at every address.
    pub fn with_contract() -> Self {
        let mock = Self::new();
        mock.respond("eth_getCode", json!("0x6080604052"));
        mock
    }

    /// Sticky reply for `method`.
    pub fn respond(&self, method: &str, result: Value) {
        self.sticky.lock().insert(method.to_string(), Ok(result));
    }

    /// One-shot reply for `method`, consumed before the sticky one.
    pub fn respond_once(&self, method: &str, result: Value) {
        self.push(method.to_string(), Ok(result));
    }

    /// Sticky failure for `method`.
    pub fn fail(&self, method: &str, failure: RpcFailure) {
        self.sticky.lock().insert(method.to_string(), Err(failure));
    }

    /// One-shot failure for `method`.
    pub fn fail_once(&self, method: &str, failure: RpcFailure) {
        self.push(method.to_string(), Err(failure));
    }

    /// Sticky `eth_call` return data for a function signature.
    pub fn respond_call(&self, signature: &str, data: &[u8]) {
        self.sticky
            .lock()
            .insert(call_key(signature), Ok(json!(encode_hex(data))));
    }

    /// One-shot `eth_call` return data for a function signature.
    pub fn respond_call_once(&self, signature: &str, data: &[u8]) {
        self.push(call_key(signature), Ok(json!(encode_hex(data))));
    }

    /// Every request received, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    /// Method names received, in order.
    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    /// Number of requests for `method`.
    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }

    fn push(&self, key: String, reply: Reply) {
        self.queued.lock().entry(key).or_default().push_back(reply);
    }

    fn reply(&self, method: &str, params: Value) -> Reply {
        let mut keys = Vec::with_capacity(2);
        if method == "eth_call" {
            if let Some(sel) = called_selector(&params) {
                keys.push(format!("eth_call:{sel}"));
            }
        }
        keys.push(method.to_string());
        self.calls.lock().push((method.to_string(), params));

        for key in &keys {
            if let Some(reply) = self.queued.lock().get_mut(key).and_then(VecDeque::pop_front) {
                return reply;
            }
        }
        let sticky = self.sticky.lock();
        for key in &keys {
            if let Some(reply) = sticky.get(key) {
                return reply.clone();
            }
        }
        Err(RpcFailure::Rpc {
            code: -32601,
            message: format!("method not found: {method}"),
        })
    }
}

fn call_key(signature: &str) -> String {
    format!("eth_call:{}", encode_hex(&selector(signature)))
}

fn called_selector(params: &Value) -> Option<String> {
    let tx = params.get(0)?;
    let data = tx.get("data").or_else(|| tx.get("input"))?.as_str()?;
    data.get(..10).map(str::to_lowercase)
}

#[async_trait]
impl LedgerTransport for MockRpc {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        self.reply(method, params)
    }

    fn endpoint(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl WalletProvider for MockRpc {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        self.reply(method, params)
    }
}

/// Mock realtime transport.
///
/// Either refuses every subscription or hands out one pre-made feed.
#[derive(Default)]
pub struct MockLogSubscriber {
    feed: Mutex<Option<mpsc::UnboundedReceiver<RpcLog>>>,
    filters: Mutex<Vec<LogFilter>>,
}

impl MockLogSubscriber {
    /// Subscriber whose handshake always fails.
    pub fn refusing() -> Self {
        Self::default()
    }

    /// Subscriber with a live feed; push logs through the returned sender.
    pub fn channel() -> (Self, mpsc::UnboundedSender<RpcLog>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mock = Self {
            feed: Mutex::new(Some(rx)),
            filters: Mutex::new(Vec::new()),
        };
        (mock, tx)
    }

    /// Filters requested so far.
    pub fn filters(&self) -> Vec<LogFilter> {
        self.filters.lock().clone()
    }
}

#[async_trait]
impl LogSubscriber for MockLogSubscriber {
    async fn subscribe_logs(&self, filter: LogFilter) -> Result<LogFeed, RpcFailure> {
        self.filters.lock().push(filter);
        let logs = self
            .feed
            .lock()
            .take()
            .ok_or_else(|| RpcFailure::Transport("connection refused".to_string()))?;
        Ok(LogFeed { logs, task: None })
    }
}
