//! Node-managed wallet.
//!
//! Development nodes (Hardhat, Anvil) hold unlocked accounts and sign
//! `eth_sendTransaction` themselves. [`RpcWallet`] presents such a node as an
//! EIP-1193 provider so the CLI can drive signed writes without a browser
//! wallet.

use super::rpc_http::HttpRpcClient;
use crate::ports::{LedgerTransport, RpcFailure, WalletProvider, UNRECOGNIZED_CHAIN_CODE};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// EIP-1193 code for a method the provider does not support.
const UNSUPPORTED_METHOD_CODE: i64 = 4200;

/// EIP-1193 provider backed by a node's unlocked accounts.
pub struct RpcWallet {
    rpc: HttpRpcClient,
}

impl RpcWallet {
    /// Wrap a JSON-RPC client.
    pub fn new(rpc: HttpRpcClient) -> Self {
        Self { rpc }
    }

    async fn switch_chain(&self, params: Value) -> Result<Value, RpcFailure> {
        let requested = params
            .get(0)
            .and_then(|p| p.get("chainId"))
            .and_then(Value::as_str)
            .map(str::to_lowercase)
            .ok_or_else(|| RpcFailure::Decode("missing chainId".to_string()))?;
        let current = self.rpc.request("eth_chainId", Value::Array(vec![])).await?;
        if current.as_str().map(str::to_lowercase).as_deref() == Some(requested.as_str()) {
            Ok(Value::Null)
        } else {
            Err(RpcFailure::Rpc {
                code: UNRECOGNIZED_CHAIN_CODE,
                message: format!("node is not on chain {requested}"),
            })
        }
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        debug!(method, "[vote-sync] wallet request");
        match method {
            "eth_requestAccounts" => self.rpc.request("eth_accounts", params).await,
            "wallet_switchEthereumChain" => self.switch_chain(params).await,
            "wallet_addEthereumChain" => Err(RpcFailure::Rpc {
                code: UNSUPPORTED_METHOD_CODE,
                message: "a node-managed wallet cannot add chains".to_string(),
            }),
            _ => self.rpc.request(method, params).await,
        }
    }
}
