//! # Wallet Session
//!
//! Obtains a signer from an EIP-1193 provider. Only administrative writes need
//! one; voters go through the relayer and never connect a wallet.
//!
//! ```text
//! NoSigner ──connect()──► Connecting ──ok──► Connected { account, chain_id }
//!     ▲                        │
//!     └──────── error ─────────┘
//! ```

use super::chain_reader::ChainReader;
use crate::codec::parse_quantity;
use crate::domain::{ChainId, SyncResult, VoteSyncError};
use crate::ports::{RpcFailure, WalletProvider, USER_REJECTED_CODE};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Wallet connection state.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No signer obtained.
    #[default]
    NoSigner,
    /// `connect()` in progress.
    Connecting,
    /// Signer available.
    Connected {
        /// Authorized account.
        account: String,
        /// Chain the wallet is on.
        chain_id: ChainId,
    },
}

/// Chain parameters offered to `wallet_addEthereumChain`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkSpec {
    /// Required chain.
    pub chain_id: ChainId,
    /// Display name.
    pub chain_name: String,
    /// RPC endpoints.
    pub rpc_urls: Vec<String>,
    /// Native currency symbol.
    pub currency_symbol: String,
}

impl NetworkSpec {
    /// Network with an ETH-denominated native currency.
    pub fn new(chain_id: ChainId, chain_name: &str, rpc_url: &str) -> Self {
        Self {
            chain_id,
            chain_name: chain_name.to_string(),
            rpc_urls: vec![rpc_url.to_string()],
            currency_symbol: "ETH".to_string(),
        }
    }

    fn add_chain_params(&self) -> Value {
        json!([{
            "chainId": self.chain_id.to_hex(),
            "chainName": self.chain_name,
            "nativeCurrency": {
                "name": self.currency_symbol,
                "symbol": self.currency_symbol,
                "decimals": 18
            },
            "rpcUrls": self.rpc_urls,
        }])
    }
}

/// Map a provider failure, recognising user rejection.
pub(crate) fn wallet_failure(failure: RpcFailure) -> VoteSyncError {
    match failure {
        RpcFailure::Rpc { code, message } if code == USER_REJECTED_CODE => {
            VoteSyncError::UserRejected(message)
        }
        other => other.into(),
    }
}

/// Signer session over an optional wallet provider.
pub struct WalletSession {
    provider: Option<Arc<dyn WalletProvider>>,
    reader: Arc<ChainReader>,
    network: NetworkSpec,
    state: Mutex<SessionState>,
    connecting: tokio::sync::Mutex<()>,
}

impl WalletSession {
    /// Create a session. `provider` is `None` when no wallet is installed.
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        reader: Arc<ChainReader>,
        network: NetworkSpec,
    ) -> Self {
        Self {
            provider,
            reader,
            network,
            state: Mutex::new(SessionState::NoSigner),
            connecting: tokio::sync::Mutex::new(()),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// Connected account, if any.
    pub fn account(&self) -> Option<String> {
        match &*self.state.lock() {
            SessionState::Connected { account, .. } => Some(account.clone()),
            _ => None,
        }
    }

    /// Connect and return the authorized account.
    ///
    /// While connected, only the network and contract presence are checked
    /// again; accounts are not re-requested. A failed check drops the signer.
    pub async fn connect(&self) -> SyncResult<String> {
        let _serialized = self.connecting.lock().await;
        let provider = self
            .provider
            .clone()
            .ok_or(VoteSyncError::NoWalletAvailable)?;

        if let Some(account) = self.account() {
            return match self.revalidate(provider.as_ref()).await {
                Ok(()) => Ok(account),
                Err(e) => {
                    warn!(error = %e, "[vote-sync] wallet session no longer valid");
                    *self.state.lock() = SessionState::NoSigner;
                    Err(e)
                }
            };
        }

        *self.state.lock() = SessionState::Connecting;
        match self.handshake(provider.as_ref()).await {
            Ok(account) => {
                info!(account = %account, chain_id = %self.network.chain_id, "[vote-sync] wallet connected");
                *self.state.lock() = SessionState::Connected {
                    account: account.clone(),
                    chain_id: self.network.chain_id,
                };
                Ok(account)
            }
            Err(e) => {
                warn!(error = %e, "[vote-sync] wallet connection failed");
                *self.state.lock() = SessionState::NoSigner;
                Err(e)
            }
        }
    }

    /// Drop the signer.
    pub fn disconnect(&self) {
        *self.state.lock() = SessionState::NoSigner;
    }

    /// Provider and account for a signed write; `NotConnected` otherwise.
    pub fn signer(&self) -> SyncResult<(Arc<dyn WalletProvider>, String)> {
        let account = self.account().ok_or(VoteSyncError::NotConnected)?;
        let provider = self.provider.clone().ok_or(VoteSyncError::NotConnected)?;
        Ok((provider, account))
    }

    async fn handshake(&self, provider: &dyn WalletProvider) -> SyncResult<String> {
        self.ensure_network(provider).await?;

        let accounts = provider
            .request("eth_requestAccounts", json!([]))
            .await
            .map_err(wallet_failure)?;
        let account = accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .ok_or_else(|| VoteSyncError::UserRejected("no account authorized".to_string()))?
            .to_string();

        self.reader.ensure_contract().await?;
        Ok(account)
    }

    async fn revalidate(&self, provider: &dyn WalletProvider) -> SyncResult<()> {
        self.ensure_network(provider).await?;
        self.reader.ensure_contract().await
    }

    async fn ensure_network(&self, provider: &dyn WalletProvider) -> SyncResult<()> {
        let current = provider
            .request("eth_chainId", json!([]))
            .await
            .map_err(wallet_failure)?;
        let current = current
            .as_str()
            .ok_or_else(|| VoteSyncError::MalformedResponse(format!("eth_chainId returned {current}")))?;
        if parse_quantity(current)? == self.network.chain_id.0 {
            return Ok(());
        }

        info!(from = current, to = %self.network.chain_id.to_hex(), "[vote-sync] switching wallet network");
        let switch = provider
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": self.network.chain_id.to_hex() }]),
            )
            .await;
        let Err(switch_error) = switch else {
            return Ok(());
        };

        warn!(error = %switch_error, "[vote-sync] switch failed, adding network");
        provider
            .request("wallet_addEthereumChain", self.network.add_chain_params())
            .await
            .map(|_| ())
            .map_err(|e| {
                VoteSyncError::WrongNetwork(format!(
                    "wallet is on {current}, expected {} ({e})",
                    self.network.chain_id.to_hex()
                ))
            })
    }
}
