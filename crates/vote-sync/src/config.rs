//! # Sync Configuration
//!
//! Endpoints and tuning for the sync layer. Defaults target a local Hardhat
//! node with the relayer and registry on their usual development ports.

use crate::application::{NetworkSpec, StreamSettings};
use crate::domain::{ChainId, VoteSyncError};
use primitive_types::H160;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// First contract address Hardhat assigns on a fresh node.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

/// Hardhat's chain id (0x7a69).
pub const DEFAULT_CHAIN_ID: u64 = 31337;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A URL field does not parse or has the wrong scheme.
    #[error("Invalid {field}: {value}")]
    InvalidUrl {
        /// Field name
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// Contract address is not 20 bytes of `0x`-prefixed hex.
    #[error("Invalid contract address: {0}")]
    InvalidAddress(String),

    /// An environment variable does not parse.
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
    },

    /// A duration or size that must be positive is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl From<ConfigError> for VoteSyncError {
    fn from(err: ConfigError) -> Self {
        VoteSyncError::Unavailable(format!("invalid configuration: {err}"))
    }
}

/// Sync layer configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Ledger JSON-RPC over HTTP.
    pub rpc_url: String,

    /// Ledger JSON-RPC over websocket. Empty disables the realtime transport.
    pub ws_url: String,

    /// Relayer base URL.
    pub relayer_url: String,

    /// Registry base URL.
    pub registry_url: String,

    /// Voting contract address.
    pub contract_address: String,

    /// Chain the wallet must be on.
    pub chain_id: u64,

    /// Chain name offered to wallets that do not know the chain.
    pub chain_name: String,

    /// Polling interval when no realtime transport is available.
    pub poll_interval_ms: u64,

    /// HTTP request timeout.
    pub request_timeout_secs: u64,

    /// How long to wait for a signed write to be mined.
    pub receipt_timeout_secs: u64,

    /// Number of recent log ids remembered for deduplication.
    pub dedup_window: usize,

    /// Bound on the websocket connect + subscribe handshake.
    pub ws_handshake_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            ws_url: "ws://127.0.0.1:8545".to_string(),
            relayer_url: "http://localhost:3000".to_string(),
            registry_url: "http://localhost:4000".to_string(),
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            chain_name: "Hardhat (localhost)".to_string(),
            poll_interval_ms: 1000,
            request_timeout_secs: 10,
            receipt_timeout_secs: 60,
            dedup_window: 1024,
            ws_handshake_timeout_ms: 3000,
        }
    }
}

impl SyncConfig {
    /// Create a config for testing (polling only, short timeouts).
    pub fn for_testing() -> Self {
        Self {
            ws_url: String::new(),
            poll_interval_ms: 50,
            request_timeout_secs: 2,
            receipt_timeout_secs: 2,
            dedup_window: 64,
            ws_handshake_timeout_ms: 200,
            ..Self::default()
        }
    }

    /// Defaults overridden by `VOTE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `VOTE_*` name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = lookup("VOTE_RPC_URL") {
            config.rpc_url = v;
        }
        if let Some(v) = lookup("VOTE_WS_URL") {
            config.ws_url = v;
        }
        if let Some(v) = lookup("VOTE_RELAYER_URL") {
            config.relayer_url = v;
        }
        if let Some(v) = lookup("VOTE_REGISTRY_URL") {
            config.registry_url = v;
        }
        if let Some(v) = lookup("VOTE_CONTRACT_ADDRESS") {
            config.contract_address = v;
        }
        if let Some(v) = lookup("VOTE_CHAIN_ID") {
            config.chain_id = parse_env("VOTE_CHAIN_ID", &v)?;
        }
        if let Some(v) = lookup("VOTE_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_env("VOTE_POLL_INTERVAL_MS", &v)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check every field before any connection is attempted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("rpc_url", &self.rpc_url, &["http", "https"])?;
        if !self.ws_url.is_empty() {
            check_url("ws_url", &self.ws_url, &["ws", "wss"])?;
        }
        check_url("relayer_url", &self.relayer_url, &["http", "https"])?;
        check_url("registry_url", &self.registry_url, &["http", "https"])?;
        self.contract()?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll_interval_ms"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Zero("request_timeout_secs"));
        }
        if self.dedup_window == 0 {
            return Err(ConfigError::Zero("dedup_window"));
        }
        Ok(())
    }

    /// Parsed contract address.
    pub fn contract(&self) -> Result<H160, ConfigError> {
        let invalid = || ConfigError::InvalidAddress(self.contract_address.clone());
        let digits = self.contract_address.strip_prefix("0x").ok_or_else(invalid)?;
        let bytes = hex::decode(digits).map_err(|_| invalid())?;
        if bytes.len() != 20 {
            return Err(invalid());
        }
        Ok(H160::from_slice(&bytes))
    }

    /// Whether a websocket endpoint is configured.
    pub fn realtime_enabled(&self) -> bool {
        !self.ws_url.is_empty()
    }

    /// HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Event stream settings derived from this config.
    pub fn stream_settings(&self) -> Result<StreamSettings, ConfigError> {
        Ok(StreamSettings {
            contract: self.contract()?,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            dedup_window: self.dedup_window,
        })
    }

    /// Network the wallet is asked to switch to or add.
    pub fn network(&self) -> NetworkSpec {
        NetworkSpec::new(ChainId(self.chain_id), &self.chain_name, &self.rpc_url)
    }
}

fn check_url(field: &'static str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    };
    let url = Url::parse(value).map_err(|_| invalid())?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid());
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}
