//! # Vote Sync
//!
//! Chain-state synchronization and submission-gateway client for elections
//! recorded on an EVM ledger and relayed on behalf of voters.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Keep a consistent, low-latency projection of on-chain election state while
//! votes are submitted through a relayer:
//! - Contract reads (election id, candidates, tallies) over JSON-RPC
//! - `VoteCast` events over a websocket subscription, with polling fallback
//! - Proof-gated vote submission (registry proof, relayer transaction)
//! - Race-free reconciliation of events into one tally store
//!
//! ## Consistency Rules
//!
//! | Rule | Description |
//! |------|-------------|
//! | Absolute totals | Events carry the post-vote total; applying one is a set, never an increment |
//! | Election epoch | Events for another election id are dropped until the next reload |
//! | Serialized delivery | One listener, invoked strictly one event at a time |
//! | Contract presence | Every read checks the contract still has code |
//!
//! ## Module Structure
//!
//! ```text
//! vote-sync/
//! ├── domain/          # Candidate, VoteEvent, Proof, VoteStateStore, errors
//! ├── codec/           # Strict ABI encoding/decoding for the voting contract
//! ├── ports/           # Listener trait (inbound) + transport traits (outbound)
//! ├── adapters/        # JSON-RPC over HTTP/WS, registry and relayer clients
//! ├── application/     # ChainReader, EventStream, WalletSession, SyncLayer
//! └── config.rs        # SyncConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod application;
pub mod codec;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{HttpRpcClient, RegistryClient, RelayerGateway, RpcWallet, WsLogSubscriber};
pub use application::{
    AdminWriter, ChainReader, EventStream, NetworkSpec, SessionState, StreamSettings, SyncLayer,
    SyncParts, VoteSubscription, WalletSession,
};
pub use config::{ConfigError, SyncConfig};
pub use domain::{
    ApplyOutcome, Candidate, CandidateMeta, ChainId, ConnectionState, Election, ErrorKind,
    MetaMap, OnChainVote, Proof, RootSync, TallySnapshot, TxHandle, ViewGuard, VoteEvent,
    VotePage, VoteQuery, VoteStateStore, VoteSyncError,
};
pub use ports::{
    FnListener, LedgerTransport, LogFeed, LogFilter, LogSubscriber, MockLogSubscriber, MockRpc,
    RpcFailure, VoteListener, VoteSyncApi, WalletProvider,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
