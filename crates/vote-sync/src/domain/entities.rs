//! # Domain Entities
//!
//! Election, candidate and vote types as seen by the client. JSON field names
//! follow the relayer and registry wire format (camelCase).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Candidate image URLs keyed by candidate id.
pub type MetaMap = BTreeMap<u64, String>;

/// A candidate of the current election.
///
/// `id` is stable for the lifetime of an election and `vote_count` never
/// decreases within it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Ledger-assigned candidate id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Cumulative votes.
    pub vote_count: u64,
    /// Image URI stored on-chain, if any.
    #[serde(default, rename = "imageURI", skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
}

impl Candidate {
    /// Create a candidate without an on-chain image.
    pub fn new(id: u64, name: impl Into<String>, vote_count: u64) -> Self {
        Self {
            id,
            name: name.into(),
            vote_count,
            image_uri: None,
        }
    }
}

/// Logical epoch boundary; reads for a superseded id are stale.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Election {
    /// Election id as returned by `currentElectionId()`.
    pub id: u64,
}

/// A `VoteCast` notification.
///
/// Carries the authoritative total after the vote, not a delta, so
/// re-applying it is harmless.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct VoteEvent {
    /// Election the vote belongs to.
    pub election_id: u64,
    /// Candidate that received the vote.
    pub candidate_id: u64,
    /// Candidate total after the vote.
    pub new_total: u64,
}

impl VoteEvent {
    /// Create a new event.
    pub fn new(election_id: u64, candidate_id: u64, new_total: u64) -> Self {
        Self {
            election_id,
            candidate_id,
            new_total,
        }
    }
}

/// Eligibility membership proof issued by the registry.
///
/// Opaque to this client: it is passed to the relayer untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    /// Election the proof was issued for.
    pub election_id: u64,
    /// Eligibility root the proof verifies against.
    pub root: String,
    /// Voter leaf.
    pub leaf: String,
    /// Sibling path, leaf to root.
    pub proof: Vec<String>,
}

/// Identifier of a relayed transaction. Acceptance only, not finality.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TxHandle {
    /// Transaction hash.
    pub tx_hash: String,
}

impl TxHandle {
    /// Wrap a transaction hash.
    pub fn new(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
        }
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tx_hash)
    }
}

/// Result of an administrative root sync.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RootSync {
    /// Root published on-chain.
    pub root: String,
    /// Transaction that published it.
    pub tx_hash: String,
}

/// Image metadata for one candidate, as stored by the relayer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMeta {
    /// Candidate id.
    pub candidate_id: u64,
    /// Image URL (may be empty).
    #[serde(default)]
    pub image_url: String,
}

/// One vote recorded on the ledger, as listed by the relayer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OnChainVote {
    /// Sequential vote id.
    pub id: u64,
    /// Candidate voted for.
    pub candidate_id: u64,
    /// Block timestamp in epoch seconds.
    pub timestamp: u64,
}

/// A page of votes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VotePage {
    /// Election listed.
    pub election_id: u64,
    /// Present when the listing was filtered by candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<u64>,
    /// Offset of the first item.
    pub start: u64,
    /// Page size requested.
    pub limit: u64,
    /// Total votes matching the query.
    pub total: u64,
    /// Votes in this page.
    #[serde(default)]
    pub items: Vec<OnChainVote>,
}

/// Query for the relayer's `/votes` listing; unset fields use relayer defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoteQuery {
    /// Election to list.
    pub election_id: Option<u64>,
    /// Offset.
    pub start: Option<u64>,
    /// Page size.
    pub limit: Option<u64>,
}

impl VoteQuery {
    /// Query a page of one election.
    pub fn page(election_id: u64, start: u64, limit: u64) -> Self {
        Self {
            election_id: Some(election_id),
            start: Some(start),
            limit: Some(limit),
        }
    }

    /// Query-string pairs for the set fields.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.election_id {
            pairs.push(("electionId", id.to_string()));
        }
        if let Some(start) = self.start {
            pairs.push(("start", start.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

/// EVM chain id.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl ChainId {
    /// `0x`-prefixed lowercase hex, as wallets expect it.
    pub fn to_hex(&self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport currently feeding the event stream.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Not started, or torn down.
    #[default]
    Disconnected,
    /// Websocket `eth_subscribe` is delivering logs.
    SubscribedLive,
    /// Logs are fetched by polling the HTTP transport.
    PollingFallback,
}
