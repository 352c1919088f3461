//! # Relayer Gateway
//!
//! HTTP client for the relayer that submits votes on the voter's behalf and
//! serves candidate metadata and vote listings.
//!
//! A returned [`TxHandle`] means the relayer accepted the vote and broadcast a
//! transaction. It does not mean the transaction was mined: the tally only
//! changes once the matching `VoteCast` event arrives.

use super::http::{expect_success, read_json, HttpClient, HttpClientBuilder};
use crate::domain::{
    CandidateMeta, MetaMap, Proof, RootSync, SyncResult, TxHandle, VotePage, VoteQuery,
    VoteSyncError,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoteRequest<'a> {
    candidate_id: u64,
    #[serde(flatten)]
    proof: &'a Proof,
}

#[derive(Serialize)]
struct SimpleVoteRequest<'a> {
    dni: &'a str,
    fingerprint: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxResponse {
    #[serde(default)]
    tx_hash: Option<String>,
}

#[derive(Deserialize)]
struct MetaResponse {
    #[serde(default)]
    items: Vec<CandidateMeta>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetaUpdate<'a> {
    election_id: u64,
    items: &'a [CandidateMeta],
}

/// Relayer HTTP client.
#[derive(Debug, Clone)]
pub struct RelayerGateway {
    client: HttpClient,
}

impl RelayerGateway {
    /// Create a client for the relayer at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let client = HttpClientBuilder::new(base_url)?
            .timeout(timeout)
            .default_headers()
            .build()?;
        Ok(Self { client })
    }

    /// Submit a proof-gated vote.
    pub async fn submit_vote(&self, candidate_id: u64, proof: &Proof) -> SyncResult<TxHandle> {
        debug!(
            candidate_id,
            election_id = proof.election_id,
            "[vote-sync] submitting vote"
        );
        let response = self
            .client
            .post("vote", Some(&VoteRequest { candidate_id, proof }))
            .await?;
        let handle = tx_handle(read_json(response, VoteSyncError::Rejected).await?)?;
        info!(tx_hash = %handle, candidate_id, "[vote-sync] vote accepted by relayer");
        Ok(handle)
    }

    /// Submit a vote with raw credentials; the relayer fetches the proof itself.
    pub async fn submit_vote_simple(
        &self,
        candidate_id: u64,
        dni: &str,
        fingerprint: &str,
    ) -> SyncResult<TxHandle> {
        let response = self
            .client
            .post(
                &format!("vote/{candidate_id}"),
                Some(&SimpleVoteRequest { dni, fingerprint }),
            )
            .await?;
        tx_handle(read_json(response, VoteSyncError::Rejected).await?)
    }

    /// Ask the relayer to publish the registry's current root on-chain.
    pub async fn sync_root_from_registry(&self) -> SyncResult<RootSync> {
        let response = self.client.post::<()>("admin/sync-root", None).await?;
        let sync: RootSync = read_json(response, VoteSyncError::Rejected).await?;
        info!(root = %sync.root, tx_hash = %sync.tx_hash, "[vote-sync] root synced");
        Ok(sync)
    }

    /// Candidate images for an election.
    ///
    /// Election `0` means none is open and is answered locally. A non-2xx
    /// answer is `Rejected` carrying the body text.
    pub async fn get_candidate_meta(&self, election_id: u64) -> SyncResult<MetaMap> {
        if election_id == 0 {
            return Ok(MetaMap::new());
        }
        let response = self
            .client
            .get("candidate-meta", &[("electionId", election_id.to_string())])
            .await?;
        let meta: MetaResponse = read_json(response, VoteSyncError::Rejected).await?;
        Ok(meta
            .items
            .into_iter()
            .map(|item| (item.candidate_id, item.image_url))
            .collect())
    }

    /// Replace the candidate images of an election.
    pub async fn save_candidate_meta(
        &self,
        election_id: u64,
        items: &[CandidateMeta],
    ) -> SyncResult<()> {
        let response = self
            .client
            .put("candidate-meta", &MetaUpdate { election_id, items })
            .await?;
        expect_success(response, VoteSyncError::Rejected).await
    }

    /// A page of recorded votes.
    pub async fn list_votes(&self, query: VoteQuery) -> SyncResult<VotePage> {
        let response = self.client.get("votes", &query.to_pairs()).await?;
        read_json(response, VoteSyncError::Rejected).await
    }

    /// A page of recorded votes for one candidate.
    pub async fn list_votes_by_candidate(
        &self,
        election_id: u64,
        candidate_id: u64,
        start: u64,
        limit: u64,
    ) -> SyncResult<VotePage> {
        let query = [
            ("electionId", election_id.to_string()),
            ("candidateId", candidate_id.to_string()),
            ("start", start.to_string()),
            ("limit", limit.to_string()),
        ];
        let response = self.client.get("votes/by-candidate", &query).await?;
        read_json(response, VoteSyncError::Rejected).await
    }

    // Administrative operations whose effect lives in the contract and the
    // relayer's operator tooling. They are typed here but issue no request.

    /// Register a voting center.
    pub async fn register_center(&self, center_id: u64, name: &str) -> SyncResult<TxHandle> {
        unsupported("register_center", &[&center_id, &name])
    }

    /// Grant or revoke a center administrator.
    pub async fn set_center_admin(
        &self,
        center_id: u64,
        admin: &str,
        allowed: bool,
    ) -> SyncResult<TxHandle> {
        unsupported("set_center_admin", &[&center_id, &admin, &allowed])
    }

    /// Set the eligibility root of one polling table.
    pub async fn set_center_mesa_root(
        &self,
        center_id: u64,
        mesa_id: u64,
        root: &str,
    ) -> SyncResult<TxHandle> {
        unsupported("set_center_mesa_root", &[&center_id, &mesa_id, &root])
    }

    /// Compute the eligibility root of one polling table.
    pub async fn calc_root(&self, center_id: u64, mesa_id: u64) -> SyncResult<String> {
        unsupported("calc_root", &[&center_id, &mesa_id])
    }

    /// Open a voting center.
    pub async fn open_center(&self, center_id: u64) -> SyncResult<TxHandle> {
        unsupported("open_center", &[&center_id])
    }

    /// Close a voting center.
    pub async fn close_center(&self, center_id: u64) -> SyncResult<TxHandle> {
        unsupported("close_center", &[&center_id])
    }

    /// Start a new election, optionally replacing the candidate list.
    pub async fn start_election(
        &self,
        candidates: &[String],
        replace_candidates: bool,
    ) -> SyncResult<TxHandle> {
        unsupported("start_election", &[&candidates, &replace_candidates])
    }

    /// Remove every candidate of the current election.
    pub async fn clear_candidates(&self) -> SyncResult<TxHandle> {
        unsupported("clear_candidates", &[])
    }
}

fn unsupported<T>(operation: &'static str, args: &[&dyn std::fmt::Debug]) -> SyncResult<T> {
    warn!(operation, ?args, "[vote-sync] operation not available in this client");
    Err(VoteSyncError::Unsupported(operation))
}

fn tx_handle(response: TxResponse) -> SyncResult<TxHandle> {
    match response.tx_hash {
        Some(hash) if !hash.is_empty() => Ok(TxHandle::new(hash)),
        _ => Err(VoteSyncError::Rejected(
            "relayer returned no transaction hash".to_string(),
        )),
    }
}
