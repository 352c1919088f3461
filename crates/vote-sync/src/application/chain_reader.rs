//! # Chain Reader
//!
//! Read-only contract calls. Every read first confirms the contract still has
//! code at the configured address, so a redeployed or reset node surfaces as
//! `Unavailable` instead of a confusing decode error.

use crate::codec::abi::{decode_hex, encode_hex};
use crate::codec::contract::{
    call_data, decode_candidate_return, decode_candidates_return, decode_uint_return,
    get_candidate_data, signatures,
};
use crate::domain::{Candidate, SyncResult, VoteSyncError};
use crate::ports::LedgerTransport;
use primitive_types::H160;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

/// Typed reads of the voting contract.
pub struct ChainReader {
    transport: Arc<dyn LedgerTransport>,
    contract: H160,
}

impl ChainReader {
    /// Create a reader for `contract` over `transport`.
    pub fn new(transport: Arc<dyn LedgerTransport>, contract: H160) -> Self {
        Self {
            transport,
            contract,
        }
    }

    /// Contract address.
    pub fn contract(&self) -> H160 {
        self.contract
    }

    fn address(&self) -> String {
        format!("{:?}", self.contract)
    }

    /// Fail with `Unavailable` when there is no code at the contract address.
    pub async fn ensure_contract(&self) -> SyncResult<()> {
        let address = self.address();
        let code = self
            .transport
            .request("eth_getCode", json!([address, "latest"]))
            .await?;
        let code = code.as_str().ok_or_else(|| {
            VoteSyncError::ProtocolMismatch(format!("eth_getCode returned {code}"))
        })?;
        if decode_hex(code)?.is_empty() {
            error!(
                contract = %address,
                endpoint = self.transport.endpoint(),
                "[vote-sync] no contract code at address"
            );
            return Err(VoteSyncError::Unavailable(format!(
                "no contract deployed at {address} on {}",
                self.transport.endpoint()
            )));
        }
        Ok(())
    }

    async fn call(&self, data: Vec<u8>) -> SyncResult<Vec<u8>> {
        self.ensure_contract().await?;
        let result = self
            .transport
            .request(
                "eth_call",
                json!([{ "to": self.address(), "data": encode_hex(&data) }, "latest"]),
            )
            .await?;
        match result {
            Value::String(hex) => Ok(decode_hex(&hex)?),
            other => Err(VoteSyncError::ProtocolMismatch(format!(
                "eth_call returned {other}"
            ))),
        }
    }

    /// `currentElectionId()`; `0` means no election has been created.
    pub async fn current_election_id(&self) -> SyncResult<u64> {
        let data = self.call(call_data(signatures::CURRENT_ELECTION_ID)).await?;
        let id = decode_uint_return(&data)?;
        debug!(election_id = id, "[vote-sync] current election");
        Ok(id)
    }

    /// `getCandidatesCount()` for the current election.
    pub async fn get_candidates_count(&self) -> SyncResult<u64> {
        let data = self.call(call_data(signatures::GET_CANDIDATES_COUNT)).await?;
        Ok(decode_uint_return(&data)?)
    }

    /// `getCandidate(index)`.
    pub async fn get_candidate(&self, index: u64) -> SyncResult<Candidate> {
        let data = self.call(get_candidate_data(index)).await?;
        Ok(decode_candidate_return(&data)?)
    }

    /// `getAllCandidates()`, in ledger order.
    pub async fn get_all_candidates(&self) -> SyncResult<Vec<Candidate>> {
        let data = self.call(call_data(signatures::GET_ALL_CANDIDATES)).await?;
        let candidates = decode_candidates_return(&data)?;
        debug!(count = candidates.len(), "[vote-sync] candidates loaded");
        Ok(candidates)
    }
}
