//! Voting contract interface.
//!
//! Calldata builders and strict return-data decoders for the functions the
//! client calls, plus `VoteCast` log decoding. The contract's `Candidate`
//! struct is `(uint256 id, string name, uint256 voteCount, string imageURI)`.

use super::abi::{
    decode_hex, encode_call, encode_hex, encode_tokens, keccak256, parse_quantity, uint_word,
    AbiError, AbiReader, Token, WORD,
};
use crate::domain::{Candidate, VoteEvent};
use primitive_types::{H256, U256};
use serde::{Deserialize, Serialize};

/// Canonical signatures.
pub mod signatures {
    /// `currentElectionId() returns (uint256)`
    pub const CURRENT_ELECTION_ID: &str = "currentElectionId()";
    /// `getCandidatesCount() returns (uint256)`
    pub const GET_CANDIDATES_COUNT: &str = "getCandidatesCount()";
    /// `getCandidate(uint256) returns (Candidate)`
    pub const GET_CANDIDATE: &str = "getCandidate(uint256)";
    /// `getAllCandidates() returns (Candidate[])`
    pub const GET_ALL_CANDIDATES: &str = "getAllCandidates()";
    /// `createElection(string)`
    pub const CREATE_ELECTION: &str = "createElection(string)";
    /// `addCandidate(uint256,string)`
    pub const ADD_CANDIDATE: &str = "addCandidate(uint256,string)";
    /// `closeCurrentElection()`
    pub const CLOSE_CURRENT_ELECTION: &str = "closeCurrentElection()";
    /// `event VoteCast(uint256 electionId, uint256 candidateId, uint256 newTotal)`
    pub const VOTE_CAST: &str = "VoteCast(uint256,uint256,uint256)";
}

/// topic0 of the `VoteCast` event.
pub fn vote_cast_topic() -> H256 {
    H256::from(keccak256(signatures::VOTE_CAST.as_bytes()))
}

/// Calldata for a zero-argument view function.
pub fn call_data(signature: &str) -> Vec<u8> {
    encode_call(signature, &[])
}

/// Calldata for `getCandidate(index)`.
pub fn get_candidate_data(index: u64) -> Vec<u8> {
    encode_call(signatures::GET_CANDIDATE, &[Token::from(index)])
}

/// Decode a single static `uint256` return value.
pub fn decode_uint_return(data: &[u8]) -> Result<u64, AbiError> {
    if data.len() != WORD {
        return Err(AbiError::Shape(format!(
            "expected one uint256 word, got {} bytes",
            data.len()
        )));
    }
    AbiReader::new(data).u64(0)
}

/// Decode a `Candidate` struct return value.
pub fn decode_candidate_return(data: &[u8]) -> Result<Candidate, AbiError> {
    let tuple = AbiReader::new(data).tail(0)?;
    read_candidate(&tuple)
}

/// Decode a `Candidate[]` return value, preserving ledger order.
pub fn decode_candidates_return(data: &[u8]) -> Result<Vec<Candidate>, AbiError> {
    let (len, elements) = AbiReader::new(data).array(0)?;
    (0..len)
        .map(|i| read_candidate(&elements.tail(i)?))
        .collect()
}

fn read_candidate(tuple: &AbiReader<'_>) -> Result<Candidate, AbiError> {
    let image = tuple.string(3)?;
    Ok(Candidate {
        id: tuple.u64(0)?,
        name: tuple.string(1)?,
        vote_count: tuple.u64(2)?,
        image_uri: if image.is_empty() { None } else { Some(image) },
    })
}

fn candidate_tuple(c: &Candidate) -> Vec<u8> {
    encode_tokens(&[
        Token::from(c.id),
        Token::Str(c.name.clone()),
        Token::from(c.vote_count),
        Token::Str(c.image_uri.clone().unwrap_or_default()),
    ])
}

/// Encode a `Candidate` exactly as `getCandidate` returns it.
pub fn encode_candidate_return(c: &Candidate) -> Vec<u8> {
    let mut out = uint_word(U256::from(WORD)).to_vec();
    out.extend(candidate_tuple(c));
    out
}

/// Encode a `Candidate[]` exactly as `getAllCandidates` returns it.
pub fn encode_candidates_return(candidates: &[Candidate]) -> Vec<u8> {
    let tuples: Vec<Vec<u8>> = candidates.iter().map(candidate_tuple).collect();
    let mut out = uint_word(U256::from(WORD)).to_vec();
    out.extend_from_slice(&uint_word(U256::from(tuples.len())));
    let mut offset = tuples.len() * WORD;
    for t in &tuples {
        out.extend_from_slice(&uint_word(U256::from(offset)));
        offset += t.len();
    }
    for t in tuples {
        out.extend(t);
    }
    out
}

/// Identity of a log for deduplication.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LogId {
    /// Emitting transaction.
    pub tx_hash: String,
    /// Position in the block.
    pub log_index: u64,
}

/// Log object as returned by `eth_getLogs` and `eth_subscribe("logs")`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    /// Emitting contract.
    #[serde(default)]
    pub address: String,
    /// topic0 is the event signature, followed by indexed arguments.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Non-indexed arguments.
    #[serde(default)]
    pub data: String,
    /// Block of inclusion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,
    /// Emitting transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    /// Position in the block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<String>,
    /// Set when the log was dropped by a reorg.
    #[serde(default)]
    pub removed: bool,
}

impl RpcLog {
    /// Dedup identity; `None` for pending logs.
    pub fn id(&self) -> Option<LogId> {
        let tx_hash = self.transaction_hash.clone()?;
        let log_index = parse_quantity(self.log_index.as_deref()?).ok()?;
        Some(LogId { tx_hash, log_index })
    }

    /// Build a `VoteCast` log with the election and candidate ids indexed.
    pub fn vote_cast(event: &VoteEvent, tx_hash: &str, log_index: u64) -> Self {
        Self {
            address: String::new(),
            topics: vec![
                format!("{:?}", vote_cast_topic()),
                encode_hex(&uint_word(U256::from(event.election_id))),
                encode_hex(&uint_word(U256::from(event.candidate_id))),
            ],
            data: encode_hex(&uint_word(U256::from(event.new_total))),
            block_number: None,
            transaction_hash: Some(tx_hash.to_string()),
            log_index: Some(format!("0x{:x}", log_index)),
            removed: false,
        }
    }
}

/// Decode `(electionId, candidateId, newTotal)` from a `VoteCast` log.
///
/// Indexed arguments come from topics, the rest from data words, in that order.
pub fn decode_vote_cast(log: &RpcLog) -> Result<VoteEvent, AbiError> {
    let (topic0, indexed) = log
        .topics
        .split_first()
        .ok_or_else(|| AbiError::Shape("log has no topics".to_string()))?;
    let expected = format!("{:?}", vote_cast_topic());
    if !topic0.eq_ignore_ascii_case(&expected) {
        return Err(AbiError::Shape(format!("not a VoteCast log: {topic0}")));
    }

    let mut words = Vec::with_capacity(3 * WORD);
    for topic in indexed {
        let bytes = decode_hex(topic)?;
        if bytes.len() != WORD {
            return Err(AbiError::Shape(format!("topic is {} bytes", bytes.len())));
        }
        words.extend(bytes);
    }
    words.extend(decode_hex(&log.data)?);
    if words.len() != 3 * WORD {
        return Err(AbiError::Shape(format!(
            "VoteCast carries {} bytes of arguments, expected {}",
            words.len(),
            3 * WORD
        )));
    }

    let reader = AbiReader::new(&words);
    Ok(VoteEvent {
        election_id: reader.u64(0)?,
        candidate_id: reader.u64(1)?,
        new_total: reader.u64(2)?,
    })
}
