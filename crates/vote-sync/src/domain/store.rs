//! # Vote State Store
//!
//! The single in-memory projection of election id, candidates with tallies
//! and candidate images. Two paths mutate it:
//!
//! - [`VoteStateStore::replace`]: a full reload snapshot
//! - [`VoteStateStore::apply`]: one `VoteCast` event
//!
//! The lock is never held across an `.await`.

use super::entities::{Candidate, MetaMap, VoteEvent};
use parking_lot::RwLock;
use serde::Serialize;

/// What [`VoteStateStore::apply`] did with an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Candidate total set to the event's `new_total`.
    Applied,
    /// Candidate already had exactly this total (replayed event).
    Unchanged,
    /// Event belongs to another election than the loaded one.
    StaleElection,
    /// No candidate with that id in the loaded snapshot.
    UnknownCandidate,
    /// Nothing has been loaded yet.
    NotLoaded,
}

#[derive(Debug, Default)]
struct TallyState {
    election_id: Option<u64>,
    candidates: Vec<Candidate>,
    images: MetaMap,
}

/// Authoritative tally projection shared by all UI consumers.
#[derive(Debug, Default)]
pub struct VoteStateStore {
    inner: RwLock<TallyState>,
}

impl VoteStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything with a fresh reload snapshot.
    ///
    /// Candidate order is kept exactly as the ledger returned it.
    pub fn replace(&self, election_id: u64, candidates: Vec<Candidate>, images: MetaMap) {
        let mut state = self.inner.write();
        state.election_id = Some(election_id);
        state.candidates = candidates;
        state.images = images;
        tracing::debug!(
            election_id,
            candidates = state.candidates.len(),
            "[vote-sync] store reloaded"
        );
    }

    /// Apply one event. Setting, not incrementing, makes replays no-ops.
    pub fn apply(&self, event: &VoteEvent) -> ApplyOutcome {
        let mut state = self.inner.write();
        let Some(current) = state.election_id else {
            return ApplyOutcome::NotLoaded;
        };
        if current != event.election_id {
            return ApplyOutcome::StaleElection;
        }
        let Some(candidate) = state
            .candidates
            .iter_mut()
            .find(|c| c.id == event.candidate_id)
        else {
            return ApplyOutcome::UnknownCandidate;
        };
        if candidate.vote_count == event.new_total {
            return ApplyOutcome::Unchanged;
        }
        candidate.vote_count = event.new_total;
        ApplyOutcome::Applied
    }

    /// Loaded election id, if any.
    pub fn election_id(&self) -> Option<u64> {
        self.inner.read().election_id
    }

    /// Whether a reload has completed at least once.
    pub fn is_loaded(&self) -> bool {
        self.inner.read().election_id.is_some()
    }

    /// Sum of all candidate tallies.
    pub fn total_votes(&self) -> u64 {
        sum_votes(&self.inner.read().candidates)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> TallySnapshot {
        let state = self.inner.read();
        TallySnapshot {
            election_id: state.election_id.unwrap_or(0),
            total_votes: sum_votes(&state.candidates),
            candidates: state.candidates.clone(),
            images: state.images.clone(),
        }
    }
}

fn sum_votes(candidates: &[Candidate]) -> u64 {
    candidates
        .iter()
        .fold(0u64, |acc, c| acc.saturating_add(c.vote_count))
}

/// Immutable view of the store handed to consumers.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TallySnapshot {
    /// Election id, `0` when nothing is loaded.
    pub election_id: u64,
    /// Candidates in ledger order.
    pub candidates: Vec<Candidate>,
    /// Relayer image metadata.
    pub images: MetaMap,
    /// Sum of all tallies.
    pub total_votes: u64,
}

impl TallySnapshot {
    /// Candidate by id.
    pub fn candidate(&self, id: u64) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    /// Share of the total in percent; `0.0` when nobody has voted.
    pub fn share(&self, id: u64) -> Option<f64> {
        let candidate = self.candidate(id)?;
        if self.total_votes == 0 {
            return Some(0.0);
        }
        Some(candidate.vote_count as f64 * 100.0 / self.total_votes as f64)
    }

    /// Image for a candidate: relayer metadata first, then the on-chain URI.
    pub fn image_for(&self, id: u64) -> Option<&str> {
        self.images
            .get(&id)
            .map(String::as_str)
            .filter(|url| !url.is_empty())
            .or_else(|| self.candidate(id).and_then(|c| c.image_uri.as_deref()))
    }
}
