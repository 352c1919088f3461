//! # Inbound Ports
//!
//! What the sync layer offers to its consumers, and the listener trait
//! consumers implement to receive `VoteCast` notifications.

use crate::domain::{ConnectionState, SyncResult, TallySnapshot, TxHandle, VoteEvent};
use async_trait::async_trait;
use std::future::Future;
use tokio::sync::mpsc;

/// Vote sync API - inbound port.
#[async_trait]
pub trait VoteSyncApi: Send + Sync {
    /// Reload election id, candidates and metadata into the store.
    async fn reload(&self) -> SyncResult<TallySnapshot>;

    /// Fetch a fresh proof and submit a vote through the relayer.
    async fn cast_vote(
        &self,
        dni: &str,
        fingerprint: &str,
        candidate_id: u64,
    ) -> SyncResult<TxHandle>;

    /// Current tally projection.
    fn snapshot(&self) -> TallySnapshot;

    /// Transport currently feeding events.
    fn connection_state(&self) -> ConnectionState;
}

/// Receiver of decoded `VoteCast` events.
///
/// Invocations never overlap: the next event is delivered only after the
/// previous `on_vote` future has completed.
#[async_trait]
pub trait VoteListener: Send + Sync {
    /// Handle one event.
    async fn on_vote(&self, event: VoteEvent);
}

/// Adapts an async closure into a [`VoteListener`].
pub struct FnListener<F>(pub F);

#[async_trait]
impl<F, Fut> VoteListener for FnListener<F>
where
    F: Fn(VoteEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn on_vote(&self, event: VoteEvent) {
        (self.0)(event).await
    }
}

/// Forward events into a channel; a closed receiver drops them silently.
#[async_trait]
impl VoteListener for mpsc::UnboundedSender<VoteEvent> {
    async fn on_vote(&self, event: VoteEvent) {
        let _ = self.send(event);
    }
}
