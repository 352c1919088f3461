//! # Event Stream
//!
//! Turns `VoteCast` logs into store updates and listener notifications.
//!
//! ## Transports
//!
//! At construction the stream tries the realtime subscription. If that fails
//! it polls `eth_blockNumber` / `eth_getLogs` at a fixed interval instead.
//! Both paths feed the same dispatcher, so listeners cannot tell them apart.
//! The choice is made once; a dropped websocket is logged and not retried.
//!
//! ## Delivery
//!
//! ```text
//! feed ──► skip removed ──► dedup (tx, index) ──► decode ──► store.apply ──► listener
//! ```
//!
//! One dispatcher task handles logs in arrival order. The listener is awaited
//! before the next log is processed, so invocations never overlap.

use crate::codec::{decode_vote_cast, parse_quantity, vote_cast_topic, LogId, RpcLog};
use crate::domain::{ConnectionState, VoteEvent, VoteStateStore};
use crate::ports::{LedgerTransport, LogFilter, LogSubscriber, RpcFailure, VoteListener};
use lru::LruCache;
use parking_lot::Mutex;
use primitive_types::H160;
use serde_json::json;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Event stream tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSettings {
    /// Voting contract.
    pub contract: H160,
    /// Polling interval in fallback mode.
    pub poll_interval: Duration,
    /// Number of recent log ids remembered for deduplication.
    pub dedup_window: usize,
}

impl StreamSettings {
    /// Defaults: 1 s polling, 1024-entry dedup window.
    pub fn new(contract: H160) -> Self {
        Self {
            contract,
            poll_interval: Duration::from_millis(1000),
            dedup_window: 1024,
        }
    }
}

struct ListenerSlot {
    id: u64,
    listener: Arc<dyn VoteListener>,
}

/// Single listener slot plus the lock held for the duration of a delivery.
struct Dispatch {
    slot: Mutex<Option<ListenerSlot>>,
    delivery: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
}

impl Dispatch {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            delivery: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    fn register(&self, listener: Arc<dyn VoteListener>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let replaced = self.slot.lock().replace(ListenerSlot { id, listener });
        if replaced.is_some() {
            debug!("[vote-sync] vote listener replaced");
        }
        id
    }

    /// Clear the slot if it still holds listener `id` (any listener for `None`).
    fn clear(&self, id: Option<u64>) {
        let mut slot = self.slot.lock();
        if id.is_none() || slot.as_ref().map(|s| s.id) == id {
            *slot = None;
        }
    }

    /// Wait for an in-flight delivery to finish.
    async fn flush(&self) {
        drop(self.delivery.lock().await);
    }

    async fn deliver(&self, event: VoteEvent) {
        let _in_flight = self.delivery.lock().await;
        let listener = self.slot.lock().as_ref().map(|s| s.listener.clone());
        if let Some(listener) = listener {
            listener.on_vote(event).await;
        }
    }
}

/// Handle for a registered vote listener.
///
/// Dropping the handle unregisters the listener without waiting for an
/// in-flight delivery; use [`VoteSubscription::unsubscribe`] to wait, or
/// [`VoteSubscription::detach`] to keep the listener registered.
#[must_use = "dropping the subscription unregisters the listener"]
pub struct VoteSubscription {
    id: u64,
    dispatch: Arc<Dispatch>,
    released: bool,
}

impl VoteSubscription {
    /// Registration id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Unregister and wait for any in-flight delivery to finish. After this
    /// returns the listener is never invoked again.
    ///
    /// Must not be awaited from inside the listener itself.
    pub async fn unsubscribe(mut self) {
        self.released = true;
        self.dispatch.clear(Some(self.id));
        self.dispatch.flush().await;
    }

    /// Keep the listener registered until replaced or `off_vote`.
    pub fn detach(mut self) {
        self.released = true;
    }
}

impl Drop for VoteSubscription {
    fn drop(&mut self) {
        if !self.released {
            self.dispatch.clear(Some(self.id));
        }
    }
}

/// `VoteCast` event source with realtime/polling transport selection.
pub struct EventStream {
    state: Mutex<ConnectionState>,
    dispatch: Arc<Dispatch>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EventStream {
    /// Start the stream. Every decoded event is applied to `store` before the
    /// listener sees it.
    pub async fn connect(
        settings: StreamSettings,
        transport: Arc<dyn LedgerTransport>,
        subscriber: Option<Arc<dyn LogSubscriber>>,
        store: Arc<VoteStateStore>,
    ) -> Self {
        let filter = LogFilter {
            address: settings.contract,
            topic0: vote_cast_topic(),
        };
        let mut tasks = Vec::new();

        let live = match subscriber {
            Some(subscriber) => match subscriber.subscribe_logs(filter).await {
                Ok(feed) => Some(feed),
                Err(e) => {
                    warn!(error = %e, "[vote-sync] realtime subscription failed, falling back to polling");
                    None
                }
            },
            None => None,
        };

        let (state, logs) = match live {
            Some(feed) => {
                tasks.extend(feed.task);
                (ConnectionState::SubscribedLive, feed.logs)
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                tasks.push(tokio::spawn(poll_logs(
                    transport,
                    filter,
                    settings.poll_interval,
                    tx,
                )));
                (ConnectionState::PollingFallback, rx)
            }
        };

        let dispatch = Arc::new(Dispatch::new());
        tasks.push(tokio::spawn(dispatch_loop(
            logs,
            store,
            dispatch.clone(),
            settings.dedup_window,
        )));

        info!(state = ?state, contract = ?settings.contract, "[vote-sync] event stream started");
        Self {
            state: Mutex::new(state),
            dispatch,
            tasks: Mutex::new(tasks),
        }
    }

    /// Current transport.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Register the vote listener, replacing any previous one.
    pub fn on_vote<L: VoteListener + 'static>(&self, listener: L) -> VoteSubscription {
        let id = self.dispatch.register(Arc::new(listener));
        VoteSubscription {
            id,
            dispatch: self.dispatch.clone(),
            released: false,
        }
    }

    /// Unregister whatever listener is active and wait for in-flight delivery.
    /// Safe when none is registered.
    pub async fn off_vote(&self) {
        self.dispatch.clear(None);
        self.dispatch.flush().await;
    }

    /// Tear down every transport task and the listener.
    pub fn remove_all_listeners(&self) {
        self.dispatch.clear(None);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        *self.state.lock() = ConnectionState::Disconnected;
        info!("[vote-sync] event stream stopped");
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

async fn dispatch_loop(
    mut logs: mpsc::UnboundedReceiver<RpcLog>,
    store: Arc<VoteStateStore>,
    dispatch: Arc<Dispatch>,
    dedup_window: usize,
) {
    let mut seen: LruCache<LogId, ()> =
        LruCache::new(NonZeroUsize::new(dedup_window).unwrap_or(NonZeroUsize::MIN));

    while let Some(log) = logs.recv().await {
        if log.removed {
            debug!(tx = ?log.transaction_hash, "[vote-sync] skipping removed log");
            continue;
        }
        if let Some(id) = log.id() {
            if seen.put(id, ()).is_some() {
                trace!(tx = ?log.transaction_hash, "[vote-sync] duplicate log");
                continue;
            }
        }
        let event = match decode_vote_cast(&log) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, tx = ?log.transaction_hash, "[vote-sync] undecodable VoteCast log");
                continue;
            }
        };

        let outcome = store.apply(&event);
        debug!(
            election_id = event.election_id,
            candidate_id = event.candidate_id,
            new_total = event.new_total,
            ?outcome,
            "[vote-sync] vote event"
        );
        dispatch.deliver(event).await;
    }
    warn!("[vote-sync] log source closed, no further vote events");
}

async fn block_number(transport: &dyn LedgerTransport) -> Result<u64, RpcFailure> {
    let head = transport.request("eth_blockNumber", json!([])).await?;
    let head = head
        .as_str()
        .ok_or_else(|| RpcFailure::Decode(format!("eth_blockNumber returned {head}")))?;
    parse_quantity(head).map_err(|e| RpcFailure::Decode(e.to_string()))
}

async fn fetch_logs(
    transport: &dyn LedgerTransport,
    filter: &LogFilter,
    from: u64,
    to: u64,
) -> Result<Vec<RpcLog>, RpcFailure> {
    let logs = transport
        .request("eth_getLogs", json!([filter.with_range(from, to)]))
        .await?;
    serde_json::from_value(logs).map_err(|e| RpcFailure::Decode(e.to_string()))
}

/// Poll for new logs from the block after the head seen at start.
async fn poll_logs(
    transport: Arc<dyn LedgerTransport>,
    filter: LogFilter,
    every: Duration,
    tx: mpsc::UnboundedSender<RpcLog>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut next_block: Option<u64> = None;

    loop {
        ticker.tick().await;
        let head = match block_number(transport.as_ref()).await {
            Ok(head) => head,
            Err(e) => {
                warn!(error = %e, "[vote-sync] poll: eth_blockNumber failed");
                continue;
            }
        };
        let Some(from) = next_block else {
            next_block = Some(head.saturating_add(1));
            continue;
        };
        if from > head {
            continue;
        }

        match fetch_logs(transport.as_ref(), &filter, from, head).await {
            Ok(logs) => {
                trace!(from, to = head, count = logs.len(), "[vote-sync] poll");
                for log in logs {
                    if tx.send(log).is_err() {
                        return;
                    }
                }
                next_block = Some(head.saturating_add(1));
            }
            Err(e) => warn!(error = %e, from, to = head, "[vote-sync] poll: eth_getLogs failed"),
        }
    }
}
