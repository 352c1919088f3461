//! # Sync Layer
//!
//! Owns every component for the lifetime of the process. Built once at start
//! and shared by `Arc`; views read snapshots from it and register the vote
//! listener through it.

use super::admin::AdminWriter;
use super::chain_reader::ChainReader;
use super::event_stream::{EventStream, VoteSubscription};
use super::wallet_session::WalletSession;
use crate::adapters::{HttpRpcClient, RegistryClient, RelayerGateway, WsLogSubscriber};
use crate::config::SyncConfig;
use crate::domain::{
    ConnectionState, MetaMap, SyncResult, TallySnapshot, TxHandle, VoteStateStore, VoteSyncError,
};
use crate::ports::{LedgerTransport, LogSubscriber, VoteListener, VoteSyncApi, WalletProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Attempts made by `reload` when the election changes mid-load.
const RELOAD_ATTEMPTS: usize = 2;

/// Transports and clients a [`SyncLayer`] is assembled from.
pub struct SyncParts {
    /// Request/response ledger transport.
    pub transport: Arc<dyn LedgerTransport>,
    /// Realtime log transport; `None` means polling only.
    pub subscriber: Option<Arc<dyn LogSubscriber>>,
    /// Wallet provider; `None` when no wallet is installed.
    pub wallet: Option<Arc<dyn WalletProvider>>,
    /// Relayer client.
    pub relayer: RelayerGateway,
    /// Registry client.
    pub registry: RegistryClient,
}

/// Process-wide owner of reader, event stream, store, clients and wallet.
pub struct SyncLayer {
    reader: Arc<ChainReader>,
    store: Arc<VoteStateStore>,
    events: EventStream,
    relayer: RelayerGateway,
    registry: RegistryClient,
    session: Arc<WalletSession>,
    admin: AdminWriter,
}

impl SyncLayer {
    /// Build every part from `config` over real transports.
    pub async fn connect(
        config: &SyncConfig,
        wallet: Option<Arc<dyn WalletProvider>>,
    ) -> SyncResult<Arc<Self>> {
        config.validate()?;
        let timeout = config.request_timeout();

        let transport: Arc<dyn LedgerTransport> =
            Arc::new(HttpRpcClient::with_timeout(config.rpc_url.clone(), timeout)?);
        let subscriber: Option<Arc<dyn LogSubscriber>> = if config.realtime_enabled() {
            Some(Arc::new(WsLogSubscriber::new(
                config.ws_url.clone(),
                Duration::from_millis(config.ws_handshake_timeout_ms),
            )))
        } else {
            None
        };

        let parts = SyncParts {
            transport,
            subscriber,
            wallet,
            relayer: RelayerGateway::new(&config.relayer_url, timeout)?,
            registry: RegistryClient::new(&config.registry_url, timeout)?,
        };
        Self::from_parts(config, parts).await
    }

    /// Assemble from explicit parts.
    pub async fn from_parts(config: &SyncConfig, parts: SyncParts) -> SyncResult<Arc<Self>> {
        let contract = config.contract()?;
        let reader = Arc::new(ChainReader::new(parts.transport.clone(), contract));
        let store = Arc::new(VoteStateStore::new());

        let events = EventStream::connect(
            config.stream_settings()?,
            parts.transport.clone(),
            parts.subscriber,
            store.clone(),
        )
        .await;

        let session = Arc::new(WalletSession::new(
            parts.wallet,
            reader.clone(),
            config.network(),
        ));
        let admin = AdminWriter::new(
            session.clone(),
            reader.clone(),
            parts.transport,
            Duration::from_millis(config.poll_interval_ms),
            Duration::from_secs(config.receipt_timeout_secs),
        );

        info!(
            rpc = %config.rpc_url,
            contract = %config.contract_address,
            "[vote-sync] sync layer ready"
        );
        Ok(Arc::new(Self {
            reader,
            store,
            events,
            relayer: parts.relayer,
            registry: parts.registry,
            session,
            admin,
        }))
    }

    /// Contract reads.
    pub fn reader(&self) -> &ChainReader {
        &self.reader
    }

    /// Tally store.
    pub fn store(&self) -> &VoteStateStore {
        &self.store
    }

    /// Event stream.
    pub fn events(&self) -> &EventStream {
        &self.events
    }

    /// Relayer client.
    pub fn relayer(&self) -> &RelayerGateway {
        &self.relayer
    }

    /// Registry client.
    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    /// Wallet session.
    pub fn wallet(&self) -> &WalletSession {
        &self.session
    }

    /// Signed administrative writes.
    pub fn admin(&self) -> &AdminWriter {
        &self.admin
    }

    /// Register the vote listener. Events reach it after the store has them.
    pub fn on_vote<L: VoteListener + 'static>(&self, listener: L) -> VoteSubscription {
        self.events.on_vote(listener)
    }

    /// Stop every transport task.
    pub fn shutdown(&self) {
        self.events.remove_all_listeners();
    }
}

#[async_trait]
impl VoteSyncApi for SyncLayer {
    async fn reload(&self) -> SyncResult<TallySnapshot> {
        for attempt in 1..=RELOAD_ATTEMPTS {
            let election_id = self.reader.current_election_id().await?;
            let candidates = self.reader.get_all_candidates().await?;
            let images = match self.relayer.get_candidate_meta(election_id).await {
                Ok(images) => images,
                Err(e) => {
                    warn!(error = %e, election_id, "[vote-sync] candidate images unavailable");
                    MetaMap::new()
                }
            };

            let confirmed = self.reader.current_election_id().await?;
            if confirmed == election_id {
                self.store.replace(election_id, candidates, images);
                return Ok(self.store.snapshot());
            }
            warn!(
                loaded = election_id,
                current = confirmed,
                attempt,
                "[vote-sync] election changed during reload, discarding snapshot"
            );
        }
        Err(VoteSyncError::Unavailable(
            "election kept changing during reload".to_string(),
        ))
    }

    async fn cast_vote(
        &self,
        dni: &str,
        fingerprint: &str,
        candidate_id: u64,
    ) -> SyncResult<TxHandle> {
        let proof = self.registry.get_proof(dni, fingerprint).await?;
        self.relayer.submit_vote(candidate_id, &proof).await
    }

    fn snapshot(&self) -> TallySnapshot {
        self.store.snapshot()
    }

    fn connection_state(&self) -> ConnectionState {
        self.events.state()
    }
}
