//! Shared fixtures: a scripted ledger, a websocket node that pushes
//! `VoteCast` logs, and wiremock registry/relayer services.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vote_sync::codec::abi::uint_word;
use vote_sync::codec::contract::{encode_candidates_return, signatures};
use vote_sync::codec::RpcLog;
use vote_sync::{
    Candidate, LogSubscriber, MockRpc, RegistryClient, RelayerGateway, SyncConfig, SyncLayer,
    SyncParts, VoteEvent,
};

/// Election used by the reference scenarios.
pub const ELECTION: u64 = 7;

/// Subscription id the mock node hands out.
pub const SUBSCRIPTION: &str = "0x9cef478923ff08bf67fde6c64013158d";

/// How long a test waits for an event before failing.
pub const EVENT_WAIT: Duration = Duration::from_secs(5);

/// `[{1, "A", 10}, {2, "B", 5}]`.
pub fn reference_candidates() -> Vec<Candidate> {
    vec![Candidate::new(1, "A", 10), Candidate::new(2, "B", 5)]
}

/// Ledger with a deployed contract, the given election and candidates, and
/// an idle log history.
pub fn ledger(election_id: u64, candidates: &[Candidate]) -> Arc<MockRpc> {
    let ledger = MockRpc::with_contract();
    ledger.respond_call(
        signatures::CURRENT_ELECTION_ID,
        &uint_word(election_id.into()),
    );
    ledger.respond_call(
        signatures::GET_ALL_CANDIDATES,
        &encode_candidates_return(candidates),
    );
    ledger.respond("eth_blockNumber", json!("0x10"));
    ledger.respond("eth_getLogs", json!([]));
    Arc::new(ledger)
}

/// `VoteCast` log for `event`, uniquely identified by `log_index`.
pub fn vote_log(event: VoteEvent, log_index: u64) -> RpcLog {
    RpcLog::vote_cast(&event, "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060", log_index)
}

/// Registry and relayer HTTP services.
pub struct Services {
    /// Relayer.
    pub relayer: MockServer,
    /// Registry.
    pub registry: MockServer,
}

impl Services {
    /// Start both servers with no candidate metadata saved.
    pub async fn start() -> Self {
        let services = Self {
            relayer: MockServer::start().await,
            registry: MockServer::start().await,
        };
        Mock::given(method("GET"))
            .and(path("/candidate-meta"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .mount(&services.relayer)
            .await;
        services
    }

    /// Config pointing at these services; polling only.
    pub fn config(&self) -> SyncConfig {
        SyncConfig {
            relayer_url: self.relayer.uri(),
            registry_url: self.registry.uri(),
            ..SyncConfig::for_testing()
        }
    }

    /// Requests the relayer has received so far.
    pub async fn relayer_requests(&self) -> usize {
        self.relayer
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

/// Assemble a layer over `ledger`, the services, and an optional realtime
/// transport.
pub async fn sync_layer(
    ledger: Arc<MockRpc>,
    subscriber: Option<Arc<dyn LogSubscriber>>,
    services: &Services,
) -> Arc<SyncLayer> {
    let config = services.config();
    let timeout = config.request_timeout();
    let parts = SyncParts {
        transport: ledger,
        subscriber,
        wallet: None,
        relayer: RelayerGateway::new(&config.relayer_url, timeout).expect("relayer url"),
        registry: RegistryClient::new(&config.registry_url, timeout).expect("registry url"),
    };
    SyncLayer::from_parts(&config, parts)
        .await
        .expect("sync layer")
}

/// A ledger node's websocket endpoint that accepts one `eth_subscribe("logs")`
/// and pushes whatever logs the test sends. Dropping the sender closes the
/// socket.
pub struct MockNode {
    /// `ws://` URL to connect to.
    pub url: String,
    task: JoinHandle<()>,
}

impl MockNode {
    /// Bind on an ephemeral local port.
    pub async fn start() -> std::io::Result<(Self, mpsc::UnboundedSender<RpcLog>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("ws://{}", listener.local_addr()?);
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(serve(listener, rx));
        Ok((Self { url, task }, tx))
    }

    /// URL of a port nothing listens on.
    pub async fn refused_url() -> std::io::Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("ws://{}", listener.local_addr()?);
        drop(listener);
        Ok(url)
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, mut logs: mpsc::UnboundedReceiver<RpcLog>) {
    let Ok((stream, _)) = listener.accept().await else {
        return;
    };
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws.split();

    let request_id = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                let request: Value = serde_json::from_str(&text).unwrap_or_default();
                if request["method"] == "eth_subscribe" {
                    break request["id"].clone();
                }
            }
            Some(Ok(_)) => continue,
            _ => return,
        }
    };
    let confirmation = json!({ "jsonrpc": "2.0", "id": request_id, "result": SUBSCRIPTION });
    if write
        .send(Message::Text(confirmation.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    while let Some(log) = logs.recv().await {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": { "subscription": SUBSCRIPTION, "result": log },
        });
        if write
            .send(Message::Text(notification.to_string().into()))
            .await
            .is_err()
        {
            return;
        }
    }
    let _ = write.send(Message::Close(None)).await;
}
