//! WebSocket client for `eth_subscribe("logs")`.
//!
//! One connection per subscription. The handshake (connect, subscribe,
//! confirmation) is bounded by a timeout so the caller can fall back to
//! polling quickly. Once live, a reader task forwards notifications until the
//! socket closes; there is no reconnection.

use crate::codec::RpcLog;
use crate::ports::{LogFeed, LogFilter, LogSubscriber, RpcFailure};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// JSON-RPC request for WebSocket.
#[derive(Debug, Serialize)]
struct WsRequest<T: Serialize> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

/// JSON-RPC subscription response or notification.
#[derive(Debug, Deserialize)]
struct SubscriptionResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<SubscriptionParams>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionParams {
    subscription: String,
    result: Value,
}

/// Realtime log subscriber over a JSON-RPC websocket.
pub struct WsLogSubscriber {
    ws_url: String,
    handshake_timeout: Duration,
    request_id: AtomicU64,
}

impl WsLogSubscriber {
    /// Create a subscriber for `ws_url`.
    pub fn new(ws_url: impl Into<String>, handshake_timeout: Duration) -> Self {
        Self {
            ws_url: ws_url.into(),
            handshake_timeout,
            request_id: AtomicU64::new(1),
        }
    }

    /// Connect, subscribe and wait for the subscription id.
    async fn handshake(&self, filter: LogFilter) -> Result<(WsSink, WsSource, String), RpcFailure> {
        let (ws_stream, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = WsRequest {
            jsonrpc: "2.0",
            method: "eth_subscribe",
            params: ("logs", filter.to_json()),
            id,
        };
        let text = serde_json::to_string(&request).map_err(|e| RpcFailure::Decode(e.to_string()))?;
        write
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;

        let subscription = await_confirmation(&mut write, &mut read, id).await?;
        Ok((write, read, subscription))
    }
}

#[async_trait]
impl LogSubscriber for WsLogSubscriber {
    async fn subscribe_logs(&self, filter: LogFilter) -> Result<LogFeed, RpcFailure> {
        let (write, read, subscription) =
            tokio::time::timeout(self.handshake_timeout, self.handshake(filter))
                .await
                .map_err(|_| {
                    RpcFailure::Transport(format!(
                        "websocket handshake with {} timed out",
                        self.ws_url
                    ))
                })??;

        info!(
            url = %self.ws_url,
            subscription = %subscription,
            "[vote-sync] log subscription live"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(read_loop(write, read, subscription, tx));
        Ok(LogFeed {
            logs: rx,
            task: Some(task),
        })
    }
}

async fn await_confirmation(
    write: &mut WsSink,
    read: &mut WsSource,
    id: u64,
) -> Result<String, RpcFailure> {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Ok(response) = serde_json::from_str::<SubscriptionResponse>(&text) else {
                    continue;
                };
                if response.id != Some(id) {
                    continue;
                }
                if let Some(error) = response.error {
                    return Err(RpcFailure::Rpc {
                        code: error.code,
                        message: error.message,
                    });
                }
                return match response.result {
                    Some(Value::String(subscription)) => Ok(subscription),
                    other => Err(RpcFailure::Decode(format!(
                        "unexpected subscription id: {other:?}"
                    ))),
                };
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => return Err(RpcFailure::Transport(e.to_string())),
            _ => {}
        }
    }
    Err(RpcFailure::Transport(
        "websocket closed before subscription was confirmed".to_string(),
    ))
}

async fn read_loop(
    mut write: WsSink,
    mut read: WsSource,
    subscription: String,
    tx: mpsc::UnboundedSender<RpcLog>,
) {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Some(log) = parse_notification(&text, &subscription) {
                    if tx.send(log).is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                warn!("[vote-sync] websocket closed by remote, live updates stopped");
                break;
            }
            Err(e) => {
                warn!(error = %e, "[vote-sync] websocket error, live updates stopped");
                break;
            }
            _ => {}
        }
    }
    debug!("[vote-sync] websocket reader exited");
}

/// Extract the log from an `eth_subscription` notification for `subscription`.
fn parse_notification(text: &str, subscription: &str) -> Option<RpcLog> {
    let response = serde_json::from_str::<SubscriptionResponse>(text).ok()?;
    if response.method.as_deref() != Some("eth_subscription") {
        return None;
    }
    let params = response.params?;
    if params.subscription != subscription {
        return None;
    }
    match serde_json::from_value::<RpcLog>(params.result) {
        Ok(log) => Some(log),
        Err(e) => {
            warn!(error = %e, "[vote-sync] undecodable log notification");
            None
        }
    }
}
