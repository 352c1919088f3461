//! # Realtime Feed
//!
//! Websocket subscription against a mock node, fallback to polling when the
//! node refuses connections, and teardown of the listener.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use vote_sync::{ConnectionState, LogSubscriber, VoteEvent, VoteSyncApi, WsLogSubscriber};

    use crate::fixtures::{
        ledger, reference_candidates, sync_layer, vote_log, MockNode, Services, ELECTION,
        EVENT_WAIT,
    };

    /// Quiet period after which no further delivery is expected.
    const SETTLE: Duration = Duration::from_millis(300);

    fn ws(url: &str) -> Option<Arc<dyn LogSubscriber>> {
        Some(Arc::new(WsLogSubscriber::new(url, Duration::from_secs(2))))
    }

    #[tokio::test]
    async fn test_duplicate_notifications_delivered_once() {
        let services = Services::start().await;
        let (node, feed) = MockNode::start().await.unwrap();
        let sync = sync_layer(
            ledger(ELECTION, &reference_candidates()),
            ws(&node.url),
            &services,
        )
        .await;
        sync.reload().await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = sync.on_vote(tx);

        let first = vote_log(VoteEvent::new(ELECTION, 1, 11), 0);
        feed.send(first.clone()).unwrap();
        feed.send(first).unwrap();
        feed.send(vote_log(VoteEvent::new(ELECTION, 1, 12), 1)).unwrap();

        let a = timeout(EVENT_WAIT, rx.recv()).await.unwrap().unwrap();
        let b = timeout(EVENT_WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(a.new_total, 11);
        assert_eq!(b.new_total, 12);
        assert!(timeout(SETTLE, rx.recv()).await.is_err());
        assert_eq!(sync.snapshot().candidate(1).unwrap().vote_count, 12);
    }

    #[tokio::test]
    async fn test_foreign_election_event_reaches_listener_only() {
        let services = Services::start().await;
        let (node, feed) = MockNode::start().await.unwrap();
        let sync = sync_layer(
            ledger(ELECTION, &reference_candidates()),
            ws(&node.url),
            &services,
        )
        .await;
        let before = sync.reload().await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = sync.on_vote(tx);
        feed.send(vote_log(VoteEvent::new(ELECTION + 1, 2, 99), 0))
            .unwrap();

        let event = timeout(EVENT_WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.election_id, ELECTION + 1);
        assert_eq!(sync.snapshot(), before);
    }

    #[tokio::test]
    async fn test_remote_close_keeps_state_without_reconnect() {
        let services = Services::start().await;
        let (node, feed) = MockNode::start().await.unwrap();
        let sync = sync_layer(
            ledger(ELECTION, &reference_candidates()),
            ws(&node.url),
            &services,
        )
        .await;
        assert_eq!(sync.connection_state(), ConnectionState::SubscribedLive);

        // Closing the feed makes the node close the socket.
        drop(feed);
        tokio::time::sleep(SETTLE).await;

        assert_eq!(sync.connection_state(), ConnectionState::SubscribedLive);
        let snapshot = sync.reload().await.unwrap();
        assert_eq!(snapshot.total_votes, 15);
    }

    #[tokio::test]
    async fn test_refused_websocket_falls_back_to_polling() {
        let services = Services::start().await;
        let ledger = ledger(ELECTION, &reference_candidates());
        // Two polls see head 0x10; later polls see 0x11 with one new log.
        ledger.respond_once("eth_blockNumber", json!("0x10"));
        ledger.respond_once("eth_blockNumber", json!("0x10"));
        ledger.respond("eth_blockNumber", json!("0x11"));
        ledger.respond_once(
            "eth_getLogs",
            json!([vote_log(VoteEvent::new(ELECTION, 2, 6), 0)]),
        );

        let url = MockNode::refused_url().await.unwrap();
        let sync = sync_layer(ledger.clone(), ws(&url), &services).await;
        assert_eq!(sync.connection_state(), ConnectionState::PollingFallback);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = sync.on_vote(tx);

        let event = timeout(EVENT_WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(event, VoteEvent::new(ELECTION, 2, 6));

        let (_, params) = ledger
            .calls()
            .into_iter()
            .find(|(m, _)| m == "eth_getLogs")
            .unwrap();
        assert_eq!(params[0]["fromBlock"], "0x11");
        assert_eq!(params[0]["toBlock"], "0x11");
    }

    #[tokio::test]
    async fn test_unsubscribed_listener_receives_nothing() {
        let services = Services::start().await;
        let (node, feed) = MockNode::start().await.unwrap();
        let sync = sync_layer(
            ledger(ELECTION, &reference_candidates()),
            ws(&node.url),
            &services,
        )
        .await;
        sync.reload().await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = sync.on_vote(tx);
        subscription.unsubscribe().await;

        feed.send(vote_log(VoteEvent::new(ELECTION, 2, 6), 0)).unwrap();
        tokio::time::sleep(SETTLE).await;

        assert!(!matches!(rx.try_recv(), Ok(_)));
        // The store still follows the ledger.
        assert_eq!(sync.snapshot().candidate(2).unwrap().vote_count, 6);
    }

    #[tokio::test]
    async fn test_shutdown_disconnects() {
        let services = Services::start().await;
        let (node, _feed) = MockNode::start().await.unwrap();
        let sync = sync_layer(
            ledger(ELECTION, &reference_candidates()),
            ws(&node.url),
            &services,
        )
        .await;

        sync.shutdown();
        assert_eq!(sync.connection_state(), ConnectionState::Disconnected);
    }
}
