//! # Reference Election Flows
//!
//! 1. **Live tally**: reload election 7, receive a `VoteCast` over websocket,
//!    observe the updated tally before the listener runs
//! 2. **Relayed vote**: registry proof → relayer submission, store untouched
//! 3. **Missing contract**: no code at the address stops every read early

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    use vote_sync::{
        Candidate, ConnectionState, ErrorKind, LogSubscriber, MockLogSubscriber, MockRpc,
        TxHandle, VoteEvent, VoteSyncApi, WsLogSubscriber,
    };

    use crate::fixtures::{
        ledger, reference_candidates, sync_layer, vote_log, MockNode, Services, ELECTION,
        EVENT_WAIT,
    };

    // =============================================================================
    // LIVE TALLY
    // =============================================================================

    #[tokio::test]
    async fn test_live_vote_updates_tally() {
        let services = Services::start().await;
        let (node, feed) = MockNode::start().await.unwrap();
        let subscriber: Arc<dyn LogSubscriber> =
            Arc::new(WsLogSubscriber::new(node.url.clone(), EVENT_WAIT));

        let sync = sync_layer(
            ledger(ELECTION, &reference_candidates()),
            Some(subscriber),
            &services,
        )
        .await;
        assert_eq!(sync.connection_state(), ConnectionState::SubscribedLive);

        let loaded = sync.reload().await.unwrap();
        assert_eq!(loaded.total_votes, 15);

        // The listener reads the store: it must already hold the new total.
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let layer = Arc::clone(&sync);
        let _subscription = sync.on_vote(vote_sync::FnListener(move |event: VoteEvent| {
            let layer = Arc::clone(&layer);
            let seen_tx = seen_tx.clone();
            async move {
                let _ = seen_tx.send((event, layer.snapshot()));
            }
        }));

        feed.send(vote_log(VoteEvent::new(ELECTION, 2, 6), 0)).unwrap();

        let (event, snapshot) = timeout(EVENT_WAIT, seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, VoteEvent::new(ELECTION, 2, 6));
        assert_eq!(
            snapshot.candidates,
            vec![Candidate::new(1, "A", 10), Candidate::new(2, "B", 6)]
        );
        assert_eq!(snapshot.total_votes, 16);
        assert_eq!(sync.snapshot(), snapshot);

        sync.shutdown();
    }

    // =============================================================================
    // RELAYED VOTE
    // =============================================================================

    #[tokio::test]
    async fn test_relayed_vote_leaves_store_unchanged() {
        let services = Services::start().await;
        let proof = json!({
            "electionId": ELECTION,
            "root": "0x1f",
            "leaf": "0x2e",
            "proof": ["0x3d", "0x4c"]
        });
        Mock::given(method("POST"))
            .and(path("/proof"))
            .and(body_json(json!({ "dni": "12345678", "fingerprint": "f-01" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(proof.clone()))
            .expect(1)
            .mount(&services.registry)
            .await;

        let mut submission = proof.as_object().cloned().unwrap();
        submission.insert("candidateId".to_string(), json!(2));
        Mock::given(method("POST"))
            .and(path("/vote"))
            .and(body_json(serde_json::Value::Object(submission)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "txHash": "0xabc" })))
            .expect(1)
            .mount(&services.relayer)
            .await;

        let (subscriber, _feed) = MockLogSubscriber::channel();
        let sync = sync_layer(
            ledger(ELECTION, &reference_candidates()),
            Some(Arc::new(subscriber)),
            &services,
        )
        .await;
        let before = sync.reload().await.unwrap();

        let handle = sync.cast_vote("12345678", "f-01", 2).await.unwrap();
        assert_eq!(handle, TxHandle::new("0xabc"));
        assert_eq!(sync.snapshot(), before);
    }

    #[tokio::test]
    async fn test_proof_then_submit_step_by_step() {
        let services = Services::start().await;
        Mock::given(path("/proof"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "electionId": ELECTION, "root": "0x1f", "leaf": "0x2e", "proof": []
            })))
            .mount(&services.registry)
            .await;
        Mock::given(path("/vote"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "txHash": "0xabc" })))
            .mount(&services.relayer)
            .await;

        let (subscriber, _feed) = MockLogSubscriber::channel();
        let sync = sync_layer(
            ledger(ELECTION, &reference_candidates()),
            Some(Arc::new(subscriber)),
            &services,
        )
        .await;

        let proof = sync.registry().get_proof("12345678", "f-01").await.unwrap();
        assert_eq!(proof.election_id, ELECTION);
        let handle = sync.relayer().submit_vote(2, &proof).await.unwrap();
        assert_eq!(handle.tx_hash, "0xabc");

        // Nothing was reloaded, so the store is still empty.
        assert_eq!(sync.snapshot().election_id, 0);
    }

    // =============================================================================
    // MISSING CONTRACT
    // =============================================================================

    #[tokio::test]
    async fn test_missing_contract_stops_before_decode() {
        let services = Services::start().await;
        let ledger = Arc::new(MockRpc::new());
        ledger.respond("eth_getCode", json!("0x"));

        let (subscriber, _feed) = MockLogSubscriber::channel();
        let sync = sync_layer(ledger.clone(), Some(Arc::new(subscriber)), &services).await;

        let err = sync.reader().current_election_id().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(ledger.methods(), vec!["eth_getCode".to_string()]);

        let err = sync.reload().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(ledger.call_count("eth_call"), 0);
        assert_eq!(services.relayer_requests().await, 0);
    }
}
