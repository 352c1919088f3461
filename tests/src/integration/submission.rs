//! # Relayer and Registry Surface
//!
//! Vote submission failures, candidate metadata feeding the tally view, vote
//! listings, and operator operations the client does not provide.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    use vote_sync::{
        CandidateMeta, ErrorKind, MockLogSubscriber, SyncLayer, VoteQuery, VoteSyncApi,
        VoteSyncError,
    };

    use crate::fixtures::{ledger, reference_candidates, sync_layer, Services, ELECTION};

    async fn layer(services: &Services) -> Arc<SyncLayer> {
        let (subscriber, _feed) = MockLogSubscriber::channel();
        sync_layer(
            ledger(ELECTION, &reference_candidates()),
            Some(Arc::new(subscriber)),
            services,
        )
        .await
    }

    async fn mount_proof(services: &Services) {
        Mock::given(method("POST"))
            .and(path("/proof"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "electionId": ELECTION, "root": "0x1f", "leaf": "0x2e", "proof": ["0x3d"]
            })))
            .mount(&services.registry)
            .await;
    }

    #[tokio::test]
    async fn test_empty_tx_hash_is_a_failed_vote() {
        let services = Services::start().await;
        mount_proof(&services).await;
        Mock::given(method("POST"))
            .and(path("/vote"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "txHash": "" })))
            .mount(&services.relayer)
            .await;

        let sync = layer(&services).await;
        let before = sync.reload().await.unwrap();

        let err = sync.cast_vote("12345678", "f-01", 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert_eq!(sync.snapshot(), before);
    }

    #[tokio::test]
    async fn test_relayer_rejection_text_is_surfaced() {
        let services = Services::start().await;
        mount_proof(&services).await;
        Mock::given(method("POST"))
            .and(path("/vote"))
            .respond_with(ResponseTemplate::new(409).set_body_string("nullifier already used"))
            .mount(&services.relayer)
            .await;

        let sync = layer(&services).await;
        let err = sync.cast_vote("12345678", "f-01", 2).await.unwrap_err();
        assert_eq!(
            err,
            VoteSyncError::Rejected("nullifier already used".to_string())
        );
    }

    #[tokio::test]
    async fn test_every_vote_fetches_a_fresh_proof() {
        let services = Services::start().await;
        Mock::given(method("POST"))
            .and(path("/proof"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "electionId": ELECTION, "root": "0x1f", "leaf": "0x2e", "proof": []
            })))
            .expect(2)
            .mount(&services.registry)
            .await;
        Mock::given(method("POST"))
            .and(path("/vote"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "txHash": "0xabc" })))
            .mount(&services.relayer)
            .await;

        let sync = layer(&services).await;
        sync.cast_vote("12345678", "f-01", 1).await.unwrap();
        sync.cast_vote("12345678", "f-01", 2).await.unwrap();
    }

    #[tokio::test]
    async fn test_simple_vote_sends_credentials_to_relayer() {
        let services = Services::start().await;
        Mock::given(method("POST"))
            .and(path("/vote/2"))
            .and(body_json(json!({ "dni": "12345678", "fingerprint": "f-01" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "txHash": "0xdef" })))
            .expect(1)
            .mount(&services.relayer)
            .await;

        let sync = layer(&services).await;
        let handle = sync
            .relayer()
            .submit_vote_simple(2, "12345678", "f-01")
            .await
            .unwrap();
        assert_eq!(handle.tx_hash, "0xdef");
        assert!(services
            .registry
            .received_requests()
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_saved_images_show_after_reload() {
        let services = Services::start().await;
        Mock::given(method("PUT"))
            .and(path("/candidate-meta"))
            .and(body_json(json!({
                "electionId": ELECTION,
                "items": [{ "candidateId": 2, "imageUrl": "https://img/b.png" }]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&services.relayer)
            .await;
        // Outranks the empty default.
        Mock::given(method("GET"))
            .and(path("/candidate-meta"))
            .and(query_param("electionId", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "candidateId": 2, "imageUrl": "https://img/b.png" }]
            })))
            .with_priority(1)
            .mount(&services.relayer)
            .await;

        let sync = layer(&services).await;
        sync.relayer()
            .save_candidate_meta(
                ELECTION,
                &[CandidateMeta {
                    candidate_id: 2,
                    image_url: "https://img/b.png".to_string(),
                }],
            )
            .await
            .unwrap();

        let snapshot = sync.reload().await.unwrap();
        assert_eq!(snapshot.image_for(2), Some("https://img/b.png"));
        assert_eq!(snapshot.image_for(1), None);
    }

    #[tokio::test]
    async fn test_missing_metadata_reloads_without_images() {
        let services = Services::start().await;
        Mock::given(method("GET"))
            .and(path("/candidate-meta"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no metadata"))
            .with_priority(1)
            .mount(&services.relayer)
            .await;

        let sync = layer(&services).await;
        let err = sync.relayer().get_candidate_meta(ELECTION).await.unwrap_err();
        assert_eq!(err, VoteSyncError::Rejected("no metadata".to_string()));

        let snapshot = sync.reload().await.unwrap();
        assert!(snapshot.images.is_empty());
        assert_eq!(snapshot.total_votes, 15);
    }

    #[tokio::test]
    async fn test_vote_listing_pages() {
        let services = Services::start().await;
        Mock::given(method("GET"))
            .and(path("/votes"))
            .and(query_param("electionId", "7"))
            .and(query_param("start", "2"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "electionId": 7,
                "start": 2,
                "limit": 2,
                "total": 5,
                "items": [
                    { "id": 3, "candidateId": 1, "timestamp": 1700000003 },
                    { "id": 4, "candidateId": 2, "timestamp": 1700000004 }
                ]
            })))
            .mount(&services.relayer)
            .await;
        Mock::given(method("GET"))
            .and(path("/votes/by-candidate"))
            .and(query_param("candidateId", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "electionId": 7,
                "candidateId": 2,
                "start": 0,
                "limit": 10,
                "total": 1,
                "items": [{ "id": 4, "candidateId": 2, "timestamp": 1700000004 }]
            })))
            .mount(&services.relayer)
            .await;

        let sync = layer(&services).await;
        let page = sync
            .relayer()
            .list_votes(VoteQuery::page(ELECTION, 2, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(
            page.items.iter().map(|v| v.id).collect::<Vec<_>>(),
            vec![3, 4]
        );

        let page = sync
            .relayer()
            .list_votes_by_candidate(ELECTION, 2, 0, 10)
            .await
            .unwrap();
        assert_eq!(page.candidate_id, Some(2));
        assert!(page.items.iter().all(|v| v.candidate_id == 2));
    }

    #[tokio::test]
    async fn test_operator_operations_issue_no_request() {
        let services = Services::start().await;
        let sync = layer(&services).await;
        let relayer = sync.relayer();

        let results = [
            relayer.register_center(1, "Escuela 12").await.map(|_| ()),
            relayer
                .set_center_admin(1, "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266", true)
                .await
                .map(|_| ()),
            relayer.set_center_mesa_root(1, 3, "0x1f").await.map(|_| ()),
            relayer.calc_root(1, 3).await.map(|_| ()),
            relayer.open_center(1).await.map(|_| ()),
            relayer.close_center(1).await.map(|_| ()),
            relayer
                .start_election(&["A".to_string()], true)
                .await
                .map(|_| ()),
            relayer.clear_candidates().await.map(|_| ()),
        ];
        for result in results {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::Unsupported);
        }
        assert_eq!(services.relayer_requests().await, 0);
    }

    #[tokio::test]
    async fn test_root_sync() {
        let services = Services::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/sync-root"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "root": "0x1f", "txHash": "0x77"
            })))
            .expect(1)
            .mount(&services.relayer)
            .await;

        let sync = layer(&services).await;
        let synced = sync.relayer().sync_root_from_registry().await.unwrap();
        assert_eq!(synced.root, "0x1f");
        assert_eq!(synced.tx_hash, "0x77");
    }
}
