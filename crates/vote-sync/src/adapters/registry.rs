//! Registry client: exchanges voter credentials for an eligibility proof.

use super::http::{read_json, HttpClient, HttpClientBuilder};
use crate::domain::{Proof, SyncResult, VoteSyncError};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct ProofRequest<'a> {
    dni: &'a str,
    fingerprint: &'a str,
}

/// HTTP client for the registry's `POST /proof`.
///
/// Proofs are never cached: every call asks the registry again.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: HttpClient,
}

impl RegistryClient {
    /// Create a client for the registry at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let client = HttpClientBuilder::new(base_url)?
            .timeout(timeout)
            .default_headers()
            .build()?;
        Ok(Self { client })
    }

    /// Request a membership proof for the voter.
    ///
    /// A non-2xx answer is `RegistryRejected` carrying the body text.
    pub async fn get_proof(&self, dni: &str, fingerprint: &str) -> SyncResult<Proof> {
        debug!(registry = %self.client.base_url(), "[vote-sync] requesting proof");
        let response = self
            .client
            .post("proof", Some(&ProofRequest { dni, fingerprint }))
            .await?;
        read_json(response, VoteSyncError::RegistryRejected).await
    }
}
