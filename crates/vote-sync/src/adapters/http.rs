//! Shared HTTP plumbing for the registry and relayer clients.

use crate::domain::{SyncResult, VoteSyncError};
use reqwest::{header, Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct HttpClientBuilder {
    base_url: Url,
    timeout: Duration,
    headers: header::HeaderMap,
}

impl HttpClientBuilder {
    pub(crate) fn new(base_url: &str) -> SyncResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| VoteSyncError::Unavailable(format!("invalid url {base_url}: {e}")))?;
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            timeout: Duration::from_secs(10),
            headers: header::HeaderMap::new(),
        })
    }

    pub(crate) fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn default_headers(mut self) -> Self {
        self.headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        self
    }

    pub(crate) fn build(self) -> SyncResult<HttpClient> {
        let client = Client::builder()
            .timeout(self.timeout)
            .default_headers(self.headers)
            .build()
            .map_err(|e| VoteSyncError::Unavailable(e.to_string()))?;
        Ok(HttpClient {
            base_url: self.base_url,
            client,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    base_url: Url,
    client: Client,
}

impl HttpClient {
    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> SyncResult<RequestBuilder> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| VoteSyncError::Unavailable(format!("invalid path {path}: {e}")))?;
        Ok(self.client.request(method, url))
    }

    pub(crate) async fn get(&self, path: &str, query: &[(&str, String)]) -> SyncResult<Response> {
        send(self.request(Method::GET, path)?.query(query)).await
    }

    pub(crate) async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> SyncResult<Response> {
        let mut builder = self.request(Method::POST, path)?;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        send(builder).await
    }

    pub(crate) async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> SyncResult<Response> {
        send(self.request(Method::PUT, path)?.json(body)).await
    }
}

async fn send(builder: RequestBuilder) -> SyncResult<Response> {
    builder
        .send()
        .await
        .map_err(|e| VoteSyncError::Unavailable(e.to_string()))
}

/// Error body of a non-2xx response, forwarded verbatim.
async fn error_body(response: Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(text) if !text.is_empty() => text,
        _ => status.to_string(),
    }
}

/// Decode a 2xx JSON body; anything else goes through `reject`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    reject: fn(String) -> VoteSyncError,
) -> SyncResult<T> {
    if !response.status().is_success() {
        return Err(reject(error_body(response).await));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| VoteSyncError::Unavailable(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| VoteSyncError::MalformedResponse(e.to_string()))
}

/// Accept any 2xx status, ignoring the body.
pub(crate) async fn expect_success(
    response: Response,
    reject: fn(String) -> VoteSyncError,
) -> SyncResult<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(reject(error_body(response).await))
    }
}
