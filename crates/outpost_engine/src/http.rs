//! HTTP gateway implementation.
//!
//! Speaks a small JSON protocol:
//!
//! | Call | Request | Response |
//! |---|---|---|
//! | pull | `GET {base}/datasets/{name}` | `{"records": [{"id": .., ...}]}` |
//! | submit | `POST {base}/actions/submit` with `{"actions": [...]}` | `{"results": [{"id", "success", "error"?}]}` |
//!
//! Each record object must carry an `id` (string or integer); the whole object
//! is kept as the record body. Submits carry an `Idempotency-Key` header
//! derived from the batch's action IDs, so a retried batch reuses its key.
//!
//! The HTTP client itself is abstracted via [`HttpClient`]; `ReqwestClient`
//! (feature `reqwest-client`) is the production implementation.

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{RemoteGateway, SubmitOutcome};
use async_trait::async_trait;
use outpost_store::{DatasetName, QueuedAction, Record, RecordId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use tracing::debug;

/// Header carrying the batch idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Errors are transport failures (no response at all); non-2xx statuses are
/// returned as responses.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a GET request.
    async fn get(&self, url: &str) -> Result<HttpResponse, String>;

    /// Sends a POST request with a JSON body and extra headers.
    async fn post_json(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: &[(&'static str, String)],
    ) -> Result<HttpResponse, String>;
}

#[derive(Debug, Deserialize)]
struct PullBody {
    records: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    actions: &'a [QueuedAction],
}

#[derive(Debug, Deserialize)]
struct SubmitResponseBody {
    results: Vec<SubmitOutcome>,
}

/// HTTP-based remote gateway.
pub struct HttpGateway<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpGateway<C> {
    /// Creates a gateway for the backend at `base_url`.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn check_status(response: &HttpResponse, what: &str) -> GatewayResult<()> {
        if response.is_success() {
            return Ok(());
        }
        let detail = format!(
            "{what} returned HTTP {}: {}",
            response.status,
            String::from_utf8_lossy(&response.body).trim()
        );
        match response.status {
            408 | 429 | 500..=599 => Err(GatewayError::transport_retryable(detail)),
            _ => Err(GatewayError::Rejected(detail)),
        }
    }
}

#[async_trait]
impl<C: HttpClient> RemoteGateway for HttpGateway<C> {
    async fn pull_dataset(&self, dataset: &DatasetName) -> GatewayResult<Vec<Record>> {
        let url = format!("{}/datasets/{}", self.base_url, dataset);
        let response = self
            .client
            .get(&url)
            .await
            .map_err(GatewayError::transport_retryable)?;
        Self::check_status(&response, &url)?;

        let body: PullBody = serde_json::from_slice(&response.body)
            .map_err(|e| GatewayError::Invalid(format!("dataset {dataset}: {e}")))?;
        let records = body
            .records
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                let id = value.get("id").and_then(RecordId::from_json).ok_or_else(|| {
                    GatewayError::Invalid(format!(
                        "dataset {dataset}: record {index} has no usable id"
                    ))
                })?;
                Ok(Record::new(id, value))
            })
            .collect::<GatewayResult<Vec<_>>>()?;
        debug!(%dataset, records = records.len(), "pulled dataset over http");
        Ok(records)
    }

    async fn submit_actions(&self, actions: &[QueuedAction]) -> GatewayResult<Vec<SubmitOutcome>> {
        let url = format!("{}/actions/submit", self.base_url);
        let body = serde_json::to_vec(&SubmitBody { actions })
            .map_err(|e| GatewayError::Invalid(format!("failed to encode batch: {e}")))?;
        let key = idempotency_key(actions);
        let response = self
            .client
            .post_json(&url, body, &[(IDEMPOTENCY_HEADER, key)])
            .await
            .map_err(GatewayError::transport_retryable)?;
        Self::check_status(&response, &url)?;

        let parsed: SubmitResponseBody = serde_json::from_slice(&response.body)
            .map_err(|e| GatewayError::Invalid(format!("submit response: {e}")))?;
        Ok(parsed.results)
    }
}

/// Derives a stable key from the batch's action IDs: SHA-256 over the IDs in
/// submission order, hex encoded.
pub fn idempotency_key(actions: &[QueuedAction]) -> String {
    let mut hasher = Sha256::new();
    for action in actions {
        hasher.update(action.id.as_uuid().as_bytes());
    }
    let digest = hasher.finalize();
    let mut key = String::with_capacity(6 + digest.len() * 2 + 8);
    key.push_str("batch-");
    for byte in digest.iter() {
        let _ = write!(key, "{byte:02x}");
    }
    let _ = write!(key, "-{}", actions.len());
    key
}

#[cfg(feature = "reqwest-client")]
pub use self::reqwest_client::ReqwestClient;

#[cfg(feature = "reqwest-client")]
mod reqwest_client {
    use super::{HttpClient, HttpResponse};
    use async_trait::async_trait;

    /// [`HttpClient`] backed by `reqwest`.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        /// Wraps an existing `reqwest` client.
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    async fn into_response(response: reqwest::Response) -> Result<HttpResponse, String> {
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }

    #[async_trait]
    impl HttpClient for ReqwestClient {
        async fn get(&self, url: &str) -> Result<HttpResponse, String> {
            let response = self
                .client
                .get(url)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| e.to_string())?;
            into_response(response).await
        }

        async fn post_json(
            &self,
            url: &str,
            body: Vec<u8>,
            headers: &[(&'static str, String)],
        ) -> Result<HttpResponse, String> {
            let mut request = self
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
            for (name, value) in headers {
                request = request.header(*name, value.as_str());
            }
            let response = request.send().await.map_err(|e| e.to_string())?;
            into_response(response).await
        }
    }
}
