//! Query transport abstraction and HTTP implementation.
//!
//! [`QueryTransport`] is the seam between the submission controller and the
//! network: it turns a validated [`Query`] into a lazy stream of raw byte
//! chunks, finite and terminated by the transport's end-of-stream signal,
//! consumed exactly once by the controller's read loop. Tests drive the
//! controller with scripted transports; production uses [`HttpTransport`],
//! which posts to the local streaming proxy.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;

use crate::error::SubmitError;
use crate::query::Query;

/// A finite, non-restartable sequence of raw response chunks.
///
/// Chunk boundaries are arbitrary — they carry no meaning and must not be
/// assumed to align with frame boundaries.
pub type QueryStream = Pin<Box<dyn Stream<Item = Result<Bytes, SubmitError>> + Send>>;

/// Sends a validated query and exposes the answer as a chunk stream.
#[async_trait]
pub trait QueryTransport: Send + Sync + 'static {
    /// Issues the query. Fails with [`SubmitError::Network`] if the
    /// endpoint is unreachable and [`SubmitError::Backend`] if it responds
    /// with a non-success status.
    async fn query(&self, query: &Query) -> Result<QueryStream, SubmitError>;
}

/// HTTP transport posting `{session_id, prompt}` to the streaming proxy.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Builds a transport for the given proxy base URL. The query endpoint
    /// path (`/api/query`) is appended here.
    pub fn new(proxy_base_url: &str) -> Result<Self, SubmitError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SubmitError::Network(e.to_string()))?;
        Ok(HttpTransport {
            client,
            endpoint: format!("{}/api/query", proxy_base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn query(&self, query: &Query) -> Result<QueryStream, SubmitError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(query)
            .send()
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| extract_detail(&body))
                .unwrap_or_else(|| format!("query failed with status {}", status));
            return Err(SubmitError::Backend(detail));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| SubmitError::Network(e.to_string())));
        Ok(Box::pin(stream))
    }
}

/// Pulls a human-readable message out of a backend error body.
///
/// The backend wraps errors in a `detail` field that is either a plain
/// string or a structured object with a `description`; fall back to the
/// serialized detail if neither shape matches.
pub(crate) fn extract_detail(body: &serde_json::Value) -> Option<String> {
    let detail = body.get("detail")?;
    if let Some(s) = detail.as_str() {
        return Some(s.to_string());
    }
    if let Some(desc) = detail.get("description").and_then(|d| d.as_str()) {
        return Some(desc.to_string());
    }
    Some(detail.to_string())
}
