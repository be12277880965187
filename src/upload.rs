//! Upload client for the backend extraction endpoint.
//!
//! Posts a document as multipart form data to
//! `POST {base}/api/extraction/process` and returns the backend's outcome,
//! including the session handle that binds subsequent queries to the
//! document. Extraction itself — and the upload widget's file-type/size
//! policy — belongs to the backend; the only local check is that the path
//! is readable.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::query::SessionHandle;
use crate::transport::extract_detail;

/// Successful extraction outcome from the backend.
#[derive(Debug, Deserialize)]
pub struct UploadOutcome {
    pub status: String,
    pub description: String,
    pub session_id: SessionHandle,
}

/// Uploads one document and returns the extraction outcome.
///
/// # Errors
///
/// Fails if the file cannot be read, the backend is unreachable, or the
/// backend responds with a non-success status (its `detail` field becomes
/// the error message).
pub async fn upload_document(backend_base_url: &str, path: &Path) -> Result<UploadOutcome> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
    let form = reqwest::multipart::Form::new().part("file", part);

    let url = format!(
        "{}/api/extraction/process",
        backend_base_url.trim_end_matches('/')
    );

    let client = reqwest::Client::new();
    let response = client
        .post(&url)
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("Failed to reach backend at {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| extract_detail(&body))
            .unwrap_or_else(|| format!("upload failed with status {}", status));
        anyhow::bail!("Upload rejected: {}", detail);
    }

    let outcome: UploadOutcome = response
        .json()
        .await
        .context("Invalid extraction response from backend")?;

    if outcome.session_id.is_empty() {
        anyhow::bail!("Backend returned an empty session id");
    }

    Ok(outcome)
}
