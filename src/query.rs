//! Core query data types and request validation.
//!
//! [`SessionHandle`] is the opaque capability returned by the extraction
//! endpoint after an upload; it binds every subsequent query to that
//! document. [`Query`] is the validated request record sent to the backend
//! (through the proxy) as `{"session_id": ..., "prompt": ...}`.
//!
//! Validation is pure — no I/O, no ambient state. The session handle is
//! passed in explicitly by the caller; nothing here reads the session store.

use serde::{Deserialize, Serialize};

use crate::error::SubmitError;

/// Opaque identifier for a previously uploaded document on the backend.
///
/// Created by the extraction endpoint, persisted by
/// [`SessionStore`](crate::session::SessionStore), and read-only until a
/// reset clears it. Treated as a capability, not a security boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        SessionHandle(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One validated query, constructed fresh per submission and never persisted.
///
/// Serializes to the backend's expected JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub session_id: SessionHandle,
    pub prompt: String,
}

impl Query {
    /// Validates inputs and constructs an immutable query record.
    ///
    /// Checks run in order: the session handle must be present and
    /// non-empty ([`SubmitError::NoSession`]), then the prompt must be
    /// non-empty after trimming ([`SubmitError::EmptyPrompt`]). The stored
    /// prompt is the trimmed text.
    pub fn build(session: Option<&SessionHandle>, prompt: &str) -> Result<Query, SubmitError> {
        let session = match session {
            Some(s) if !s.is_empty() => s,
            _ => return Err(SubmitError::NoSession),
        };

        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SubmitError::EmptyPrompt);
        }

        Ok(Query {
            session_id: session.clone(),
            prompt: prompt.to_string(),
        })
    }
}
