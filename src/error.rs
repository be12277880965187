//! Submission error taxonomy.
//!
//! Every way a single query submission can fail, as a typed enum so the
//! submission controller and the presentation layer can match on the
//! category rather than string-compare messages.
//!
//! | Variant | Detected | Network call made? |
//! |---------|----------|--------------------|
//! | [`SubmitError::NoSession`] | before validation completes | no |
//! | [`SubmitError::EmptyPrompt`] | before validation completes | no |
//! | [`SubmitError::Backend`] | non-success response from the backend | yes |
//! | [`SubmitError::Network`] | transport failure reaching proxy or backend | yes |
//!
//! A stream that ends with an unterminated non-frame fragment is not an
//! error at all: the frame parser discards the fragment silently (see
//! [`crate::frame::FrameParser::finish`]).
//!
//! There are no automatic retries anywhere; every failure is terminal for
//! that submission and requires a fresh user-initiated submit.

use thiserror::Error;

/// Terminal failure categories for one query submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// No document session is active. Upload a document first.
    #[error("no active document session; upload a document first")]
    NoSession,

    /// The prompt was empty after trimming whitespace.
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// The backend rejected the query; carries the backend's error detail.
    #[error("backend error: {0}")]
    Backend(String),

    /// The proxy or backend could not be reached, or the stream broke
    /// mid-flight.
    #[error("network error: {0}")]
    Network(String),
}

impl SubmitError {
    /// True for failures detected by validation, before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, SubmitError::NoSession | SubmitError::EmptyPrompt)
    }
}
