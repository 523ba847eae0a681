//! Relay Error Taxonomy
//!
//! Typed errors for the relay core. Each variant maps to a recovery
//! policy:
//!
//! - [`RelayError::MalformedRequest`]: logged, connection stays open,
//!   the client may retry.
//! - [`RelayError::Busy`]: a run is already in flight for the session;
//!   the new request is rejected, the current stream is undisturbed.
//! - [`RelayError::Backend`]: surfaced to the client as a terminal
//!   error marker on the current response; the session returns to idle.
//! - [`RelayError::Extraction`]: recovered locally, logged only.
//! - [`RelayError::Verifier`]: swallowed, treated as "no warning".
//! - [`RelayError::Transport`]: terminal for that connection only.

use thiserror::Error;

/// Errors produced by the relay core.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Client message was unparseable or missing a required field.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A generation run is already in flight for this session.
    #[error("a generation run is already in progress")]
    Busy,

    /// The generation backend failed before or during streaming.
    #[error("backend error: {0}")]
    Backend(String),

    /// A content-extraction step failed for one resource reference.
    #[error("content extraction failed: {0}")]
    Extraction(String),

    /// The advisory factuality check failed.
    #[error("verifier call failed: {0}")]
    Verifier(String),

    /// The client connection broke.
    #[error("transport error: {0}")]
    Transport(String),
}
