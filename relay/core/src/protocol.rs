//! Connection Protocol
//!
//! Wire format for the persistent client connection.
//!
//! Client -> server: one JSON object per message, `{"model": optional,
//! "prompt": required}`.
//!
//! Server -> client: plain text frames. Zero or more raw response
//! fragments in backend order, then exactly one terminal frame: the
//! [`END_OF_MESSAGE`] sentinel on success or an `[ERROR]`-prefixed
//! frame on failure. A successful response may be followed by one
//! advisory `[WARNING]` frame from the post-response verifier. A
//! request received while a run is in flight is answered with a single
//! `[BUSY]` frame and the current stream continues undisturbed.

use serde::Deserialize;

use crate::error::RelayError;

/// Fixed literal marking successful end of a streamed response.
pub const END_OF_MESSAGE: &str = "[END_OF_MESSAGE]";

/// Prefix for a terminal error frame.
pub const ERROR_PREFIX: &str = "[ERROR] ";

/// Prefix for an advisory verifier warning frame.
pub const WARNING_PREFIX: &str = "[WARNING] ";

/// Frame rejecting a prompt while a run is already in flight.
pub const BUSY_MESSAGE: &str = "[BUSY] a response is already being generated";

/// A parsed client chat request.
#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    /// Model to use; falls back to the configured default when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// The prompt text. Required.
    pub prompt: String,
}

/// Parse a raw client message into a [`ChatRequest`].
pub fn parse_request(raw: &str) -> Result<ChatRequest, RelayError> {
    serde_json::from_str(raw).map_err(|e| RelayError::MalformedRequest(e.to_string()))
}

/// A server-to-client message, produced by the streaming bridge and
/// encoded to a text frame by the transport task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// One raw response fragment.
    Fragment(String),
    /// Successful end of the current response.
    EndOfMessage,
    /// Terminal failure of the current response.
    Error(String),
    /// Rejection of a prompt received while generating.
    Busy,
    /// Advisory verifier warning, sent after the sentinel.
    Warning(String),
}

impl Outbound {
    /// Encode as the text frame sent over the connection.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Outbound::Fragment(text) => text,
            Outbound::EndOfMessage => END_OF_MESSAGE.to_string(),
            Outbound::Error(reason) => format!("{ERROR_PREFIX}{reason}"),
            Outbound::Busy => BUSY_MESSAGE.to_string(),
            Outbound::Warning(text) => format!("{WARNING_PREFIX}{text}"),
        }
    }
}
