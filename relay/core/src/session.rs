//! Session Management
//!
//! A session is the server-side conversation state for one live client
//! connection: an ordered, append-only history of role-tagged turns and
//! a two-state lifecycle flag.
//!
//! # Invariants
//!
//! - At most one generation run is in flight per session.
//!   [`Session::begin_generation`] enforces this by failing while the
//!   session is already [`SessionState::Generating`].
//! - Turns are immutable once appended, and the history is only
//!   appended to while a run is outstanding.
//! - Sessions are never persisted; they live exactly as long as the
//!   connection that owns them.

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Who produced a turn.
///
/// Serialized lowercase to match the Ollama chat API roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The connected client.
    User,
    /// The generation backend.
    Assistant,
    /// An injected context message (e.g. a history summary).
    System,
}

impl Role {
    /// Wire name of the role, as the chat API expects it.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One exchange unit in a conversation history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    /// Who sent this turn.
    pub role: Role,
    /// Turn content.
    pub content: String,
    /// When the turn was appended (Unix timestamp ms).
    pub timestamp: u64,
}

impl Turn {
    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_ms(),
        }
    }
}

/// Session lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No generation run in flight; ready for a prompt.
    Idle,
    /// A generation run is in flight; new prompts are rejected.
    Generating,
}

/// Conversation state for one live connection.
#[derive(Clone, Debug)]
pub struct Session {
    history: Vec<Turn>,
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a new idle session with empty history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            state: SessionState::Idle,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a generation run is in flight.
    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.state == SessionState::Generating
    }

    /// Transition to [`SessionState::Generating`].
    ///
    /// Fails with [`RelayError::Busy`] if a run is already in flight,
    /// keeping the one-prompt-at-a-time invariant explicit.
    pub fn begin_generation(&mut self) -> Result<(), RelayError> {
        if self.state == SessionState::Generating {
            return Err(RelayError::Busy);
        }
        self.state = SessionState::Generating;
        Ok(())
    }

    /// Append a turn to the history.
    pub fn push(&mut self, turn: Turn) {
        self.history.push(turn);
    }

    /// Append a user turn.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Turn::user(content));
    }

    /// Complete the current run: append the assistant turn with the
    /// accumulated response and return to [`SessionState::Idle`].
    pub fn complete_generation(&mut self, response: impl Into<String>) {
        self.history.push(Turn::assistant(response));
        self.state = SessionState::Idle;
    }

    /// Abort the current run without appending an assistant turn.
    pub fn fail_generation(&mut self) {
        self.state = SessionState::Idle;
    }

    /// The full conversation history, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Number of turns in the history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Current timestamp in milliseconds.
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
