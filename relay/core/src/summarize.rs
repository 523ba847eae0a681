//! History Summarization
//!
//! Strategy seam for the summarized history policy. The contract is
//! deliberately loose: a summarizer produces a bounded-length text
//! representative of prior turns, with no fidelity guarantee. The
//! default implementation concatenates recent turns with role labels
//! under a byte cap; a model-backed summarizer can slot in behind the
//! same trait.

use crate::session::{Role, Turn};

/// Produces a bounded-length text representative of prior turns.
pub trait HistorySummarizer: Send + Sync {
    /// Summarize a conversation history, oldest first.
    ///
    /// Returns an empty string when there is nothing to summarize.
    /// The output length is bounded regardless of history size.
    fn summarize(&self, history: &[Turn]) -> String;
}

/// Default summarizer: role-labelled concatenation of the trailing
/// turns, truncated to a byte cap.
#[derive(Clone, Debug)]
pub struct RecentTurns {
    /// How many trailing turns to include.
    pub max_turns: usize,
    /// Hard cap on the summary size in bytes.
    pub max_bytes: usize,
}

impl RecentTurns {
    /// Create a summarizer over the last `max_turns` turns.
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            max_bytes: 4096,
        }
    }
}

impl Default for RecentTurns {
    fn default() -> Self {
        Self::new(6)
    }
}

impl HistorySummarizer for RecentTurns {
    fn summarize(&self, history: &[Turn]) -> String {
        if history.is_empty() || self.max_turns == 0 {
            return String::new();
        }

        let start = history.len().saturating_sub(self.max_turns);
        let mut summary = String::from("Summary of the conversation so far:\n");
        for turn in &history[start..] {
            let label = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            summary.push_str(label);
            summary.push_str(": ");
            summary.push_str(&turn.content);
            summary.push('\n');
        }

        truncate_to_boundary(&mut summary, self.max_bytes);
        summary
    }
}

/// Truncate in place to at most `max_bytes`, on a char boundary.
fn truncate_to_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history_summarizes_to_nothing() {
        let summarizer = RecentTurns::default();
        assert_eq!(summarizer.summarize(&[]), "");
    }

    #[test]
    fn test_keeps_only_trailing_turns() {
        let summarizer = RecentTurns::new(2);
        let history = vec![
            Turn::user("first"),
            Turn::assistant("second"),
            Turn::user("third"),
        ];

        let summary = summarizer.summarize(&history);
        assert!(!summary.contains("first"));
        assert!(summary.contains("Assistant: second"));
        assert!(summary.contains("User: third"));
    }

    #[test]
    fn test_output_is_bounded() {
        let summarizer = RecentTurns {
            max_turns: 10,
            max_bytes: 64,
        };
        let history = vec![Turn::user("x".repeat(1000))];

        let summary = summarizer.summarize(&history);
        assert!(summary.len() <= 64);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let mut text = "héllo wörld".repeat(20);
        truncate_to_boundary(&mut text, 33);
        assert!(text.len() <= 33);
        // Still valid UTF-8 by construction; just make sure we kept something.
        assert!(!text.is_empty());
    }
}
