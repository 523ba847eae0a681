//! Generation Backend Trait
//!
//! Interface boundary to the text-generation system. The relay core
//! never reaches past this trait: the streaming bridge, verifier, and
//! context enricher all talk to a `dyn GenerationBackend`.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::session::Turn;
use crate::stream::Fragment;

/// Decoding options for a one-shot generate call.
#[derive(Clone, Debug)]
pub struct GenerateOptions {
    /// Maximum tokens to produce (0 = backend default).
    pub max_tokens: u32,
    /// Sampling temperature; 0.0 is deterministic.
    pub temperature: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 0,
            temperature: 0.7,
        }
    }
}

/// A text-generation backend.
///
/// Implementations handle provider-specific wire formats; the relay
/// only depends on the ordering contract of `chat_streaming`: the
/// receiver yields fragments in emission order, ending with exactly
/// one terminal fragment ([`Fragment::Complete`] or
/// [`Fragment::Error`]) unless the implementation fails mid-stream
/// without one, which the generation worker normalizes.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Whether the backend is reachable.
    async fn health_check(&self) -> bool;

    /// Start a streaming chat completion over a message history.
    ///
    /// Returns a channel receiver yielding fragments as they arrive.
    async fn chat_streaming(
        &self,
        model: &str,
        messages: &[Turn],
    ) -> anyhow::Result<mpsc::Receiver<Fragment>>;

    /// One-shot, non-streaming generation. Used by the verifier.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> anyhow::Result<String>;

    /// Embed a text into a vector. Used for context similarity search.
    async fn embeddings(&self, model: &str, prompt: &str) -> anyhow::Result<Vec<f32>>;

    /// List available models, passed through untransformed.
    async fn list_models(&self) -> anyhow::Result<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_options_default() {
        let options = GenerateOptions::default();
        assert_eq!(options.max_tokens, 0);
        assert!((options.temperature - 0.7).abs() < f32::EPSILON);
    }
}
