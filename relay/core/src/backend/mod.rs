//! Generation Backend Abstraction
//!
//! The relay treats text generation as an external capability behind
//! the [`GenerationBackend`] trait: streaming chat, one-shot generate,
//! embeddings, and model listing. The only bundled implementation
//! talks to a local Ollama server.

mod ollama;
mod traits;

pub use ollama::OllamaBackend;
pub use traits::{GenerateOptions, GenerationBackend};
