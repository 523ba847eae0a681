//! Post-Response Verifier
//!
//! Advisory factuality check run after a response is fully assembled.
//! Asks a grader model whether the generated document supports the
//! user's prompt, with deterministic decoding and a two-token output
//! budget. The result only ever adds a warning message; it never
//! blocks or mutates the response, and failures are swallowed by the
//! caller.

use std::sync::Arc;

use crate::backend::{GenerateOptions, GenerationBackend};

/// Advisory factuality checker.
#[derive(Clone)]
pub struct ResponseVerifier {
    backend: Arc<dyn GenerationBackend>,
    model: String,
}

impl ResponseVerifier {
    /// Create a verifier using the given grader model.
    pub fn new(backend: Arc<dyn GenerationBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Check whether `document` supports `claim`.
    ///
    /// Returns `Ok(true)` when the grader answers "yes". Deterministic
    /// decoding (temperature 0, two tokens) keeps the answer a bare
    /// yes/no.
    pub async fn verify(&self, claim: &str, document: &str) -> anyhow::Result<bool> {
        let prompt = format!("Document: {document}\nClaim: {claim}");
        let options = GenerateOptions {
            max_tokens: 2,
            temperature: 0.0,
        };

        let response = self.backend.generate(&self.model, &prompt, &options).await?;
        Ok(is_supported(&response))
    }
}

fn is_supported(response: &str) -> bool {
    response.trim().to_ascii_lowercase().starts_with("yes")
}
