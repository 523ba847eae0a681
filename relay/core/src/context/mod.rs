//! Prompt Context Enrichment
//!
//! Optional pipeline stage that resolves resource references embedded
//! in a prompt: URLs are detected, the pages fetched and reduced to
//! clean text, the text chunked and ranked by embedding similarity
//! against the prompt, and the best chunks appended to the effective
//! prompt sent to the backend.
//!
//! Every step is best-effort. A failing reference is logged and
//! skipped; it never aborts the request, and the run proceeds with
//! whatever context was gathered (possibly none).

mod fetch;
mod similarity;

pub use fetch::extract_page_text;
pub use similarity::{chunk_words, cosine_similarity};

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::backend::GenerationBackend;
use crate::error::RelayError;

/// Words per page chunk.
const CHUNK_SIZE: usize = 100;
/// Word overlap between consecutive chunks.
const CHUNK_OVERLAP: usize = 20;
/// How many best-matching chunks to keep per page.
const TOP_CHUNKS: usize = 5;
/// Cap on extracted page text before chunking.
const MAX_PAGE_BYTES: usize = 12_000;

/// Find URLs embedded in a prompt.
#[must_use]
pub fn extract_urls(text: &str) -> Vec<String> {
    static URL_PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = URL_PATTERN
        .get_or_init(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("valid URL regex"));

    pattern
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
        .filter(|candidate| url::Url::parse(candidate).is_ok())
        .collect()
}

/// Fetches referenced pages and narrows them to prompt-relevant text.
#[derive(Clone)]
pub struct ContextEnricher {
    backend: Arc<dyn GenerationBackend>,
    embed_model: String,
    http_client: reqwest::Client,
}

impl ContextEnricher {
    /// Create an enricher that embeds with the given model.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be constructed, which only
    /// happens with a broken TLS environment at process start.
    pub fn new(backend: Arc<dyn GenerationBackend>, embed_model: impl Into<String>) -> Self {
        Self {
            backend,
            embed_model: embed_model.into(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .user_agent("ollama-relay/0.1")
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Build the effective prompt: the original prompt plus relevant
    /// context for each resolvable URL it mentions.
    pub async fn enrich(&self, prompt: &str) -> String {
        let urls = extract_urls(prompt);
        if urls.is_empty() {
            return prompt.to_string();
        }

        let mut effective = prompt.to_string();
        for url in urls {
            match self.context_for(&url, prompt).await {
                Ok(context) if !context.is_empty() => {
                    debug!(url = %url, bytes = context.len(), "attached page context");
                    effective.push_str("\n\nContext from ");
                    effective.push_str(&url);
                    effective.push_str(":\n");
                    effective.push_str(&context);
                }
                Ok(_) => {
                    debug!(url = %url, "page yielded no text content");
                }
                Err(e) => {
                    // Non-fatal: the run continues with the prompt as-is.
                    let e = RelayError::Extraction(format!("{url}: {e}"));
                    warn!(error = %e, "skipping reference");
                }
            }
        }
        effective
    }

    /// Fetch one page and reduce it to the chunks most similar to the
    /// query. Falls back to the leading page text when the embedding
    /// ranking is unavailable.
    async fn context_for(&self, url: &str, query: &str) -> anyhow::Result<String> {
        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP {} fetching page", response.status());
        }
        let html = response.text().await?;

        let mut text = extract_page_text(&html);
        if text.len() > MAX_PAGE_BYTES {
            let mut cut = MAX_PAGE_BYTES;
            while cut > 0 && !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        if text.is_empty() {
            return Ok(String::new());
        }

        let chunks = chunk_words(&text, CHUNK_SIZE, CHUNK_OVERLAP);
        if chunks.len() <= TOP_CHUNKS {
            return Ok(chunks.join("\n"));
        }

        match similarity::top_chunks(
            self.backend.as_ref(),
            &self.embed_model,
            query,
            &chunks,
            TOP_CHUNKS,
        )
        .await
        {
            Ok(best) => Ok(best),
            Err(e) => {
                warn!(url = %url, error = %e, "similarity ranking unavailable, using leading text");
                Ok(chunks.into_iter().take(TOP_CHUNKS).collect::<Vec<_>>().join("\n"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_urls() {
        let urls = extract_urls("see https://example.com/page and http://other.org/a?b=c.");
        assert_eq!(
            urls,
            vec![
                "https://example.com/page".to_string(),
                "http://other.org/a?b=c".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_urls_none() {
        assert!(extract_urls("no links here").is_empty());
        assert!(extract_urls("ftp://not.http/scheme").is_empty());
    }

    #[test]
    fn test_extract_urls_strips_trailing_punctuation() {
        let urls = extract_urls("read https://example.com/docs, then reply");
        assert_eq!(urls, vec!["https://example.com/docs".to_string()]);
    }
}
