//! Chunking and Embedding Similarity
//!
//! Splits extracted page text into overlapping word-window chunks,
//! embeds them alongside the query through the generation backend, and
//! ranks them by cosine similarity so only the most relevant chunks
//! reach the prompt.

use tracing::debug;

use crate::backend::GenerationBackend;

/// Split text into word chunks of `chunk_size` words, each overlapping
/// the previous chunk by `overlap` words.
#[must_use]
pub fn chunk_words(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    // An overlap at or above the chunk size would never advance.
    let overlap = overlap.min(chunk_size - 1);

    let mut chunks = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let start = if i > 0 { i - overlap } else { 0 };
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        i = start + chunk_size;
    }
    chunks
}

/// Cosine similarity of two vectors; 0.0 when either has no magnitude
/// or the lengths differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Rank chunks against the query by embedding similarity and join the
/// best `top_k` with newlines, in similarity order.
pub async fn top_chunks(
    backend: &dyn GenerationBackend,
    embed_model: &str,
    query: &str,
    chunks: &[String],
    top_k: usize,
) -> anyhow::Result<String> {
    let query_embedding = backend.embeddings(embed_model, query).await?;

    let mut scored: Vec<(f32, &String)> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let embedding = backend.embeddings(embed_model, chunk).await?;
        scored.push((cosine_similarity(&query_embedding, &embedding), chunk));
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    debug!(
        chunks = chunks.len(),
        kept = top_k.min(scored.len()),
        "ranked page chunks"
    );

    Ok(scored
        .into_iter()
        .take(top_k)
        .map(|(_, chunk)| chunk.as_str())
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::backend::GenerateOptions;
    use crate::session::Turn;
    use crate::stream::Fragment;

    #[test]
    fn test_chunking_covers_all_words() {
        let text = (0..250).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_words(&text, 100, 20);

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("w0 "));
        assert!(chunks[0].ends_with("w99"));
        // Second chunk overlaps the first by 20 words.
        assert!(chunks[1].starts_with("w80 "));
        assert!(chunks[2].ends_with("w249"));
    }

    #[test]
    fn test_chunking_short_text() {
        let chunks = chunk_words("just a few words", 100, 20);
        assert_eq!(chunks, vec!["just a few words".to_string()]);
    }

    #[test]
    fn test_chunking_degenerate_inputs() {
        assert!(chunk_words("", 100, 20).is_empty());
        assert!(chunk_words("words here", 0, 0).is_empty());
        // Overlap >= chunk size must still terminate.
        let chunks = chunk_words("a b c d e f", 2, 5);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    /// Embeds text as keyword counts so ranking is deterministic.
    struct KeywordBackend;

    #[async_trait]
    impl GenerationBackend for KeywordBackend {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn health_check(&self) -> bool {
            true
        }

        async fn chat_streaming(
            &self,
            _model: &str,
            _messages: &[Turn],
        ) -> anyhow::Result<mpsc::Receiver<Fragment>> {
            anyhow::bail!("not used")
        }

        async fn generate(
            &self,
            _model: &str,
            _prompt: &str,
            _options: &GenerateOptions,
        ) -> anyhow::Result<String> {
            anyhow::bail!("not used")
        }

        async fn embeddings(&self, _model: &str, prompt: &str) -> anyhow::Result<Vec<f32>> {
            let count = |word: &str| prompt.matches(word).count() as f32;
            Ok(vec![count("apple"), count("banana"), 1.0])
        }

        async fn list_models(&self) -> anyhow::Result<serde_json::Value> {
            anyhow::bail!("not used")
        }
    }

    #[tokio::test]
    async fn test_top_chunks_ranks_by_similarity() {
        let chunks = vec![
            "banana banana banana".to_string(),
            "apple apple apple".to_string(),
            "nothing relevant".to_string(),
        ];

        let best = top_chunks(&KeywordBackend, "embed", "apple pie", &chunks, 1)
            .await
            .unwrap();
        assert_eq!(best, "apple apple apple");
    }
}
