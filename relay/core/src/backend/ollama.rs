//! Ollama Backend Implementation
//!
//! Talks to a local Ollama server over its REST API:
//!
//! - `/api/chat` - streaming chat completions over a message history
//! - `/api/generate` - one-shot completions (used by the verifier)
//! - `/api/embeddings` - text embeddings (used by context similarity)
//! - `/api/tags` - list available models
//!
//! Streaming responses are newline-delimited JSON; each line carries a
//! `message.content` delta and a `done` flag.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use super::traits::{GenerateOptions, GenerationBackend};
use crate::session::Turn;
use crate::stream::{fragment_channel, Fragment};

/// Ollama backend client.
#[derive(Clone)]
pub struct OllamaBackend {
    /// Host address.
    host: String,
    /// Port number.
    port: u16,
    /// HTTP client.
    http_client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be constructed, which only
    /// happens with a broken TLS environment at process start.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Create from environment variables (`OLLAMA_HOST`,
    /// `OLLAMA_PORT`), defaulting to `localhost:11434`.
    #[must_use]
    pub fn from_env() -> Self {
        let host =
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port: u16 = std::env::var("OLLAMA_PORT")
            .unwrap_or_else(|_| "11434".to_string())
            .parse()
            .unwrap_or(11434);

        Self::new(host, port)
    }

    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url())
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url())
    }

    fn embeddings_url(&self) -> String {
        format!("{}/api/embeddings", self.base_url())
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url())
    }

    /// Message history in the chat API's wire shape.
    fn wire_messages(messages: &[Turn]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|turn| {
                serde_json::json!({
                    "role": turn.role.as_str(),
                    "content": turn.content,
                })
            })
            .collect()
    }

    fn wire_options(options: &GenerateOptions) -> serde_json::Value {
        let mut wire = serde_json::Map::new();
        if options.max_tokens > 0 {
            wire.insert(
                "num_predict".to_string(),
                serde_json::json!(options.max_tokens),
            );
        }
        wire.insert(
            "temperature".to_string(),
            serde_json::json!(options.temperature),
        );
        serde_json::Value::Object(wire)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new("localhost", 11434)
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }

    async fn chat_streaming(
        &self,
        model: &str,
        messages: &[Turn],
    ) -> anyhow::Result<mpsc::Receiver<Fragment>> {
        let json_request = serde_json::json!({
            "model": model,
            "messages": Self::wire_messages(messages),
            "stream": true,
        });

        let response = self
            .http_client
            .post(self.chat_url())
            .json(&json_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {body}");
        }

        let (tx, rx) = fragment_channel();
        let mut stream = response.bytes_stream();

        // Parse the NDJSON stream on its own task so the caller only
        // ever waits on channel reads.
        tokio::spawn(async move {
            let mut buffer = String::new();

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].trim();
                            if !line.is_empty() {
                                if let Ok(data) = serde_json::from_str::<serde_json::Value>(line) {
                                    if let Some(content) = data
                                        .get("message")
                                        .and_then(|m| m.get("content"))
                                        .and_then(|c| c.as_str())
                                    {
                                        if !content.is_empty()
                                            && tx
                                                .send(Fragment::Chunk(content.to_string()))
                                                .await
                                                .is_err()
                                        {
                                            // Receiver dropped, stop streaming.
                                            return;
                                        }
                                    }

                                    if let Some(error) =
                                        data.get("error").and_then(|e| e.as_str())
                                    {
                                        let _ =
                                            tx.send(Fragment::Error(error.to_string())).await;
                                        return;
                                    }

                                    if data
                                        .get("done")
                                        .and_then(serde_json::Value::as_bool)
                                        .unwrap_or(false)
                                    {
                                        let _ = tx.send(Fragment::Complete).await;
                                        return;
                                    }
                                }
                            }
                            buffer = buffer[pos + 1..].to_string();
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Fragment::Error(e.to_string())).await;
                        return;
                    }
                }
            }
            // Stream ended without a done marker; the worker upstream
            // synthesizes the error terminal when the channel closes.
        });

        Ok(rx)
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> anyhow::Result<String> {
        let json_request = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": Self::wire_options(options),
        });

        let response = self
            .http_client
            .post(self.generate_url())
            .json(&json_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {body}");
        }

        let data: serde_json::Value = response.json().await?;
        Ok(data
            .get("response")
            .and_then(|r| r.as_str())
            .unwrap_or("")
            .to_string())
    }

    async fn embeddings(&self, model: &str, prompt: &str) -> anyhow::Result<Vec<f32>> {
        let json_request = serde_json::json!({
            "model": model,
            "prompt": prompt,
        });

        let response = self
            .http_client
            .post(self.embeddings_url())
            .json(&json_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {body}");
        }

        let data: serde_json::Value = response.json().await?;
        let embedding = data
            .get("embedding")
            .and_then(|e| e.as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect::<Vec<f32>>()
            })
            .unwrap_or_default();

        if embedding.is_empty() {
            anyhow::bail!("Ollama returned no embedding for model {model}");
        }
        Ok(embedding)
    }

    async fn list_models(&self) -> anyhow::Result<serde_json::Value> {
        let response = self
            .http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {body}");
        }

        // Pass-through: the /models endpoint exposes this unchanged.
        Ok(response.json().await?)
    }
}
