//! Generation Worker
//!
//! Runs one streaming backend call on its own task and republishes its
//! output into a fresh fragment channel. The worker is the only
//! producer for that channel and guarantees the terminal-marker
//! contract regardless of how the backend misbehaves:
//!
//! - the initial call fails: one [`Fragment::Error`] is pushed;
//! - the backend errors mid-stream: its error fragment is forwarded
//!   and nothing follows it;
//! - the backend stream closes without a terminal fragment: a
//!   synthesized [`Fragment::Error`] is pushed.
//!
//! The worker never touches the network connection and never brings
//! down the process on backend failure. If the consumer disappears,
//! sends fail and the task winds down quietly.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backend::GenerationBackend;
use crate::session::Turn;
use crate::stream::fragment::{fragment_channel, Fragment};

/// One prompt's worth of work for the backend.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// Model identifier.
    pub model: String,
    /// Message history to send, oldest first.
    pub messages: Vec<Turn>,
}

/// Spawn a generation worker for one run.
///
/// Returns the consumer end of the run's fragment channel. Exactly one
/// terminal fragment will arrive, always last.
pub fn spawn_generation(
    backend: Arc<dyn GenerationBackend>,
    request: GenerationRequest,
) -> mpsc::Receiver<Fragment> {
    let (tx, rx) = fragment_channel();

    tokio::spawn(async move {
        run(backend, request, tx).await;
    });

    rx
}

async fn run(
    backend: Arc<dyn GenerationBackend>,
    request: GenerationRequest,
    tx: mpsc::Sender<Fragment>,
) {
    let mut source = match backend
        .chat_streaming(&request.model, &request.messages)
        .await
    {
        Ok(source) => source,
        Err(e) => {
            warn!(model = %request.model, error = %e, "backend call failed");
            let _ = tx.send(Fragment::Error(e.to_string())).await;
            return;
        }
    };

    let mut fragments = 0u64;
    while let Some(fragment) = source.recv().await {
        let terminal = fragment.is_terminal();
        if !terminal {
            fragments += 1;
        }
        if tx.send(fragment).await.is_err() {
            // Consumer is gone; drop the rest of the run on the floor.
            debug!(model = %request.model, "fragment consumer dropped, abandoning run");
            return;
        }
        if terminal {
            debug!(model = %request.model, fragments, "generation run finished");
            return;
        }
    }

    // Backend stream closed without a terminal marker.
    warn!(model = %request.model, fragments, "backend stream ended without completion marker");
    let _ = tx
        .send(Fragment::Error(
            "stream ended without completion marker".to_string(),
        ))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    /// Backend that hands out pre-scripted fragment streams.
    struct ScriptedBackend {
        scripts: Mutex<Vec<ScriptedRun>>,
    }

    enum ScriptedRun {
        Fragments(Vec<Fragment>),
        CallFails(String),
        ClosesWithoutTerminal(Vec<Fragment>),
    }

    impl ScriptedBackend {
        fn new(scripts: Vec<ScriptedRun>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts),
            })
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> bool {
            true
        }

        async fn chat_streaming(
            &self,
            _model: &str,
            _messages: &[Turn],
        ) -> anyhow::Result<mpsc::Receiver<Fragment>> {
            let script = self.scripts.lock().await.remove(0);
            match script {
                ScriptedRun::CallFails(reason) => anyhow::bail!(reason),
                ScriptedRun::Fragments(fragments)
                | ScriptedRun::ClosesWithoutTerminal(fragments) => {
                    let (tx, rx) = fragment_channel();
                    tokio::spawn(async move {
                        for fragment in fragments {
                            if tx.send(fragment).await.is_err() {
                                return;
                            }
                        }
                        // Dropping tx closes the stream.
                    });
                    Ok(rx)
                }
            }
        }

        async fn generate(
            &self,
            _model: &str,
            _prompt: &str,
            _options: &crate::backend::GenerateOptions,
        ) -> anyhow::Result<String> {
            Ok(String::new())
        }

        async fn embeddings(&self, _model: &str, _prompt: &str) -> anyhow::Result<Vec<f32>> {
            Ok(Vec::new())
        }

        async fn list_models(&self) -> anyhow::Result<serde_json::Value> {
            Ok(serde_json::json!({"models": []}))
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "test".to_string(),
            messages: vec![Turn::user("hi")],
        }
    }

    async fn collect(mut rx: mpsc::Receiver<Fragment>) -> Vec<Fragment> {
        let mut out = Vec::new();
        while let Some(fragment) = rx.recv().await {
            out.push(fragment);
        }
        out
    }

    #[tokio::test]
    async fn test_forwards_fragments_in_order() {
        let backend = ScriptedBackend::new(vec![ScriptedRun::Fragments(vec![
            Fragment::Chunk("a".into()),
            Fragment::Chunk("b".into()),
            Fragment::Complete,
        ])]);

        let received = collect(spawn_generation(backend, request())).await;
        assert_eq!(
            received,
            vec![
                Fragment::Chunk("a".into()),
                Fragment::Chunk("b".into()),
                Fragment::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_call_failure_becomes_error_terminal() {
        let backend =
            ScriptedBackend::new(vec![ScriptedRun::CallFails("model not found".into())]);

        let received = collect(spawn_generation(backend, request())).await;
        assert_eq!(received, vec![Fragment::Error("model not found".into())]);
    }

    #[tokio::test]
    async fn test_missing_terminal_is_synthesized() {
        let backend = ScriptedBackend::new(vec![ScriptedRun::ClosesWithoutTerminal(vec![
            Fragment::Chunk("partial".into()),
        ])]);

        let received = collect(spawn_generation(backend, request())).await;
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], Fragment::Chunk("partial".into()));
        assert!(matches!(received[1], Fragment::Error(_)));
    }

    #[tokio::test]
    async fn test_mid_stream_error_is_last() {
        let backend = ScriptedBackend::new(vec![ScriptedRun::Fragments(vec![
            Fragment::Chunk("a".into()),
            Fragment::Chunk("b".into()),
            Fragment::Error("connection reset".into()),
        ])]);

        let received = collect(spawn_generation(backend, request())).await;
        assert_eq!(received.len(), 3);
        assert!(received[2].is_terminal());
        assert_eq!(
            received
                .iter()
                .filter(|fragment| fragment.is_terminal())
                .count(),
            1
        );
    }
}
