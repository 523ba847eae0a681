//! Streaming Bridge - Per-Connection Session Logic
//!
//! One [`ConnectionBridge`] exists per live connection. It owns the
//! connection's session handle and runs the request pipeline:
//!
//! ```text
//! raw message ─► parse ─► busy check ─► URL context ─► history policy
//!      ─► generation worker ─► fragment drain ─► outbound channel
//! ```
//!
//! The bridge is transport-agnostic: it emits [`Outbound`] messages
//! into a channel and the server task forwards them to the socket.
//! When the client disconnects, the outbound channel closes and any
//! still-running drain observes failed sends as no-ops, letting the
//! backend run finish without raising.
//!
//! # State machine
//!
//! `Idle ─(on_message)─► Generating ─(terminal fragment)─► Idle`.
//! A message received while `Generating` is answered with a busy frame
//! and does not start a second run.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::GenerationBackend;
use crate::config::{HistoryPolicy, RelayConfig};
use crate::context::ContextEnricher;
use crate::protocol::{self, Outbound};
use crate::registry::{ConnectionId, SessionHandle, SessionRegistry};
use crate::session::Turn;
use crate::stream::{spawn_generation, Fragment, GenerationRequest};
use crate::summarize::{HistorySummarizer, RecentTurns};
use crate::verify::ResponseVerifier;

/// Text of the advisory warning sent when verification fails.
const LOW_CONFIDENCE_WARNING: &str =
    "The previous response may not be factually supported by the prompt.";

/// Per-connection streaming bridge.
pub struct ConnectionBridge {
    id: ConnectionId,
    session: SessionHandle,
    registry: SessionRegistry,
    backend: Arc<dyn GenerationBackend>,
    config: Arc<RelayConfig>,
    enricher: Option<ContextEnricher>,
    verifier: Option<ResponseVerifier>,
    summarizer: Arc<dyn HistorySummarizer>,
    outbound: mpsc::Sender<Outbound>,
}

impl ConnectionBridge {
    /// Accept a new connection: registers a fresh session and wires up
    /// the optional pipeline stages from config.
    pub fn connect(
        registry: SessionRegistry,
        backend: Arc<dyn GenerationBackend>,
        config: Arc<RelayConfig>,
        outbound: mpsc::Sender<Outbound>,
    ) -> Self {
        let (id, session) = registry.create();

        let enricher = config
            .extract_urls
            .then(|| ContextEnricher::new(backend.clone(), config.embed_model.clone()));
        let verifier = config
            .verify_responses
            .then(|| ResponseVerifier::new(backend.clone(), config.verifier_model.clone()));
        let summarizer: Arc<dyn HistorySummarizer> = match config.history {
            HistoryPolicy::Summarized { max_turns } => Arc::new(RecentTurns::new(max_turns)),
            HistoryPolicy::Full => Arc::new(RecentTurns::default()),
        };

        Self {
            id,
            session,
            registry,
            backend,
            config,
            enricher,
            verifier,
            summarizer,
            outbound,
        }
    }

    /// This connection's identity.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Handle to this connection's session.
    #[must_use]
    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }

    /// Handle one raw client message.
    ///
    /// Parse failures and busy rejections are reported to the client
    /// and recovered locally; the connection stays open. A valid
    /// request starts a generation run whose fragments are drained to
    /// the outbound channel on a separate task, so this returns as
    /// soon as the run is started.
    pub async fn on_message(&self, raw: &str) {
        let request = match protocol::parse_request(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(conn = %self.id, error = %e, "rejecting message");
                let _ = self.outbound.send(Outbound::Error(e.to_string())).await;
                return;
            }
        };

        // Reserve the session before any slow work so a concurrent
        // prompt cannot interleave.
        if self.session.lock().begin_generation().is_err() {
            debug!(conn = %self.id, "rejecting prompt while generating");
            let _ = self.outbound.send(Outbound::Busy).await;
            return;
        }

        let model = request
            .model
            .unwrap_or_else(|| self.config.default_model.clone());
        let prompt = request.prompt;

        // Optional URL context; failures inside are non-fatal and the
        // effective prompt degrades to the raw prompt.
        let effective_prompt = match &self.enricher {
            Some(enricher) => enricher.enrich(&prompt).await,
            None => prompt.clone(),
        };

        let messages = self.build_messages(effective_prompt);
        info!(
            conn = %self.id,
            model = %model,
            turns = messages.len(),
            "starting generation run"
        );

        let receiver = spawn_generation(
            self.backend.clone(),
            GenerationRequest { model, messages },
        );

        let run = RunContext {
            id: self.id,
            session: self.session.clone(),
            outbound: self.outbound.clone(),
            verifier: self.verifier.clone(),
            claim: prompt,
        };
        tokio::spawn(async move {
            drain(run, receiver).await;
        });
    }

    /// Tear down on disconnect. A still-running worker is left to
    /// finish; its writes land in a closed channel and are dropped.
    pub fn on_disconnect(&self) {
        self.registry.remove(&self.id);
    }

    /// Apply the history policy and append the user turn.
    ///
    /// Full: the whole history including the new turn goes out.
    /// Summarized: a system turn with a bounded summary of prior turns
    /// plus the fresh user turn; the summary itself is never stored in
    /// the session, so later summaries draw from real turns.
    fn build_messages(&self, effective_prompt: String) -> Vec<Turn> {
        let mut session = self.session.lock();
        let user_turn = Turn::user(effective_prompt);

        match self.config.history {
            HistoryPolicy::Full => {
                session.push(user_turn);
                session.history().to_vec()
            }
            HistoryPolicy::Summarized { .. } => {
                let summary = self.summarizer.summarize(session.history());
                let mut messages = Vec::with_capacity(2);
                if !summary.is_empty() {
                    messages.push(Turn::system(summary));
                }
                messages.push(user_turn.clone());
                session.push(user_turn);
                messages
            }
        }
    }
}

/// Everything one drain task needs, detached from the bridge so the
/// bridge can keep serving (busy-rejecting) messages meanwhile.
struct RunContext {
    id: ConnectionId,
    session: SessionHandle,
    outbound: mpsc::Sender<Outbound>,
    verifier: Option<ResponseVerifier>,
    claim: String,
}

/// Drain one run's fragment channel to the client in arrival order.
async fn drain(run: RunContext, mut receiver: mpsc::Receiver<Fragment>) {
    let mut response = String::new();
    // Flips false when the client goes away; from then on forwarding
    // is a no-op while the run is allowed to finish.
    let mut connected = true;

    while let Some(fragment) = receiver.recv().await {
        match fragment {
            Fragment::Chunk(text) => {
                response.push_str(&text);
                if connected
                    && run
                        .outbound
                        .send(Outbound::Fragment(text))
                        .await
                        .is_err()
                {
                    debug!(conn = %run.id, "client gone, dropping further writes");
                    connected = false;
                }
            }
            Fragment::Complete => {
                run.session.lock().complete_generation(response.clone());
                debug!(conn = %run.id, bytes = response.len(), "generation run complete");
                if connected {
                    if run.outbound.send(Outbound::EndOfMessage).await.is_err() {
                        return;
                    }
                    verify_and_warn(&run, &response).await;
                }
                return;
            }
            Fragment::Error(reason) => {
                warn!(conn = %run.id, reason = %reason, "generation run failed");
                run.session.lock().fail_generation();
                if connected {
                    let _ = run.outbound.send(Outbound::Error(reason)).await;
                }
                return;
            }
        }
    }

    // The worker guarantees a terminal fragment, so a bare close means
    // its task was torn down; reset state so the session can retry.
    warn!(conn = %run.id, "fragment channel closed without terminal marker");
    run.session.lock().fail_generation();
}

/// Run the advisory verifier and send at most one warning frame.
/// Verifier failure is swallowed: no warning, run already succeeded.
async fn verify_and_warn(run: &RunContext, response: &str) {
    let Some(verifier) = &run.verifier else {
        return;
    };

    match verifier.verify(&run.claim, response).await {
        Ok(true) => {}
        Ok(false) => {
            info!(conn = %run.id, "verifier flagged response");
            let _ = run
                .outbound
                .send(Outbound::Warning(LOW_CONFIDENCE_WARNING.to_string()))
                .await;
        }
        Err(e) => {
            warn!(conn = %run.id, error = %e, "verifier unavailable, skipping warning");
        }
    }
}
