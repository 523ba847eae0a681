//! HTTP/WebSocket Transport
//!
//! The outer surface of the relay:
//!
//! - `GET /`        landing page from the public directory
//! - `GET /assets`  static assets
//! - `GET /models`  passthrough of the backend model catalog
//! - `GET /ws`      the persistent chat connection
//!
//! Each accepted WebSocket gets a [`ConnectionBridge`] plus a writer
//! task that encodes [`Outbound`] messages to text frames. The read
//! loop and the writer are independent, so streamed fragments keep
//! flowing while the client types.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::backend::GenerationBackend;
use crate::bridge::ConnectionBridge;
use crate::config::RelayConfig;
use crate::protocol::Outbound;
use crate::registry::SessionRegistry;

/// Buffered outbound frames per connection. Fragments are small, so a
/// slow client only briefly backpressures its own drain task.
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// Shared state handed to every handler.
pub struct AppState {
    registry: SessionRegistry,
    backend: Arc<dyn GenerationBackend>,
    config: Arc<RelayConfig>,
}

impl AppState {
    /// Bundle the process-wide pieces the handlers need.
    pub fn new(backend: Arc<dyn GenerationBackend>, config: Arc<RelayConfig>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            backend,
            config,
        }
    }

    /// The live-session registry.
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

/// Build the relay router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let public_dir = state.config.public_dir.clone();

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/models", get(models_handler))
        .route_service("/", ServeFile::new(public_dir.join("index.html")))
        .nest_service("/assets", ServeDir::new(public_dir.join("assets")))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Passthrough of the backend's model catalog, shape untouched.
async fn models_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.backend.list_models().await {
        Ok(catalog) => Json(catalog).into_response(),
        Err(e) => {
            warn!(error = %e, "model catalog unavailable");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Upgrade to a WebSocket and hand the socket to the bridge.
async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Run one connection to completion.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut source) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(OUTBOUND_CHANNEL_CAPACITY);

    // Sole writer to the socket. Exits when the socket drops or every
    // producer is gone.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sink.send(Message::Text(message.into_text())).await.is_err() {
                break;
            }
        }
    });

    let bridge = ConnectionBridge::connect(
        state.registry.clone(),
        state.backend.clone(),
        state.config.clone(),
        outbound_tx,
    );
    info!(conn = %bridge.id(), "client connected");

    while let Some(Ok(message)) = source.next().await {
        match message {
            Message::Text(text) => bridge.on_message(&text).await,
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are ignored.
            _ => {}
        }
    }

    bridge.on_disconnect();
    info!(conn = %bridge.id(), "client disconnected");

    // Closing the receiver turns any in-flight drain's writes into
    // no-ops; the generation run itself is left to finish.
    writer.abort();
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::backend::GenerateOptions;
    use crate::session::Turn;
    use crate::stream::Fragment;

    struct CatalogBackend;

    #[async_trait]
    impl GenerationBackend for CatalogBackend {
        fn name(&self) -> &str {
            "catalog"
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

        async fn embeddings(&self, _model: &str, _prompt: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("not used")
        }

        async fn list_models(&self) -> anyhow::Result<serde_json::Value> {
            Ok(serde_json::json!({ "models": [{ "name": "llama3.2" }] }))
        }
    }

    #[test]
    fn test_router_builds() {
        let state = Arc::new(AppState::new(
            Arc::new(CatalogBackend),
            Arc::new(RelayConfig::default()),
        ));
        let _router = build_router(state.clone());
        assert!(state.registry().is_empty());
    }

    #[tokio::test]
    async fn test_models_passthrough_preserves_shape() {
        let state = Arc::new(AppState::new(
            Arc::new(CatalogBackend),
            Arc::new(RelayConfig::default()),
        ));

        let response = models_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["models"][0]["name"], "llama3.2");
    }
}
