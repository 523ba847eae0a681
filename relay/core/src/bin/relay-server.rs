//! Relay Server
//!
//! Standalone relay process: serves the landing page, the model
//! catalog, and the persistent chat WebSocket, proxying generation to
//! a local Ollama instance.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (binds 0.0.0.0:8000, Ollama on localhost:11434)
//! relay-server
//!
//! # Pick a different model and enable URL context
//! RELAY_MODEL=mistral RELAY_EXTRACT_URLS=1 relay-server
//!
//! # With verbose logging
//! RUST_LOG=debug relay-server
//! ```
//!
//! # Environment Variables
//!
//! - `RELAY_CONFIG`: path to a TOML config file
//! - `RELAY_BIND`: listen address (default `0.0.0.0:8000`)
//! - `RELAY_MODEL`: default generation model
//! - `RELAY_EXTRACT_URLS`, `RELAY_HISTORY`, `RELAY_VERIFY`: pipeline toggles
//! - `OLLAMA_HOST` / `OLLAMA_PORT`: backend location
//! - `RUST_LOG`: log level (trace, debug, info, warn, error)
//!
//! # Signals
//!
//! - SIGTERM/SIGINT: graceful shutdown; open sockets are closed and
//!   in-flight generation runs are dropped.

use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};

use relay_core::backend::OllamaBackend;
use relay_core::server::{build_router, AppState};
use relay_core::{GenerationBackend, RelayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_server=info".parse()?)
                .add_directive("relay_core=info".parse()?),
        )
        .with_target(true)
        .init();

    info!("Starting relay server");
    info!("PID: {}", std::process::id());

    let config = Arc::new(RelayConfig::load());
    let backend = Arc::new(OllamaBackend::from_env());

    if backend.health_check().await {
        info!(backend = backend.name(), "backend reachable");
    } else {
        // Startup proceeds anyway; the client sees per-request errors
        // until the backend comes up.
        warn!(
            backend = backend.name(),
            "backend not reachable, requests will fail until it is"
        );
    }

    info!(
        bind = %config.bind_addr,
        model = %config.default_model,
        extract_urls = config.extract_urls,
        verify = config.verify_responses,
        "configuration loaded"
    );

    let state = Arc::new(AppState::new(backend, config.clone()));
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Relay server stopped");
    Ok(())
}

/// Resolve when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
