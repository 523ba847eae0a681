//! Relay Core - Streaming Chat Relay for Ollama
//!
//! This crate implements a small relay server that sits between browser
//! clients and a local Ollama instance: clients hold one persistent
//! WebSocket each, prompts go in as JSON, and the model's response
//! streams back token by token, terminated by a fixed sentinel frame.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Browser Client                        │
//! │            JSON prompt ──►        ◄── text fragments          │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 │ WebSocket
//! ┌───────────────────────────────┼──────────────────────────────┐
//! │                          RELAY SERVER                         │
//! │  ┌───────────────────────────┴────────────────────────────┐  │
//! │  │  server (axum)  ──►  ConnectionBridge  (per session)   │  │
//! │  │                        │         ▲                     │  │
//! │  │      context ◄─────────┤         │ Fragment channel    │  │
//! │  │      (URL fetch)       ▼         │                     │  │
//! │  │                 generation worker ── verify (advisory) │  │
//! │  └────────────────────────┬───────────────────────────────┘  │
//! └───────────────────────────┼──────────────────────────────────┘
//!                             │ HTTP (NDJSON stream)
//!                       ┌─────┴─────┐
//!                       │  Ollama   │
//!                       └───────────┘
//! ```
//!
//! # Key Types
//!
//! - [`bridge::ConnectionBridge`]: per-connection request pipeline
//! - [`session::Session`]: conversation history plus lifecycle state
//! - [`registry::SessionRegistry`]: live sessions keyed by connection
//! - [`backend::GenerationBackend`]: the model backend seam
//! - [`stream::Fragment`]: unit of the backend-to-client stream
//! - [`protocol::Outbound`]: server-to-client frame encoding
//!
//! # Guarantees
//!
//! - Fragments reach the client in backend order.
//! - Every run ends in exactly one terminal frame: the end-of-message
//!   sentinel or an error frame.
//! - One generation run per session at a time; concurrent prompts are
//!   rejected with a busy frame, never interleaved.
//! - A disconnect mid-stream never tears down the process; the run
//!   finishes against a closed channel.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod bridge;
pub mod config;
pub mod context;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stream;
pub mod summarize;
pub mod verify;

pub use backend::{GenerationBackend, OllamaBackend};
pub use bridge::ConnectionBridge;
pub use config::{HistoryPolicy, RelayConfig};
pub use error::RelayError;
pub use protocol::{ChatRequest, Outbound, END_OF_MESSAGE};
pub use registry::{ConnectionId, SessionHandle, SessionRegistry};
pub use server::{build_router, AppState};
pub use session::{Role, Session, SessionState, Turn};
pub use stream::{Fragment, GenerationRequest};
