//! Streaming Infrastructure
//!
//! The bridge between a streaming backend call and the asynchronous
//! connection loop:
//!
//! ```text
//!  backend chat call ──► Generation Worker ──► Fragment Channel ──► drain loop
//!  (own task)            (normalizes the      (bounded FIFO,        (connection
//!                         terminal marker)     one per run)          task)
//! ```
//!
//! A [`Fragment`] is one incremental chunk of generated text or the
//! distinguished end-of-stream marker. The channel is created fresh
//! for each generation run and discarded after drain; the consuming
//! loop only ever suspends on channel reads, never on the backend call
//! itself.

mod fragment;
mod worker;

pub use fragment::{fragment_channel, Fragment, FRAGMENT_CHANNEL_CAPACITY};
pub use worker::{spawn_generation, GenerationRequest};
