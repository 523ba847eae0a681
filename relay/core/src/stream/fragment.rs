//! Fragment Channel
//!
//! Bounded, ordered, single-producer/single-consumer queue carrying
//! generated text from the generation worker to the connection's drain
//! loop.
//!
//! # Ordering contract
//!
//! FIFO, exactly matching backend emission order: no loss, no
//! duplication, no reordering. Exactly one terminal fragment is pushed
//! per generation run, always last.

use tokio::sync::mpsc;

/// High-watermark capacity of one run's fragment channel.
///
/// A generation run is single-shot and finite, so the producer only
/// backpressures briefly when the consumer falls behind a slow client.
pub const FRAGMENT_CHANNEL_CAPACITY: usize = 256;

/// One item in a generation run's output stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    /// An incremental chunk of generated text.
    Chunk(String),
    /// Terminal marker: the run completed normally. The full response
    /// is the in-order concatenation of the preceding chunks; the
    /// drain loop owns that accumulation.
    Complete,
    /// Terminal marker: the run failed after zero or more chunks.
    Error(String),
}

impl Fragment {
    /// Whether this fragment ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Fragment::Complete | Fragment::Error(_))
    }
}

/// Create a fragment channel for one generation run.
#[must_use]
pub fn fragment_channel() -> (mpsc::Sender<Fragment>, mpsc::Receiver<Fragment>) {
    mpsc::channel(FRAGMENT_CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_fragments() {
        assert!(!Fragment::Chunk("hi".into()).is_terminal());
        assert!(Fragment::Complete.is_terminal());
        assert!(Fragment::Error("boom".into()).is_terminal());
    }

    #[tokio::test]
    async fn test_channel_preserves_order() {
        let (tx, mut rx) = fragment_channel();

        for i in 0..10 {
            tx.send(Fragment::Chunk(format!("chunk-{i}"))).await.unwrap();
        }
        tx.send(Fragment::Complete).await.unwrap();
        drop(tx);

        let mut received = Vec::new();
        while let Some(fragment) = rx.recv().await {
            received.push(fragment);
        }

        assert_eq!(received.len(), 11);
        for (i, fragment) in received.iter().take(10).enumerate() {
            assert_eq!(*fragment, Fragment::Chunk(format!("chunk-{i}")));
        }
        assert_eq!(received.last(), Some(&Fragment::Complete));
    }
}
