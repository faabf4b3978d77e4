//! Ordered delta streams
//!
//! A streaming backend writes into a `DeltaSink` and the session reads from
//! the matching `DeltaStream`. Every stream ends with exactly one `End` or
//! `Error`; a stream whose producer vanished without either is an error.
//! Dropping the `DeltaStream` cancels the producer: its next `send` reports
//! the consumer is gone.

use tokio::sync::mpsc;

/// Buffered events between producer and consumer
const STREAM_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    End,
    Error(String),
}

/// Consumer half
#[derive(Debug)]
pub struct DeltaStream {
    rx: mpsc::Receiver<StreamEvent>,
}

/// Producer half
#[derive(Debug, Clone)]
pub struct DeltaSink {
    tx: mpsc::Sender<StreamEvent>,
}

pub fn delta_channel() -> (DeltaSink, DeltaStream) {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    (DeltaSink { tx }, DeltaStream { rx })
}

impl DeltaStream {
    /// Next event; `None` once the producer has gone away
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

impl DeltaSink {
    /// Emit a text fragment. Empty fragments are skipped. Returns `false`
    /// when the consumer has dropped the stream.
    pub async fn delta(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.is_empty() {
            return !self.tx.is_closed();
        }
        self.tx.send(StreamEvent::Delta(text)).await.is_ok()
    }

    pub async fn end(self) {
        let _ = self.tx.send(StreamEvent::End).await;
    }

    pub async fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(StreamEvent::Error(reason.into())).await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }
}
