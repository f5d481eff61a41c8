//! Statement output towards the client.
//!
//! Events are encoded into a pending buffer and only handed to the
//! response body on [`ScriptWriter::flush`], which the engine calls at each
//! milestone. Once flushed, text is never rewritten.

use std::convert::Infallible;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::relay::encoder::ScriptEncoder;
use crate::relay::event::ResponseEvent;

/// Stream of flushed statement batches, ready to become a response body.
pub type StatementStream = ReceiverStream<Result<Bytes, Infallible>>;

pub struct ScriptWriter {
    encoder: ScriptEncoder,
    pending: String,
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
    receiver_gone: bool,
    bytes_written: u64,
}

impl ScriptWriter {
    /// Create a writer for `object` and the stream it feeds.
    pub fn channel(object: impl Into<String>, capacity: usize) -> (Self, StatementStream) {
        let (tx, rx) = mpsc::channel(capacity);
        let writer = Self {
            encoder: ScriptEncoder::new(object),
            pending: String::new(),
            tx,
            receiver_gone: false,
            bytes_written: 0,
        };
        (writer, ReceiverStream::new(rx))
    }

    pub fn emit(&mut self, event: &ResponseEvent) {
        self.encoder.encode(event, &mut self.pending);
    }

    /// Hand everything emitted so far to the client.
    ///
    /// A client that went away does not stop the relay; its output is
    /// discarded from then on.
    pub async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = Bytes::from(std::mem::take(&mut self.pending));
        if self.receiver_gone {
            return;
        }
        let len = batch.len() as u64;
        if self.tx.send(Ok(batch)).await.is_ok() {
            self.bytes_written += len;
        } else {
            tracing::debug!(object = %self.encoder.object(), "Client disconnected, discarding output");
            self.receiver_gone = true;
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
