//! Protocol events produced by the relay engine, in emission order.

use crate::relay::error::RelayFailure;

/// One observable step of a relay operation.
///
/// The engine produces these in a strict order: `StatusReceived`, zero or
/// more `HeaderReceived`, `HeadersComplete`, then for a non-empty body
/// `BodyStarted` followed by `BodyChunk`/`Reparse` interleavings, and
/// finally `StreamEnded`. `Failure` may replace any suffix of that sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    StatusReceived { code: u16, reason: String },
    HeaderReceived { name: String, value: String },
    /// Status and every header are known.
    HeadersComplete,
    /// The first body text is about to arrive.
    BodyStarted,
    BodyChunk { text: String },
    /// The source paused (or ended); the client may reparse structured content.
    Reparse,
    StreamEnded,
    Failure(RelayFailure),
}
