//! Observability hook for relay lifecycle events.
//!
//! The HTTP/TCP handlers in `httptun-http` depend on this trait rather than
//! on `tracing` directly, so a relay's instrumentation can be swapped without
//! touching handler logic. [`TracingEventSink`] is the only implementation
//! shipped here and is what both CLI binaries wire up by default.

use std::fmt;
use uuid::Uuid;

/// Reason a session left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    /// Peer sent the session-teardown DELETE.
    ClientClosed,
    /// The TCP half this relay owns hit EOF.
    PeerClosed,
    /// An unrecoverable I/O or protocol error tore the session down.
    Error,
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionEndReason::ClientClosed => "client_closed",
            SessionEndReason::PeerClosed => "peer_closed",
            SessionEndReason::Error => "error",
        };
        f.write_str(s)
    }
}

/// Observer for the events a relay's session handling produces.
///
/// Implementations must be cheap and non-blocking — they are called from the
/// hot path of every read/write pump.
pub trait EventSink: Send + Sync + 'static {
    /// A new session was registered.
    fn session_opened(&self, session_id: Uuid);

    /// A session was removed from the registry.
    fn session_closed(&self, session_id: Uuid, reason: SessionEndReason);

    /// `n` bytes moved through one leg of a session's pump.
    fn bytes_forwarded(&self, session_id: Uuid, n: usize);

    /// The adaptive buffer for a session changed size.
    fn buffer_resized(&self, session_id: Uuid, old_size: usize, new_size: usize);

    /// A recoverable error occurred while servicing a session.
    fn session_error(&self, session_id: Uuid, message: &str);
}

/// [`EventSink`] that reports everything through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn session_opened(&self, session_id: Uuid) {
        tracing::info!(%session_id, "session opened");
    }

    fn session_closed(&self, session_id: Uuid, reason: SessionEndReason) {
        tracing::info!(%session_id, %reason, "session closed");
    }

    fn bytes_forwarded(&self, session_id: Uuid, n: usize) {
        tracing::trace!(%session_id, bytes = n, "forwarded");
    }

    fn buffer_resized(&self, session_id: Uuid, old_size: usize, new_size: usize) {
        tracing::debug!(%session_id, old_size, new_size, "adaptive buffer resized");
    }

    fn session_error(&self, session_id: Uuid, message: &str) {
        tracing::warn!(%session_id, error = message, "session error");
    }
}
