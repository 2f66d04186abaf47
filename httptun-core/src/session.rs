//! The tunneled TCP session: a single logical connection carried over a
//! series of request/callback HTTP exchanges between ingress and egress.

use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// Lifecycle state of a session, as seen by whichever relay currently holds
/// an entry for it. Ingress and egress each track their own `Session`, they
/// do not share one struct across a process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, session-init PUT sent/received but not yet acknowledged.
    Initializing,
    /// PUT acknowledged (ingress) / dial succeeded (egress); data may flow.
    Open,
    /// A DELETE has been sent/received or a half of the TCP pipe reached EOF;
    /// draining in-flight work before removal.
    Closing,
    /// Removed from the registry. Terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Initializing => "initializing",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A tunneled TCP session.
///
/// Exactly one `Session` exists per `session_id` at a time on either relay
/// (the at-most-one-per-id invariant is enforced by [`crate::registry::SessionRegistry`],
/// not by this type).
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    /// Absolute URL of the ingress relay's callback server. `None` on the
    /// egress side until the session-init PUT carrying it is processed.
    callback_url: Option<String>,
    state: SessionState,
    created_at: Instant,
    last_activity: Instant,
    /// Size, in bytes, the adaptive read loop should request next from its
    /// TCP socket. Lives on the `Session` because it is per-connection state,
    /// not a pool-wide setting.
    adaptive_buffer_size: usize,
}

impl Session {
    /// Start a new session in [`SessionState::Initializing`].
    pub fn new(id: Uuid, callback_url: Option<String>) -> Self {
        let now = Instant::now();
        Self {
            id,
            callback_url,
            state: SessionState::Initializing,
            created_at: now,
            last_activity: now,
            adaptive_buffer_size: httptun_common::constants::INITIAL_BUFFER_SIZE,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn adaptive_buffer_size(&self) -> usize {
        self.adaptive_buffer_size
    }

    pub fn set_adaptive_buffer_size(&mut self, size: usize) {
        self.adaptive_buffer_size = size;
    }
}
