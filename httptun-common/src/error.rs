//! Error types for `httptun`

use thiserror::Error;

/// Main error type for `httptun` operations
#[derive(Error, Debug)]
pub enum TunnelError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed envelope (bad base64 or gzip framing)
    #[error("Envelope error: {0}")]
    Envelope(String),

    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session already exists (violates the at-most-one-per-id invariant)
    #[error("Session already exists: {0}")]
    SessionExists(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The target TCP server could not be reached
    #[error("Dial failed: {0}")]
    DialFailed(String),

    /// An upstream HTTP request to the peer relay failed
    #[error("Upstream HTTP request failed: {0}")]
    Upstream(String),

    /// Invalid state for the requested operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed or missing request, independent of session state
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Writing to a socket owned by this relay failed
    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TunnelError>;
