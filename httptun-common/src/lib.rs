//! Common utilities and types for `httptun`

pub mod config;
pub mod constants;
pub mod error;

pub use config::{EgressConfig, IngressConfig};
pub use constants::{
    BUFFER_GROWTH_FACTOR, DEFAULT_DELETE_TIMEOUT, DEFAULT_GZIP_THRESHOLD_BYTES,
    DEFAULT_HTTP_PORT, DEFAULT_POST_TIMEOUT, DEFAULT_PUT_TIMEOUT, DEFAULT_RESPONSE_HTTP_PORT,
    DEFAULT_SHUTDOWN_GRACE, DEFAULT_TARGET_TCP_PORT, DEFAULT_TCP_PORT, INITIAL_BUFFER_SIZE,
    MAX_BUFFER_SIZE,
};
pub use error::{Result, TunnelError};
