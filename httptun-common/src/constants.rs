//! Default ports, timeouts and buffer sizes for httptun relays.
//!
//! Use these constants instead of magic numbers so defaults stay consistent
//! across the ingress relay, egress relay, and CLI.

use std::time::Duration;

/// Default TCP listen port on the ingress relay (application clients connect here).
pub const DEFAULT_TCP_PORT: u16 = 8001;

/// Default port the ingress relay's callback HTTP server listens on.
pub const DEFAULT_RESPONSE_HTTP_PORT: u16 = 9001;

/// Default HTTP listen port on the egress relay (PUT/POST/DELETE/GET dispatch).
pub const DEFAULT_HTTP_PORT: u16 = 8002;

/// Default target TCP port the egress relay dials per session.
pub const DEFAULT_TARGET_TCP_PORT: u16 = 8003;

/// Initial adaptive read chunk size, in bytes.
pub const INITIAL_BUFFER_SIZE: usize = 1024;

/// Upper bound on the adaptive read chunk size, in bytes.
pub const MAX_BUFFER_SIZE: usize = 65536;

/// Growth/shrink factor applied to the adaptive read chunk size.
pub const BUFFER_GROWTH_FACTOR: usize = 2;

/// Default payload size above which gzip compression is applied to the envelope.
pub const DEFAULT_GZIP_THRESHOLD_BYTES: usize = 1024;

/// Recommended timeout for the ingress relay's session-init PUT.
pub const DEFAULT_PUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Recommended timeout for data-carrying POSTs in either direction.
pub const DEFAULT_POST_TIMEOUT: Duration = Duration::from_secs(10);

/// Recommended timeout for the ingress relay's session-teardown DELETE.
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded grace period process shutdown waits for in-flight pumps to drain.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
