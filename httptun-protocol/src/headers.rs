//! HTTP header names used on the wire between ingress and egress relays.

/// Identifies which tunneled TCP session a request/callback belongs to.
pub const SESSION_ID: &str = "Session-ID";

/// Absolute URL of the ingress relay's callback server, sent by ingress
/// on the session-init PUT so the egress relay knows where to POST
/// target-originated bytes back.
pub const CLIENT_CALLBACK_URL: &str = "X-Client-Callback-Url";

/// Present with value `gzip` when the request/callback body is gzip
/// compressed before base64 transport encoding. Absent means the body
/// is base64 of the raw bytes.
pub const CONTENT_ENCODING: &str = "X-Content-Encoding";

/// The only value `CONTENT_ENCODING` is ever set to.
pub const CONTENT_ENCODING_GZIP: &str = "gzip";

/// Set on every data-bearing POST (ingress -> egress and the egress
/// callback) to declare the base64 envelope body's media type.
pub const CONTENT_TYPE: &str = "Content-Type";

/// The only value `CONTENT_TYPE` is ever set to on data requests.
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";
