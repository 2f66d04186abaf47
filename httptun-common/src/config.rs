//! Configuration types for the ingress and egress relays.
//!
//! Both relays are configured entirely from environment variables.
//! Construction never fails on a missing variable — defaults are provided
//! for every setting — but malformed values (a non-numeric port, for
//! instance) are rejected by [`TunnelError::Config`].

use crate::constants::{
    DEFAULT_DELETE_TIMEOUT, DEFAULT_GZIP_THRESHOLD_BYTES, DEFAULT_HTTP_PORT, DEFAULT_POST_TIMEOUT,
    DEFAULT_PUT_TIMEOUT, DEFAULT_RESPONSE_HTTP_PORT, DEFAULT_TARGET_TCP_PORT, DEFAULT_TCP_PORT,
};
use crate::error::{Result, TunnelError};
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|_| TunnelError::Config(format!("{key} is not valid: {val:?}"))),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(std::env::VarError::NotUnicode(_)) => {
            Err(TunnelError::Config(format!("{key} is not valid UTF-8")))
        }
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(val) => match val.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(TunnelError::Config(format!(
                "{key} is not a valid boolean: {val:?}"
            ))),
        },
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(std::env::VarError::NotUnicode(_)) => {
            Err(TunnelError::Config(format!("{key} is not valid UTF-8")))
        }
    }
}

/// Configuration for the ingress relay (accepts application TCP, talks HTTP to egress).
#[derive(Debug, Clone)]
pub struct IngressConfig {
    /// Port the TCP listener binds for application clients.
    pub tcp_port: u16,
    /// Port the callback HTTP server binds to receive inbound POSTs from egress.
    pub response_http_port: u16,
    /// Base URL of the egress relay, e.g. `http://egress-host:8002`.
    pub egress_base_url: String,
    /// Hostname or IP the egress relay can use to reach this ingress relay's
    /// callback server. Sent to egress as `X-Client-Callback-Url`.
    pub callback_host: String,
    /// Whether to gzip-compress outbound payloads above `gzip_threshold_bytes`.
    pub gzip_enabled: bool,
    /// Threshold, in bytes, above which outbound payloads are gzip-compressed.
    pub gzip_threshold_bytes: usize,
    /// Timeout for the session-init PUT.
    pub put_timeout: Duration,
    /// Timeout for data-carrying POSTs.
    pub post_timeout: Duration,
    /// Timeout for the session-teardown DELETE.
    pub delete_timeout: Duration,
}

impl IngressConfig {
    /// Load configuration from the environment.
    ///
    /// Recognized variables: `TCP_PORT`, `RESPONSE_HTTP_PORT`, `EGRESS_BASE_URL`,
    /// `GZIP_ENABLED`, `GZIP_THRESHOLD_BYTES`.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            tcp_port: env_or("TCP_PORT", DEFAULT_TCP_PORT)?,
            response_http_port: env_or("RESPONSE_HTTP_PORT", DEFAULT_RESPONSE_HTTP_PORT)?,
            egress_base_url: std::env::var("EGRESS_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{DEFAULT_HTTP_PORT}")),
            callback_host: std::env::var("CALLBACK_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            gzip_enabled: env_bool("GZIP_ENABLED", true)?,
            gzip_threshold_bytes: env_or("GZIP_THRESHOLD_BYTES", DEFAULT_GZIP_THRESHOLD_BYTES)?,
            put_timeout: DEFAULT_PUT_TIMEOUT,
            post_timeout: DEFAULT_POST_TIMEOUT,
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
        };
        config.validate()?;
        Ok(config)
    }

    /// Absolute URL of this relay's callback server, as advertised to egress.
    pub fn callback_url(&self) -> String {
        format!("http://{}:{}", self.callback_host, self.response_http_port)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.egress_base_url.is_empty() {
            return Err(TunnelError::Config("egress_base_url is required".into()));
        }
        if !self.egress_base_url.starts_with("http://") && !self.egress_base_url.starts_with("https://") {
            return Err(TunnelError::Config(
                "egress_base_url must be an absolute http(s) URL".into(),
            ));
        }
        Ok(())
    }
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            tcp_port: DEFAULT_TCP_PORT,
            response_http_port: DEFAULT_RESPONSE_HTTP_PORT,
            egress_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            callback_host: "127.0.0.1".to_string(),
            gzip_enabled: true,
            gzip_threshold_bytes: DEFAULT_GZIP_THRESHOLD_BYTES,
            put_timeout: DEFAULT_PUT_TIMEOUT,
            post_timeout: DEFAULT_POST_TIMEOUT,
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
        }
    }
}

/// Configuration for the egress relay (accepts HTTP from ingress, dials the target TCP server).
#[derive(Debug, Clone)]
pub struct EgressConfig {
    /// Port the HTTP dispatch server binds to.
    pub http_port: u16,
    /// Hostname or IP of the target TCP server.
    pub target_ip: String,
    /// Port of the target TCP server.
    pub target_tcp_port: u16,
    /// Whether to gzip-compress outbound payloads above `gzip_threshold_bytes`.
    pub gzip_enabled: bool,
    /// Threshold, in bytes, above which outbound payloads are gzip-compressed.
    pub gzip_threshold_bytes: usize,
    /// Timeout for callback POSTs to the ingress relay.
    pub callback_timeout: Duration,
}

impl EgressConfig {
    /// Load configuration from the environment.
    ///
    /// Recognized variables: `HTTP_PORT`, `TARGET_IP`, `TARGET_TCP_PORT`,
    /// `GZIP_ENABLED`, `GZIP_THRESHOLD_BYTES`.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            http_port: env_or("HTTP_PORT", DEFAULT_HTTP_PORT)?,
            target_ip: std::env::var("TARGET_IP").unwrap_or_else(|_| "localhost".to_string()),
            target_tcp_port: env_or("TARGET_TCP_PORT", DEFAULT_TARGET_TCP_PORT)?,
            gzip_enabled: env_bool("GZIP_ENABLED", true)?,
            gzip_threshold_bytes: env_or("GZIP_THRESHOLD_BYTES", DEFAULT_GZIP_THRESHOLD_BYTES)?,
            callback_timeout: DEFAULT_POST_TIMEOUT,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.target_ip.is_empty() {
            return Err(TunnelError::Config("target_ip is required".into()));
        }
        Ok(())
    }
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            target_ip: "localhost".to_string(),
            target_tcp_port: DEFAULT_TARGET_TCP_PORT,
            gzip_enabled: true,
            gzip_threshold_bytes: DEFAULT_GZIP_THRESHOLD_BYTES,
            callback_timeout: DEFAULT_POST_TIMEOUT,
        }
    }
}
