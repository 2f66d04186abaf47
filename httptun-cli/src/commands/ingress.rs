//! Ingress relay subcommand: accepts application TCP connections and pumps
//! their bytes to the egress relay over HTTP, writing the reverse direction
//! back from the callback server.

use anyhow::{Context, Result};
use clap::Args;
use httptun_common::config::IngressConfig;
use httptun_common::constants::{
    DEFAULT_DELETE_TIMEOUT, DEFAULT_GZIP_THRESHOLD_BYTES, DEFAULT_POST_TIMEOUT,
    DEFAULT_PUT_TIMEOUT, DEFAULT_RESPONSE_HTTP_PORT, DEFAULT_SHUTDOWN_GRACE, DEFAULT_TCP_PORT,
};
use httptun_core::events::TracingEventSink;
use httptun_http::ingress::IngressState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct IngressArgs {
    /// Port the TCP listener binds for application clients.
    #[arg(long, default_value_t = DEFAULT_TCP_PORT, env = "TCP_PORT")]
    tcp_port: u16,

    /// Port the callback HTTP server binds to receive inbound POSTs from egress.
    #[arg(long, default_value_t = DEFAULT_RESPONSE_HTTP_PORT, env = "RESPONSE_HTTP_PORT")]
    response_http_port: u16,

    /// Base URL of the egress relay, e.g. `http://egress-host:8002`.
    #[arg(long, env = "EGRESS_BASE_URL")]
    egress_base_url: String,

    /// Hostname or IP the egress relay can use to reach this ingress
    /// relay's callback server.
    #[arg(long, default_value = "127.0.0.1", env = "CALLBACK_HOST")]
    callback_host: String,

    /// Compress outbound payloads above the gzip threshold.
    #[arg(long, default_value_t = true, env = "GZIP_ENABLED")]
    gzip_enabled: bool,

    /// Payload size above which outbound payloads are gzip-compressed.
    #[arg(long, default_value_t = DEFAULT_GZIP_THRESHOLD_BYTES, env = "GZIP_THRESHOLD_BYTES")]
    gzip_threshold_bytes: usize,

    /// Log level (passed through to `RUST_LOG` conventions).
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

pub async fn run(args: IngressArgs) -> Result<()> {
    init_logging(&args.log_level);

    let config = IngressConfig {
        tcp_port: args.tcp_port,
        response_http_port: args.response_http_port,
        egress_base_url: args.egress_base_url,
        callback_host: args.callback_host,
        gzip_enabled: args.gzip_enabled,
        gzip_threshold_bytes: args.gzip_threshold_bytes,
        put_timeout: DEFAULT_PUT_TIMEOUT,
        post_timeout: DEFAULT_POST_TIMEOUT,
        delete_timeout: DEFAULT_DELETE_TIMEOUT,
    };
    config.validate().context("invalid ingress configuration")?;

    info!("starting httptun ingress relay v{}", env!("CARGO_PKG_VERSION"));
    info!(egress_base_url = %config.egress_base_url, "egress relay target");

    let tcp_addr: SocketAddr = format!("0.0.0.0:{}", config.tcp_port).parse()?;
    let callback_addr: SocketAddr = format!("0.0.0.0:{}", config.response_http_port).parse()?;

    let state = IngressState::new(config, Arc::new(TracingEventSink));

    let tcp_handle = tokio::spawn(httptun_http::ingress::serve(tcp_addr, state.clone()));
    let callback_handle = tokio::spawn(httptun_http::callback::serve(callback_addr, state.clone()));

    tokio::select! {
        res = tcp_handle => { res??; }
        res = callback_handle => { res??; }
        () = super::shutdown_signal() => {
            info!(
                open_sessions = state.registry.count(),
                grace = ?DEFAULT_SHUTDOWN_GRACE,
                "shutting down, waiting for in-flight sessions to drain",
            );
            tokio::time::sleep(DEFAULT_SHUTDOWN_GRACE).await;
            if state.registry.count() > 0 {
                warn!(open_sessions = state.registry.count(), "grace period elapsed, exiting anyway");
            }
        }
    }

    Ok(())
}

fn init_logging(default_level: &str) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
