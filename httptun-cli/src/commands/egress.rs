//! Egress relay subcommand: dispatches PUT/POST/DELETE/GET from the ingress
//! relay, dials the target TCP server per session, and pumps
//! target-originated bytes back via callback POSTs.

use anyhow::{Context, Result};
use clap::Args;
use httptun_common::config::EgressConfig;
use httptun_common::constants::{
    DEFAULT_GZIP_THRESHOLD_BYTES, DEFAULT_HTTP_PORT, DEFAULT_POST_TIMEOUT,
    DEFAULT_SHUTDOWN_GRACE, DEFAULT_TARGET_TCP_PORT,
};
use httptun_core::events::TracingEventSink;
use httptun_http::egress::EgressState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct EgressArgs {
    /// Port the HTTP dispatch server binds to.
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "HTTP_PORT")]
    http_port: u16,

    /// Hostname or IP of the target TCP server.
    #[arg(long, default_value = "localhost", env = "TARGET_IP")]
    target_ip: String,

    /// Port of the target TCP server.
    #[arg(long, default_value_t = DEFAULT_TARGET_TCP_PORT, env = "TARGET_TCP_PORT")]
    target_tcp_port: u16,

    /// Compress outbound callback payloads above the gzip threshold.
    #[arg(long, default_value_t = true, env = "GZIP_ENABLED")]
    gzip_enabled: bool,

    /// Payload size above which callback payloads are gzip-compressed.
    #[arg(long, default_value_t = DEFAULT_GZIP_THRESHOLD_BYTES, env = "GZIP_THRESHOLD_BYTES")]
    gzip_threshold_bytes: usize,

    /// Log level (passed through to `RUST_LOG` conventions).
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

pub async fn run(args: EgressArgs) -> Result<()> {
    init_logging(&args.log_level);

    let config = EgressConfig {
        http_port: args.http_port,
        target_ip: args.target_ip,
        target_tcp_port: args.target_tcp_port,
        gzip_enabled: args.gzip_enabled,
        gzip_threshold_bytes: args.gzip_threshold_bytes,
        callback_timeout: DEFAULT_POST_TIMEOUT,
    };
    config.validate().context("invalid egress configuration")?;

    info!("starting httptun egress relay v{}", env!("CARGO_PKG_VERSION"));
    info!(target = %format!("{}:{}", config.target_ip, config.target_tcp_port), "target TCP server");

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let state = EgressState::new(config, Arc::new(TracingEventSink));

    let server_handle = tokio::spawn(httptun_http::egress::serve(http_addr, state.clone()));

    tokio::select! {
        res = server_handle => { res??; }
        () = super::shutdown_signal() => {
            info!(
                open_sessions = state.open_session_count(),
                grace = ?DEFAULT_SHUTDOWN_GRACE,
                "shutting down, waiting for in-flight sessions to drain",
            );
            tokio::time::sleep(DEFAULT_SHUTDOWN_GRACE).await;
            if state.open_session_count() > 0 {
                warn!(open_sessions = state.open_session_count(), "grace period elapsed, exiting anyway");
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
