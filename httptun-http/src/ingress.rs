//! Ingress relay: accepts application TCP connections, opens a session on
//! the egress relay, and pumps bytes in both directions.
//!
//! Outbound (client -> target): read loop on the accepted TCP socket feeds
//! each chunk to the egress relay as a `POST`.
//! Inbound (target -> client): the callback HTTP server in
//! [`crate::callback`] receives `POST`s from egress and writes their payload
//! into the matching socket.

use crate::http_client;
use bytes::Bytes;
use dashmap::DashMap;
use httptun_common::config::IngressConfig;
use httptun_common::error::{Result, TunnelError};
use httptun_core::buffer::AdaptiveBuffer;
use httptun_core::events::{EventSink, SessionEndReason};
use httptun_core::registry::SessionRegistry;
use httptun_core::session::{Session, SessionState};
use httptun_protocol::headers;
use hyper::{Method, Uri};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared state for the ingress TCP accept loop and its callback server.
pub struct IngressState {
    pub config: IngressConfig,
    pub registry: SessionRegistry,
    /// Channel into each session's client-writer task, fed by the callback server.
    pub writers: DashMap<Uuid, mpsc::Sender<Bytes>>,
    pub events: Arc<dyn EventSink>,
}

impl IngressState {
    pub fn new(config: IngressConfig, events: Arc<dyn EventSink>) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: SessionRegistry::new(),
            writers: DashMap::new(),
            events,
        })
    }
}

/// Run the TCP accept loop until the listener fails.
pub async fn serve(addr: SocketAddr, state: Arc<IngressState>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "ingress TCP listener accepting connections");

    loop {
        let (stream, peer) = listener.accept().await?;
        stream.set_nodelay(true).ok();
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, state).await {
                warn!(%peer, error = %e, "ingress connection ended with error");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<IngressState>) -> Result<()> {
    let session_id = Uuid::new_v4();
    let callback_url = state.config.callback_url();

    let (mut read_half, write_half) = stream.into_split();

    let (tx, mut rx) = mpsc::channel::<Bytes>(64);
    let writer_task = tokio::spawn(async move {
        let mut write_half = write_half;
        while let Some(chunk) = rx.recv().await {
            if let Err(e) = write_half.write_all(&chunk).await {
                warn!(%session_id, error = %e, "write to client failed");
                break;
            }
        }
    });

    // Registry and writer entries must exist before the session-init PUT is
    // sent: the egress relay's response pump can start delivering bytes (a
    // speak-first target) as soon as it returns 200, and that callback POST
    // must find a writer waiting rather than racing this task's own inserts.
    state.registry.insert(Session::new(session_id, Some(callback_url.clone())))?;
    state.writers.insert(session_id, tx);

    if let Err(e) = open_session(session_id, &callback_url, &state).await {
        state.registry.remove(&session_id);
        state.writers.remove(&session_id);
        writer_task.abort();
        return Err(e);
    }
    state.events.session_opened(session_id);

    let result = run_client_read_loop(session_id, &mut read_half, &state).await;

    close_session(session_id, &state).await;
    state.writers.remove(&session_id);
    writer_task.abort();

    result
}

async fn open_session(session_id: Uuid, callback_url: &str, state: &Arc<IngressState>) -> Result<()> {
    let uri: Uri = state
        .config
        .egress_base_url
        .parse()
        .map_err(|e| TunnelError::Config(format!("invalid egress_base_url: {e}")))?;

    let response = http_client::send(
        Method::PUT,
        &uri,
        &[
            (headers::SESSION_ID, session_id.to_string()),
            (headers::CLIENT_CALLBACK_URL, callback_url.to_string()),
        ],
        Bytes::new(),
        state.config.put_timeout,
    )
    .await?;

    if !response.status.is_success() {
        return Err(TunnelError::Upstream(format!(
            "session-init PUT returned {}",
            response.status
        )));
    }
    Ok(())
}

async fn run_client_read_loop(
    session_id: Uuid,
    read_half: &mut tokio::net::tcp::OwnedReadHalf,
    state: &Arc<IngressState>,
) -> Result<()> {
    if let Some(mut s) = state.registry.get_mut(&session_id) {
        s.set_state(SessionState::Open);
    }

    let uri: Uri = state
        .config
        .egress_base_url
        .parse()
        .map_err(|e| TunnelError::Config(format!("invalid egress_base_url: {e}")))?;
    let mut adaptive = AdaptiveBuffer::new();

    loop {
        let mut buf = vec![0u8; adaptive.current()];
        let n = read_half.read(&mut buf).await?;
        if n == 0 {
            state.events.session_closed(session_id, SessionEndReason::PeerClosed);
            return Ok(());
        }
        buf.truncate(n);

        let old_size = adaptive.current();
        adaptive.record_read(n);
        if adaptive.current() != old_size {
            state.events.buffer_resized(session_id, old_size, adaptive.current());
        }
        if let Some(mut s) = state.registry.get_mut(&session_id) {
            s.set_adaptive_buffer_size(adaptive.current());
            s.touch();
        }
        state.events.bytes_forwarded(session_id, n);

        let encoded = httptun_protocol::envelope::encode(
            &buf,
            state.config.gzip_enabled,
            state.config.gzip_threshold_bytes,
        )?;
        let mut req_headers = vec![
            (headers::SESSION_ID, session_id.to_string()),
            (headers::CONTENT_TYPE, headers::CONTENT_TYPE_OCTET_STREAM.to_string()),
        ];
        if encoded.gzipped {
            req_headers.push((headers::CONTENT_ENCODING, headers::CONTENT_ENCODING_GZIP.to_string()));
        }

        let response = http_client::send(
            Method::POST,
            &uri,
            &req_headers,
            Bytes::from(encoded.body),
            state.config.post_timeout,
        )
        .await?;

        if response.status == hyper::StatusCode::GONE || response.status == hyper::StatusCode::NOT_FOUND {
            state.events.session_closed(session_id, SessionEndReason::Error);
            return Ok(());
        }
    }
}

async fn close_session(session_id: Uuid, state: &Arc<IngressState>) {
    state.registry.remove(&session_id);

    let Ok(uri) = state.config.egress_base_url.parse::<Uri>() else {
        return;
    };
    let result = http_client::send(
        Method::DELETE,
        &uri,
        &[(headers::SESSION_ID, session_id.to_string())],
        Bytes::new(),
        state.config.delete_timeout,
    )
    .await;
    if let Err(e) = result {
        warn!(%session_id, error = %e, "session-teardown DELETE failed");
    }
}
