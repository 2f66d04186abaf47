//! Egress HTTP dispatch server.
//!
//! Listens for requests from the ingress relay and maps each HTTP method on
//! `/` to a step of the session lifecycle:
//!
//! - `PUT`    — open a session: dial the target TCP server, start the
//!              response pump that POSTs target bytes back to the caller's
//!              callback URL. Idempotent: re-PUTting an already-open session
//!              id is a no-op success.
//! - `POST`   — deliver one chunk of client-originated bytes to the target.
//! - `DELETE` — close a session and tear down its target connection.
//! - `GET`    — liveness probe, independent of any session.

use crate::http_client;
use bytes::Bytes;
use dashmap::DashMap;
use http_body_util::{BodyExt, Full};
use httptun_common::config::EgressConfig;
use httptun_common::error::TunnelError;
use httptun_core::buffer::AdaptiveBuffer;
use httptun_core::events::{EventSink, SessionEndReason};
use httptun_core::registry::SessionRegistry;
use httptun_core::session::{Session, SessionState};
use httptun_protocol::headers;
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

type BoxBody = Full<Bytes>;

/// Shared state for every connection the egress server handles.
pub struct EgressState {
    config: EgressConfig,
    registry: SessionRegistry,
    /// Channel into each session's target-writer task.
    writers: DashMap<Uuid, mpsc::Sender<Bytes>>,
    /// Response-pump task handles, aborted on session teardown.
    pumps: DashMap<Uuid, JoinHandle<()>>,
    events: Arc<dyn EventSink>,
}

impl EgressState {
    pub fn new(config: EgressConfig, events: Arc<dyn EventSink>) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: SessionRegistry::new(),
            writers: DashMap::new(),
            pumps: DashMap::new(),
            events,
        })
    }

    /// Number of sessions currently open on this relay.
    pub fn open_session_count(&self) -> usize {
        self.registry.count()
    }
}

/// Run the egress HTTP server until the listener fails.
pub async fn serve(addr: SocketAddr, state: Arc<EgressState>) -> httptun_common::error::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "egress HTTP server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        stream.set_nodelay(true).ok();
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(req, state.clone()));
            if let Err(err) = hyper::server::conn::http1::Builder::new()
                .serve_connection(io, service)
                .await
            {
                warn!(%peer, error = %err, "egress connection ended with error");
            }
        });
    }
}

async fn handle(
    req: Request<Incoming>,
    state: Arc<EgressState>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let response = match *req.method() {
        Method::PUT => handle_put(req, &state).await,
        Method::POST => handle_post(req, &state).await,
        Method::DELETE => handle_delete(req, &state).await,
        Method::GET => Ok(text_response(StatusCode::OK, "HTTP to TCP service is running")),
        _ => Ok(text_response(StatusCode::METHOD_NOT_ALLOWED, "method not supported")),
    };

    Ok(response.unwrap_or_else(|err| error_response(&err)))
}

fn text_response(status: StatusCode, body: &str) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

/// Status codes per the egress dispatch table (PUT/POST: 400 missing header
/// or unknown session, 500 write/dial failure; DELETE is idempotent and
/// only 400s on a missing header).
fn error_response(err: &TunnelError) -> Response<BoxBody> {
    let status = match err {
        TunnelError::BadRequest(_) | TunnelError::SessionNotFound(_) | TunnelError::Envelope(_) => {
            StatusCode::BAD_REQUEST
        }
        TunnelError::DialFailed(_) | TunnelError::WriteFailed(_) | TunnelError::InvalidState(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    text_response(status, &err.to_string())
}

fn session_id_header(req: &Request<Incoming>) -> Result<Uuid, TunnelError> {
    req.headers()
        .get(headers::SESSION_ID)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| TunnelError::BadRequest("missing Session-ID header".into()))
        .and_then(|s| {
            Uuid::parse_str(s).map_err(|_| TunnelError::BadRequest("malformed Session-ID".into()))
        })
}

async fn handle_put(
    req: Request<Incoming>,
    state: &Arc<EgressState>,
) -> Result<Response<BoxBody>, TunnelError> {
    let session_id = session_id_header(&req)?;

    if state.registry.contains(&session_id) {
        return Ok(text_response(StatusCode::OK, "session already open"));
    }

    let callback_url = req
        .headers()
        .get(headers::CLIENT_CALLBACK_URL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| TunnelError::BadRequest("missing X-Client-Callback-Url header".into()))?;

    // Register before dialing so a retried/racing PUT for the same id sees
    // the session already exists instead of double-dialing the target.
    state
        .registry
        .insert_idempotent(Session::new(session_id, Some(callback_url.clone())));

    let target = format!("{}:{}", state.config.target_ip, state.config.target_tcp_port);
    let stream = match TcpStream::connect(&target).await {
        Ok(s) => s,
        Err(e) => {
            state.registry.remove(&session_id);
            return Err(TunnelError::DialFailed(format!("{target}: {e}")));
        }
    };
    stream.set_nodelay(true).ok();
    let (mut read_half, mut write_half) = stream.into_split();

    let (tx, mut rx) = mpsc::channel::<Bytes>(64);
    tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            if let Err(e) = write_half.write_all(&chunk).await {
                warn!(%session_id, error = %e, "write to target failed");
                break;
            }
        }
        write_half.shutdown().await.ok();
    });
    state.writers.insert(session_id, tx);

    if let Some(mut s) = state.registry.get_mut(&session_id) {
        s.set_state(SessionState::Open);
    }
    state.events.session_opened(session_id);

    let state_for_pump = state.clone();
    let pump = tokio::spawn(async move {
        run_response_pump(session_id, &mut read_half, callback_url, &state_for_pump).await;
    });
    state.pumps.insert(session_id, pump);

    Ok(text_response(StatusCode::OK, "session opened"))
}

/// Reads target-originated bytes and POSTs them to the ingress callback
/// until the target closes or a callback POST fails. Either way, the
/// session is torn down locally here: target socket closed (via drop),
/// writer channel and registry entry removed. Per the dispatch contract
/// this never issues a DELETE in the reverse direction — ingress discovers
/// the break on its own next outbound POST or TCP close.
async fn run_response_pump(
    session_id: Uuid,
    read_half: &mut tokio::net::tcp::OwnedReadHalf,
    callback_url: String,
    state: &Arc<EgressState>,
) {
    let mut adaptive = AdaptiveBuffer::new();
    let end_reason = loop {
        let mut buf = vec![0u8; adaptive.current()];
        let n = match read_half.read(&mut buf).await {
            Ok(0) => break SessionEndReason::PeerClosed,
            Ok(n) => n,
            Err(e) => {
                state.events.session_error(session_id, &e.to_string());
                break SessionEndReason::Error;
            }
        };
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

        if let Err(e) = post_to_callback(&callback_url, session_id, &buf, &state.config).await {
            state.events.session_error(session_id, &e.to_string());
            break SessionEndReason::Error;
        }
    };

    if let Some(mut s) = state.registry.get_mut(&session_id) {
        s.set_state(SessionState::Closing);
    }
    state.registry.remove(&session_id);
    state.writers.remove(&session_id);
    state.pumps.remove(&session_id);
    state.events.session_closed(session_id, end_reason);
}

async fn post_to_callback(
    callback_url: &str,
    session_id: Uuid,
    data: &[u8],
    config: &EgressConfig,
) -> httptun_common::error::Result<()> {
    let uri: Uri = callback_url
        .parse()
        .map_err(|e| TunnelError::Upstream(format!("invalid callback URL: {e}")))?;

    let encoded = httptun_protocol::envelope::encode(data, config.gzip_enabled, config.gzip_threshold_bytes)?;
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
        config.callback_timeout,
    )
    .await?;

    if !response.status.is_success() {
        return Err(TunnelError::Upstream(format!(
            "callback POST to {callback_url} returned {}",
            response.status
        )));
    }
    Ok(())
}

async fn handle_post(
    req: Request<Incoming>,
    state: &Arc<EgressState>,
) -> Result<Response<BoxBody>, TunnelError> {
    let session_id = session_id_header(&req)?;
    if !state.registry.contains(&session_id) {
        return Err(TunnelError::SessionNotFound(session_id.to_string()));
    }

    let gzipped = req
        .headers()
        .get(headers::CONTENT_ENCODING)
        .and_then(|v: &HeaderValue| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case(headers::CONTENT_ENCODING_GZIP));

    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| TunnelError::Envelope(e.to_string()))?
        .to_bytes();
    let raw = httptun_protocol::envelope::decode(&body, gzipped)?;

    let writer = state
        .writers
        .get(&session_id)
        .ok_or_else(|| TunnelError::WriteFailed(format!("session {session_id} is closing")))?
        .clone();
    writer
        .send(Bytes::from(raw))
        .await
        .map_err(|_| TunnelError::WriteFailed(format!("session {session_id} is closing")))?;

    if let Some(mut s) = state.registry.get_mut(&session_id) {
        s.touch();
    }

    Ok(text_response(StatusCode::OK, "accepted"))
}

/// Idempotent: a DELETE for an id this relay has already torn down (or
/// never saw) is still a 200, matching the PUT side's re-PUT tolerance.
async fn handle_delete(
    req: Request<Incoming>,
    state: &Arc<EgressState>,
) -> Result<Response<BoxBody>, TunnelError> {
    let session_id = session_id_header(&req)?;
    if state.registry.remove(&session_id).is_some() {
        state.writers.remove(&session_id);
        if let Some((_, pump)) = state.pumps.remove(&session_id) {
            pump.abort();
        }
        state.events.session_closed(session_id, SessionEndReason::ClientClosed);
    }

    Ok(text_response(StatusCode::OK, "session closed"))
}
