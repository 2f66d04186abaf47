//! Ingress relay's callback HTTP server.
//!
//! Egress POSTs target-originated bytes here as they're read off the target
//! TCP connection. This is the inbound half of the tunnel: every other
//! direction is pulled by ingress via [`crate::ingress`]; this one is pushed
//! by egress because ingress has no way to poll the target socket itself.

use crate::ingress::IngressState;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use httptun_common::error::TunnelError;
use httptun_protocol::headers;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use uuid::Uuid;

type BoxBody = Full<Bytes>;

/// Run the callback server until the listener fails.
pub async fn serve(addr: SocketAddr, state: Arc<IngressState>) -> httptun_common::error::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "ingress callback server listening");

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
                warn!(%peer, error = %err, "callback connection ended with error");
            }
        });
    }
}

async fn handle(
    req: Request<Incoming>,
    state: Arc<IngressState>,
) -> Result<Response<BoxBody>, hyper::Error> {
    if req.method() != Method::POST {
        return Ok(text_response(StatusCode::METHOD_NOT_ALLOWED, "POST only"));
    }

    Ok(match handle_post(req, &state).await {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    })
}

fn text_response(status: StatusCode, body: &str) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

/// Status codes per the callback server's response contract: 400 on a
/// malformed request, 404 for an id this relay never registered, 410 for
/// one whose writer is already closing, 500 on a write failure.
fn error_response(err: &TunnelError) -> Response<BoxBody> {
    let status = match err {
        TunnelError::BadRequest(_) | TunnelError::Envelope(_) => StatusCode::BAD_REQUEST,
        TunnelError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        TunnelError::InvalidState(_) => StatusCode::GONE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    text_response(status, &err.to_string())
}

async fn handle_post(
    req: Request<Incoming>,
    state: &Arc<IngressState>,
) -> Result<Response<BoxBody>, TunnelError> {
    let session_id = req
        .headers()
        .get(headers::SESSION_ID)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| TunnelError::BadRequest("missing Session-ID header".into()))
        .and_then(|s| {
            Uuid::parse_str(s).map_err(|_| TunnelError::BadRequest("malformed Session-ID".into()))
        })?;

    if !state.registry.contains(&session_id) {
        return Err(TunnelError::SessionNotFound(session_id.to_string()));
    }

    let gzipped = req
        .headers()
        .get(headers::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
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
        .ok_or_else(|| TunnelError::InvalidState(format!("session {session_id} is closing")))?
        .clone();
    writer
        .send(Bytes::from(raw))
        .await
        .map_err(|_| TunnelError::InvalidState(format!("session {session_id} is closing")))?;

    if let Some(mut s) = state.registry.get_mut(&session_id) {
        s.touch();
    }

    Ok(text_response(StatusCode::OK, "accepted"))
}
