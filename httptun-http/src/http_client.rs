//! Minimal one-shot HTTP/1.1 client used for every data-plane exchange
//! between the relays: the ingress PUT/POST/DELETE to egress, and the
//! egress callback POST back to ingress.
//!
//! Each call dials a fresh connection and drives it to completion. The
//! relays exchange bursts of small requests rather than a steady stream, so
//! paying one handshake per request is simpler than a keep-alive pool and
//! skips the herd of failure modes a background eviction task has to guard
//! against.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use httptun_common::error::{Result, TunnelError};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

/// A received response with the body fully buffered.
pub struct BufferedResponse {
    pub status: StatusCode,
    pub headers: hyper::HeaderMap,
    pub body: Bytes,
}

/// Send one HTTP/1.1 request to `uri` and wait for the full response.
pub async fn send(
    method: Method,
    uri: &Uri,
    headers: &[(&str, String)],
    body: Bytes,
    timeout: Duration,
) -> Result<BufferedResponse> {
    tokio::time::timeout(timeout, send_inner(method, uri, headers, body))
        .await
        .map_err(|_| TunnelError::Timeout(uri.to_string()))?
}

async fn send_inner(
    method: Method,
    uri: &Uri,
    headers: &[(&str, String)],
    body: Bytes,
) -> Result<BufferedResponse> {
    let authority = uri
        .authority()
        .ok_or_else(|| TunnelError::Upstream(format!("{uri} has no host/port")))?
        .clone();

    let stream = TcpStream::connect(authority.as_str())
        .await
        .map_err(|e| TunnelError::Upstream(format!("connect to {authority} failed: {e}")))?;
    stream.set_nodelay(true).ok();

    let io = TokioIo::new(stream);
    let (mut sender, conn) = http1::handshake(io)
        .await
        .map_err(|e| TunnelError::Upstream(format!("handshake with {authority} failed: {e}")))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "connection driver exited");
        }
    });

    let path_and_query = uri.path_and_query().map_or("/", |p| p.as_str());
    let mut builder = Request::builder()
        .method(method)
        .uri(path_and_query)
        .header(hyper::header::HOST, authority.as_str());
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }
    let request = builder
        .body(Full::new(body))
        .map_err(|e| TunnelError::Upstream(format!("malformed request: {e}")))?;

    let response: Response<Incoming> = sender
        .send_request(request)
        .await
        .map_err(|e| TunnelError::Upstream(format!("request to {authority} failed: {e}")))?;

    let status = response.status();
    let response_headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| TunnelError::Upstream(format!("failed to read response body: {e}")))?
        .to_bytes();

    Ok(BufferedResponse {
        status,
        headers: response_headers,
        body,
    })
}
