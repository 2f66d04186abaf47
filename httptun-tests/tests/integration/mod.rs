#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the httptun ingress/egress relay pair.
//!
//! Each test brings up a real egress relay (dialing a throwaway target TCP
//! server) and a real ingress relay (listening for application TCP
//! clients), wires them together over loopback HTTP, and drives the pair
//! through a raw `TcpStream` exactly as an application client would.

mod concurrent_sessions_test;
mod gzip_test;
mod session_close_test;

use bytes::Bytes;
use httptun_common::config::{EgressConfig, IngressConfig};
use httptun_common::constants::{DEFAULT_GZIP_THRESHOLD_BYTES, DEFAULT_HTTP_PORT};
use httptun_core::events::{EventSink, SessionEndReason};
use httptun_http::egress::EgressState;
use httptun_http::ingress::IngressState;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

/// Bind to an ephemeral port and hand back an address free for reuse.
///
/// There's a small window between releasing the listener and the caller
/// rebinding it; acceptable for test-only use the way the original
/// `get_free_port` helper accepted it.
pub async fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A plain byte-exact TCP echo server: whatever it reads, it writes back
/// verbatim, in order, until the peer closes.
pub async fn start_echo_server(addr: SocketAddr) -> tokio::task::JoinHandle<()> {
    let listener = TcpListener::bind(addr).await.expect("bind echo server");
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 64 * 1024];
                loop {
                    let n = match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    if socket.write_all(&buf[..n]).await.is_err() {
                        return;
                    }
                }
            });
        }
    })
}

/// A TCP server that prefixes each received chunk with `Echo: ` before
/// writing it back, matching the canonical echo-round-trip scenario.
pub async fn start_prefixed_echo_server(addr: SocketAddr) -> tokio::task::JoinHandle<()> {
    let listener = TcpListener::bind(addr).await.expect("bind prefixed echo server");
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                loop {
                    let n = match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    let mut reply = b"Echo: ".to_vec();
                    reply.extend_from_slice(&buf[..n]);
                    if socket.write_all(&reply).await.is_err() {
                        return;
                    }
                }
            });
        }
    })
}

/// Records every event the relays emit, so tests can assert on adaptive
/// buffer resizing and session lifecycle without scraping log output.
#[derive(Clone, Default)]
pub struct RecordingEventSink {
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub resizes: Arc<Mutex<Vec<(usize, usize)>>>,
    pub errors: Arc<Mutex<Vec<String>>>,
}

impl EventSink for RecordingEventSink {
    fn session_opened(&self, _session_id: Uuid) {
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn session_closed(&self, _session_id: Uuid, _reason: SessionEndReason) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn bytes_forwarded(&self, _session_id: Uuid, _n: usize) {}

    fn buffer_resized(&self, _session_id: Uuid, old_size: usize, new_size: usize) {
        self.resizes.lock().unwrap().push((old_size, new_size));
    }

    fn session_error(&self, _session_id: Uuid, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// A running ingress/egress relay pair plus the sink each side reports to.
pub struct RelayPair {
    pub ingress_tcp_addr: SocketAddr,
    pub ingress_sink: RecordingEventSink,
    pub egress_sink: RecordingEventSink,
    ingress: Arc<IngressState>,
    egress: Arc<EgressState>,
    _tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl RelayPair {
    pub fn ingress_open_sessions(&self) -> usize {
        self.ingress.registry.count()
    }

    pub fn egress_open_sessions(&self) -> usize {
        self.egress.open_session_count()
    }
}

/// Bring up a real egress relay (pointed at `target_addr`) and a real
/// ingress relay wired to it, all on loopback ephemeral ports.
pub async fn start_relay_pair(target_addr: SocketAddr, gzip_enabled: bool, gzip_threshold_bytes: usize) -> RelayPair {
    let egress_http_addr = free_addr().await;
    let ingress_tcp_addr = free_addr().await;
    let ingress_callback_addr = free_addr().await;

    let egress_sink = RecordingEventSink::default();
    let egress_config = EgressConfig {
        http_port: egress_http_addr.port(),
        target_ip: target_addr.ip().to_string(),
        target_tcp_port: target_addr.port(),
        gzip_enabled,
        gzip_threshold_bytes,
        callback_timeout: Duration::from_secs(5),
    };
    let egress_state = EgressState::new(egress_config, Arc::new(egress_sink.clone()));
    let egress_handle = {
        let state = egress_state.clone();
        tokio::spawn(async move {
            httptun_http::egress::serve(egress_http_addr, state).await.ok();
        })
    };

    let ingress_sink = RecordingEventSink::default();
    let ingress_config = IngressConfig {
        tcp_port: ingress_tcp_addr.port(),
        response_http_port: ingress_callback_addr.port(),
        egress_base_url: format!("http://127.0.0.1:{}", egress_http_addr.port()),
        callback_host: "127.0.0.1".to_string(),
        gzip_enabled,
        gzip_threshold_bytes,
        put_timeout: Duration::from_secs(5),
        post_timeout: Duration::from_secs(5),
        delete_timeout: Duration::from_secs(5),
    };
    let ingress_state = IngressState::new(ingress_config, Arc::new(ingress_sink.clone()));

    let tcp_handle = {
        let state = ingress_state.clone();
        tokio::spawn(async move {
            httptun_http::ingress::serve(ingress_tcp_addr, state).await.ok();
        })
    };
    let callback_handle = {
        let state = ingress_state.clone();
        tokio::spawn(async move {
            httptun_http::callback::serve(ingress_callback_addr, state).await.ok();
        })
    };

    wait_for_listener(egress_http_addr).await;
    wait_for_listener(ingress_tcp_addr).await;
    wait_for_listener(ingress_callback_addr).await;

    RelayPair {
        ingress_tcp_addr,
        ingress_sink,
        egress_sink,
        ingress: ingress_state,
        egress: egress_state,
        _tasks: vec![egress_handle, tcp_handle, callback_handle],
    }
}

async fn wait_for_listener(addr: SocketAddr) {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("listener at {addr} never came up");
}

/// Connect to the ingress relay's TCP listener as an application client would.
pub async fn connect_client(pair: &RelayPair) -> TcpStream {
    let stream = TcpStream::connect(pair.ingress_tcp_addr).await.unwrap();
    stream.set_nodelay(true).ok();
    stream
}

pub async fn read_exact_timeout(stream: &mut TcpStream, len: usize, timeout: Duration) -> Bytes {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(timeout, stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for bytes")
        .expect("read_exact failed");
    Bytes::from(buf)
}

#[allow(dead_code)]
pub fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

#[allow(dead_code)]
pub fn default_gzip_threshold() -> usize {
    DEFAULT_GZIP_THRESHOLD_BYTES
}
