use crate::{connect_client, read_exact_timeout, start_echo_server, start_relay_pair};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Scenario 4: the client closes its TCP half (FIN). The ingress relay's
/// read loop sees EOF, issues the teardown DELETE, and the egress relay
/// drops its registry entry and target connection in response.
#[tokio::test]
async fn client_close_tears_down_egress_session() {
    let target_addr = crate::free_addr().await;
    start_echo_server(target_addr).await;

    let pair = start_relay_pair(target_addr, false, 1024).await;
    let mut client = connect_client(&pair).await;

    client.write_all(b"ping").await.unwrap();
    let reply = read_exact_timeout(&mut client, 4, Duration::from_secs(2)).await;
    assert_eq!(reply.as_ref(), b"ping");

    assert_eq!(pair.ingress_open_sessions(), 1);
    assert_eq!(pair.egress_open_sessions(), 1);

    client.shutdown().await.unwrap();
    drop(client);

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if pair.ingress_open_sessions() == 0 && pair.egress_open_sessions() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(pair.ingress_open_sessions(), 0, "ingress registry entry should be gone");
    assert_eq!(pair.egress_open_sessions(), 0, "egress registry entry should be gone");
    assert!(pair.ingress_sink.closed.load(Ordering::SeqCst) >= 1);
}

/// Scenario 5: the target server closes first. The egress response pump
/// delivers whatever the target already sent back, then exits; a client
/// write after that point gets no further reply (the session is gone).
#[tokio::test]
async fn target_close_drains_final_reply_then_ends_session() {
    let target_addr = crate::free_addr().await;
    let listener = tokio::net::TcpListener::bind(target_addr).await.unwrap();
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut buf = [0u8; 64];
        let n = socket.read(&mut buf).await.unwrap_or(0);
        if n > 0 {
            let _ = socket.write_all(b"bye").await;
        }
        drop(socket);
    });

    let pair = start_relay_pair(target_addr, false, 1024).await;
    let mut client = connect_client(&pair).await;

    client.write_all(b"close-me").await.unwrap();
    let reply = read_exact_timeout(&mut client, 3, Duration::from_secs(2)).await;
    assert_eq!(reply.as_ref(), b"bye");

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if pair.egress_open_sessions() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(pair.egress_open_sessions(), 0, "egress should drop the session once the target closes");
}
