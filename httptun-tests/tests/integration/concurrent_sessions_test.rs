use crate::{connect_client, read_exact_timeout, start_prefixed_echo_server, start_relay_pair};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// P3 (session isolation): two application clients tunneling through the
/// same ingress/egress pair concurrently never see each other's bytes, even
/// when their messages are interleaved in flight.
#[tokio::test]
async fn two_concurrent_sessions_stay_isolated() {
    let target_addr = crate::free_addr().await;
    start_prefixed_echo_server(target_addr).await;

    let pair = start_relay_pair(target_addr, true, 1024).await;

    let mut client_a = connect_client(&pair).await;
    let mut client_b = connect_client(&pair).await;

    let run = |label: &'static str, mut stream: tokio::net::TcpStream| async move {
        for i in 0..200u32 {
            let msg = format!("{label}-{i}\n");
            stream.write_all(msg.as_bytes()).await.unwrap();
            let expected = format!("Echo: {label}-{i}\n");
            let reply = read_exact_timeout(&mut stream, expected.len(), Duration::from_secs(2)).await;
            assert_eq!(reply.as_ref(), expected.as_bytes(), "message {i} on session {label} corrupted");
        }
    };

    let (res_a, res_b) = tokio::join!(run("A", client_a), run("B", client_b));
    drop((res_a, res_b));

    assert_eq!(pair.ingress_sink.opened.load(std::sync::atomic::Ordering::SeqCst), 2);
}

/// A third session opened after the first two close still gets a session id
/// neither earlier session used, and behaves independently.
#[tokio::test]
async fn sessions_do_not_reuse_state_across_connects() {
    let target_addr = crate::free_addr().await;
    start_prefixed_echo_server(target_addr).await;

    let pair = start_relay_pair(target_addr, false, 1024).await;

    {
        let mut client = connect_client(&pair).await;
        client.write_all(b"first\n").await.unwrap();
        let reply = read_exact_timeout(&mut client, b"Echo: first\n".len(), Duration::from_secs(2)).await;
        assert_eq!(reply.as_ref(), b"Echo: first\n");
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut client = connect_client(&pair).await;
    client.write_all(b"second\n").await.unwrap();
    let reply = read_exact_timeout(&mut client, b"Echo: second\n".len(), Duration::from_secs(2)).await;
    assert_eq!(reply.as_ref(), b"Echo: second\n");

    assert_eq!(pair.ingress_sink.opened.load(std::sync::atomic::Ordering::SeqCst), 2);
}
