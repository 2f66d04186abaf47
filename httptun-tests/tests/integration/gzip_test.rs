use crate::{connect_client, read_exact_timeout, start_echo_server, start_relay_pair};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Scenario 2: a 4096-byte payload crosses the 1024-byte gzip threshold;
/// the target still receives (and echoes back) the exact original bytes.
/// The envelope's compression step is an internal wire-format detail the
/// client/target never observe directly — P2 (compression transparency) is
/// what this test actually exercises end to end.
#[tokio::test]
async fn large_payload_round_trips_through_gzip_threshold() {
    let target_addr = crate::free_addr().await;
    start_echo_server(target_addr).await;

    let pair = start_relay_pair(target_addr, true, 1024).await;
    let mut client = connect_client(&pair).await;

    let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    client.write_all(&payload).await.unwrap();

    let reply = read_exact_timeout(&mut client, payload.len(), Duration::from_secs(2)).await;
    assert_eq!(&reply[..], &payload[..]);
}

/// Below-threshold payloads are sent raw; they must still round-trip.
#[tokio::test]
async fn small_payload_below_threshold_round_trips_uncompressed() {
    let target_addr = crate::free_addr().await;
    start_echo_server(target_addr).await;

    let pair = start_relay_pair(target_addr, true, 1024).await;
    let mut client = connect_client(&pair).await;

    let payload = b"tiny message";
    client.write_all(payload).await.unwrap();

    let reply = read_exact_timeout(&mut client, payload.len(), Duration::from_secs(2)).await;
    assert_eq!(&reply[..], &payload[..]);
}
