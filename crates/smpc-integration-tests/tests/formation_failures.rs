//! Integration test: sessions that must fail, and nodes that survive them.
//!
//! A failed session closes the client connection without a response. After
//! every failure the same nodes must still complete a normal signature.

mod common;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use common::Cluster;
use smpc_crypto::x25519::X25519StaticSecret;
use smpc_transport::TransportError;
use smpc_types::NodeInfo;

/// Read until the node closes the stream; fail if it stays open.
async fn expect_closed(mut stream: TcpStream) {
    let mut buf = [0u8; 64];
    let read = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => continue,
            }
        }
    })
    .await;
    assert!(read.is_ok(), "node kept the connection open");
}

async fn still_signs(cluster: &Cluster) {
    let der = cluster
        .sign(0, &[1, 2], b"after failure")
        .await
        .expect("signature after failure");
    cluster.verify(b"after failure", &der);
}

#[tokio::test]
async fn roster_below_minimum_closes_connection() {
    let cluster = Cluster::start(3, 5).await;

    // 3 members, but threshold 3 needs 5 to open a product.
    let result = cluster.sign(0, &[1, 2], b"too few").await;
    assert!(matches!(result, Err(TransportError::Closed)));

    let der = cluster
        .sign(0, &[1, 2, 3, 4], b"enough")
        .await
        .expect("signature");
    cluster.verify(b"enough", &der);
    cluster.stop();
}

#[tokio::test]
async fn unreachable_member_fails_session() {
    let cluster = Cluster::start(2, 3).await;
    let mut roster = cluster.roster(&[1]);
    let gone = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let port = gone.local_addr().expect("addr").port();
    drop(gone);
    let key = X25519StaticSecret::random().public_key();
    roster.push(NodeInfo::new("127.0.0.1", port, key.as_bytes()));

    let request = smpc_types::SignRequest::new(b"unreachable", roster);
    let result =
        smpc_transport::command::request_signature(cluster.nodes[0].addr, &request).await;
    assert!(matches!(result, Err(TransportError::Closed)));

    still_signs(&cluster).await;
    cluster.stop();
}

#[tokio::test]
async fn wrong_static_key_in_roster_fails_session() {
    let cluster = Cluster::start(2, 3).await;
    let mut roster = cluster.roster(&[1, 2]);
    let forged = X25519StaticSecret::random().public_key();
    roster[1] = NodeInfo::new("127.0.0.1", roster[1].port, forged.as_bytes());

    let request = smpc_types::SignRequest::new(b"forged", roster);
    let result =
        smpc_transport::command::request_signature(cluster.nodes[0].addr, &request).await;
    assert!(matches!(result, Err(TransportError::Closed)));

    still_signs(&cluster).await;
    cluster.stop();
}

#[tokio::test]
async fn malformed_handshake_is_dropped() {
    let cluster = Cluster::start(2, 3).await;

    let mut stream = TcpStream::connect(cluster.nodes[1].addr)
        .await
        .expect("connect");
    let mut opening = b"SECU".to_vec();
    opening.extend_from_slice(&[0x5a; 48]);
    stream.write_all(&opening).await.expect("write");
    expect_closed(stream).await;

    still_signs(&cluster).await;
    cluster.stop();
}

#[tokio::test]
async fn unknown_command_is_dropped() {
    let cluster = Cluster::start(2, 3).await;

    let mut stream = TcpStream::connect(cluster.nodes[0].addr)
        .await
        .expect("connect");
    stream.write_all(b"PING").await.expect("write");
    expect_closed(stream).await;

    still_signs(&cluster).await;
    cluster.stop();
}
