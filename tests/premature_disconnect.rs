// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

mod common;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use transport_tcp::{Address, Error, ErrorEvent, Event, Transport};

async fn next_event(endpoint: &transport_tcp::LocalEndpoint) -> Event {
    timeout(Duration::from_secs(5), endpoint.receive())
        .await
        .expect("timed out waiting for an event")
}

/// Scenario 4 (§8): the peer accepts the handshake and then vanishes without ever sending a
/// `CloseSocket`/`CloseEndPoint`. The local side must surface `ErrorEvent::ConnectionLost`
/// rather than hang, and the broken table entry must not block a later retry.
#[tokio::test]
async fn premature_disconnect_surfaces_connection_lost() {
    common::init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let fake_peer_addr = listener.local_addr().unwrap();

    let fake_peer = tokio::spawn(async move {
        let (mut socket, _peer) = listener.accept().await.unwrap();
        let _target_endpoint_id = socket.read_u32().await.unwrap();
        let len = socket.read_u32().await.unwrap();
        let mut addr_buf = vec![0u8; len as usize];
        socket.read_exact(&mut addr_buf).await.unwrap();
        socket.write_u32(0).await.unwrap(); // HandshakeResponse::Accepted
        socket.flush().await.unwrap();
        // Vanish: no CloseSocket, no CloseEndPoint, just drop the socket.
    });

    let transport_a = Transport::create("127.0.0.1:0").await.unwrap();
    let a = transport_a.new_endpoint().unwrap();

    let flaky_peer: Address =
        format!("{}:{}:7", fake_peer_addr.ip(), fake_peer_addr.port()).parse().unwrap();

    let conn = a.dial(flaky_peer.clone()).await.expect("handshake should be accepted");
    fake_peer.await.unwrap();

    match next_event(&a).await {
        Event::ErrorEvent(ErrorEvent::ConnectionLost { peer, .. }) => {
            assert_eq!(peer, flaky_peer);
        }
        other => panic!("expected ErrorEvent::ConnectionLost, got {:?}", other),
    }

    // The connection handle is now backed by a dead socket; sending over it surfaces the
    // same loss rather than hanging.
    let err = conn.send(b"too late").await.expect_err("send after loss should fail");
    assert!(matches!(err, Error::ConnectionLost(_)));

    transport_a.close().await;
}
