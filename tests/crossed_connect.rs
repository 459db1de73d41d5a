// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

mod common;

use std::time::Duration;

use tokio::time::timeout;
use transport_tcp::{Event, Transport};

async fn next_event(endpoint: &transport_tcp::LocalEndpoint) -> Event {
    timeout(Duration::from_secs(5), endpoint.receive())
        .await
        .expect("timed out waiting for an event")
}

/// Scenario 2 (§8): both sides dial each other at essentially the same time. Exactly one
/// handshake is accepted outright and the other observes `Crossed`, but both dials still
/// resolve to a usable connection and neither side sees a spurious `ConnectionLost`.
#[tokio::test]
async fn crossed_connect_resolves_without_deadlock_or_loss() {
    common::init();

    let transport_a = Transport::create("127.0.0.1:0").await.unwrap();
    let transport_b = Transport::create("127.0.0.1:0").await.unwrap();

    let a = transport_a.new_endpoint().unwrap();
    let b = transport_b.new_endpoint().unwrap();

    let a_addr = a.address();
    let b_addr = b.address();

    let (conn_to_b, conn_to_a) =
        timeout(Duration::from_secs(5), async { tokio::join!(a.dial(b_addr), b.dial(a_addr)) })
            .await
            .expect("crossed dial did not resolve");

    let conn_to_b = conn_to_b.expect("A's dial to B should succeed");
    let conn_to_a = conn_to_a.expect("B's dial to A should succeed");

    // Each side observes exactly one ConnectionOpened for the other's dial.
    match next_event(&b).await {
        Event::ConnectionOpened(conn_id, peer) => {
            assert_eq!(conn_id, conn_to_b.id());
            assert_eq!(peer, a.address());
        }
        other => panic!("expected ConnectionOpened on B, got {:?}", other),
    }
    match next_event(&a).await {
        Event::ConnectionOpened(conn_id, peer) => {
            assert_eq!(conn_id, conn_to_a.id());
            assert_eq!(peer, b.address());
        }
        other => panic!("expected ConnectionOpened on A, got {:?}", other),
    }

    conn_to_b.send(b"from-a").await.unwrap();
    match next_event(&b).await {
        Event::Received(conn_id, payload) => {
            assert_eq!(conn_id, conn_to_b.id());
            assert_eq!(&payload[..], b"from-a");
        }
        other => panic!("expected Received on B, got {:?}", other),
    }

    transport_a.close().await;
    transport_b.close().await;
}
