// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::timeout;
use transport_tcp::{Event, Transport};

async fn next_event(endpoint: &transport_tcp::LocalEndpoint) -> Event {
    timeout(Duration::from_secs(5), endpoint.receive())
        .await
        .expect("timed out waiting for an event")
}

/// Scenario 5 (§8): two lightweight connections share one heavyweight socket. Closing both at
/// once races two `closeIfUnused` checks against the same quiescence point, but the socket
/// still tears down cleanly exactly once, and the heavyweight link can be re-established
/// afterwards.
#[tokio::test]
async fn closing_sibling_connections_tears_down_shared_socket_once() {
    common::init();

    let transport_a = Transport::create("127.0.0.1:0").await.unwrap();
    let transport_b = Transport::create("127.0.0.1:0").await.unwrap();

    let a = transport_a.new_endpoint().unwrap();
    let b = transport_b.new_endpoint().unwrap();

    let conn1 = a.dial(b.address()).await.unwrap();
    let conn2 = a.dial(b.address()).await.unwrap();
    assert_ne!(conn1.id(), conn2.id(), "sibling connections get distinct ids");

    let mut opened = HashSet::new();
    for _ in 0..2 {
        match next_event(&b).await {
            Event::ConnectionOpened(conn_id, peer) => {
                assert_eq!(peer, a.address());
                opened.insert(conn_id);
            }
            other => panic!("expected ConnectionOpened, got {:?}", other),
        }
    }
    assert_eq!(opened, HashSet::from([conn1.id(), conn2.id()]));

    // Close both siblings concurrently: only the second to complete should observe
    // quiescence and trigger the CloseSocket handshake.
    tokio::join!(conn1.close(), conn2.close());

    let mut closed = HashSet::new();
    for _ in 0..2 {
        match next_event(&b).await {
            Event::ConnectionClosed(conn_id) => {
                closed.insert(conn_id);
            }
            other => panic!("expected ConnectionClosed, got {:?}", other),
        }
    }
    assert_eq!(closed, opened);

    // The heavyweight socket tore down cleanly; dialing again establishes a fresh one.
    let conn3 = timeout(Duration::from_secs(5), a.dial(b.address()))
        .await
        .expect("redial after teardown should not hang")
        .expect("redial after teardown should succeed");
    match next_event(&b).await {
        Event::ConnectionOpened(conn_id, _) => assert_eq!(conn_id, conn3.id()),
        other => panic!("expected ConnectionOpened after redial, got {:?}", other),
    }

    transport_a.close().await;
    transport_b.close().await;
}
