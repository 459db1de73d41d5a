// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

mod common;

use std::time::Duration;

use tokio::time::timeout;
use transport_tcp::{ErrorEvent, Event, Transport};

async fn next_event(endpoint: &transport_tcp::LocalEndpoint) -> Event {
    timeout(Duration::from_secs(5), endpoint.receive())
        .await
        .expect("timed out waiting for an event")
}

/// Scenario 6 (§8): closing a `LocalEndpoint` while a peer still holds an outgoing connection
/// to it surfaces a loss on the peer's side, and the closed endpoint itself always ends its
/// event stream with `EndPointClosed`.
#[tokio::test]
async fn closing_endpoint_notifies_peers_with_open_connections() {
    common::init();

    let transport_a = Transport::create("127.0.0.1:0").await.unwrap();
    let transport_b = Transport::create("127.0.0.1:0").await.unwrap();

    let a = transport_a.new_endpoint().unwrap();
    let b = transport_b.new_endpoint().unwrap();

    let conn = a.dial(b.address()).await.unwrap();
    match next_event(&b).await {
        Event::ConnectionOpened(conn_id, _) => assert_eq!(conn_id, conn.id()),
        other => panic!("expected ConnectionOpened, got {:?}", other),
    }

    // B shuts its endpoint down while A still has an open outgoing connection to it.
    b.close().await;

    match next_event(&a).await {
        Event::ErrorEvent(ErrorEvent::ConnectionLost { peer, .. }) => {
            assert_eq!(peer, b.address());
        }
        other => panic!("expected ErrorEvent::ConnectionLost on A, got {:?}", other),
    }

    match next_event(&b).await {
        Event::EndPointClosed => {}
        other => panic!("expected EndPointClosed on B, got {:?}", other),
    }
    // Repeated receives after close keep returning EndPointClosed, never hanging.
    match next_event(&b).await {
        Event::EndPointClosed => {}
        other => panic!("expected EndPointClosed to persist on B, got {:?}", other),
    }

    transport_a.close().await;
    transport_b.close().await;
}
