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

#[tokio::test]
async fn basic_exchange() {
    common::init();

    let transport_a = Transport::create("127.0.0.1:0").await.unwrap();
    let transport_b = Transport::create("127.0.0.1:0").await.unwrap();

    let a = transport_a.new_endpoint().unwrap();
    let b = transport_b.new_endpoint().unwrap();

    let conn = a.dial(b.address()).await.unwrap();

    match next_event(&b).await {
        Event::ConnectionOpened(conn_id, peer) => {
            assert_eq!(conn_id, conn.id());
            assert_eq!(peer, a.address());
        }
        other => panic!("expected ConnectionOpened, got {:?}", other),
    }

    conn.send(b"hello").await.unwrap();

    match next_event(&b).await {
        Event::Received(conn_id, payload) => {
            assert_eq!(conn_id, conn.id());
            assert_eq!(&payload[..], b"hello");
        }
        other => panic!("expected Received, got {:?}", other),
    }

    conn.close().await;

    match next_event(&b).await {
        Event::ConnectionClosed(conn_id) => assert_eq!(conn_id, conn.id()),
        other => panic!("expected ConnectionClosed, got {:?}", other),
    }

    transport_a.close().await;
    transport_b.close().await;
}
