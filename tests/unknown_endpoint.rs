// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

mod common;

use transport_tcp::{Address, Error, Transport};

/// Scenario 3 (§8): dialing an endpoint id nobody registered on an otherwise-live transport
/// gets an explicit rejection, not a hang or a low-level I/O error.
#[tokio::test]
async fn dial_to_unregistered_endpoint_id_is_rejected() {
    common::init();

    let transport_a = Transport::create("127.0.0.1:0").await.unwrap();
    let transport_b = Transport::create("127.0.0.1:0").await.unwrap();

    let a = transport_a.new_endpoint().unwrap();
    // transport_b is live and accepting, but nobody ever called new_endpoint() on it.
    let nowhere = Address::new(transport_b.listen_addr().to_owned(), 999);

    let err = a.dial(nowhere).await.expect_err("dial to an unknown endpoint should fail");
    assert!(matches!(err, Error::ConnectionRequestInvalid));

    transport_a.close().await;
    transport_b.close().await;
}

/// A dial to a port nothing is listening on at all fails distinctly from a protocol-level
/// rejection.
#[tokio::test]
async fn dial_to_unreachable_address_fails_to_connect() {
    common::init();

    let transport_a = Transport::create("127.0.0.1:0").await.unwrap();
    let a = transport_a.new_endpoint().unwrap();

    // Bind and immediately drop a listener to obtain a port nothing is listening on.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = probe.local_addr().unwrap();
    drop(probe);

    let nowhere = Address::new(format!("{}:{}", dead_addr.ip(), dead_addr.port()), 0);
    let err = a.dial(nowhere).await.expect_err("dial to a dead port should fail");
    assert!(matches!(err, Error::ConnectFailed));

    transport_a.close().await;
}
