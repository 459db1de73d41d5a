// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! A minimal echo server: one endpoint dials another, sends a line, and prints whatever comes
//! back on the same lightweight connection.

use transport_tcp::{Event, Transport};

#[tokio::main]
async fn main() -> Result<(), transport_tcp::Error> {
    tracing_subscriber::fmt::init();

    let server_transport = Transport::create("127.0.0.1:0").await?;
    let server = server_transport.new_endpoint()?;
    let server_addr = server.address();

    let server_task = tokio::spawn({
        let server = server.clone();
        async move {
            loop {
                match server.receive().await {
                    Event::ConnectionOpened(conn_id, peer) => {
                        println!("server: {} opened connection {}", peer, conn_id);
                    }
                    Event::Received(conn_id, payload) => {
                        println!(
                            "server: got {:?} on connection {}",
                            String::from_utf8_lossy(&payload),
                            conn_id
                        );
                    }
                    Event::ConnectionClosed(conn_id) => {
                        println!("server: connection {} closed", conn_id);
                    }
                    Event::EndPointClosed => break,
                    Event::ErrorEvent(err) => println!("server: {:?}", err),
                }
            }
        }
    });

    let client_transport = Transport::create("127.0.0.1:0").await?;
    let client = client_transport.new_endpoint()?;

    let conn = client.dial(server_addr).await?;
    conn.send(b"hello, echo").await?;
    conn.close().await;

    // Give the server task a moment to observe and print the exchange before tearing down.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    client_transport.close().await;
    server_transport.close().await;
    server_task.await.ok();

    Ok(())
}
