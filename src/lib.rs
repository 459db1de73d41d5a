// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! A reliable, connection-oriented message transport that multiplexes many lightweight
//! user-level connections over a smaller number of underlying TCP sockets.
//!
//! An [`Transport`] binds a listen address and owns a table of [`LocalEndpoint`]s. Each
//! `LocalEndpoint` is independently addressable as `(listen_addr, endpoint_id)`, `dial`s peer
//! endpoints to obtain cheap [`Connection`] handles, and delivers a totally-ordered (per peer)
//! stream of [`Event`]s through [`LocalEndpoint::receive`].
//!
//! ```no_run
//! use transport_tcp::Transport;
//!
//! # async fn run() -> Result<(), transport_tcp::Error> {
//! let transport = Transport::create("127.0.0.1:0").await?;
//! let endpoint = transport.new_endpoint()?;
//! println!("listening as {}", endpoint.address());
//! # Ok(())
//! # }
//! ```

mod address;
mod codec;
mod config;
mod dispatch;
mod error;
mod event;
mod local;
mod notify;
mod rely;
mod remote;
mod send;
mod setup;
mod transport;

pub use address::{Address, AddressError, EndpointId};
pub use codec::ConnectionId;
pub use config::TransportConfig;
pub use error::Error;
pub use event::{ErrorEvent, Event};
pub use local::LocalEndpoint;
pub use send::Connection;
pub use transport::Transport;
