// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! The totally-ordered (per peer) stream of events a [`crate::LocalEndpoint`] delivers to its
//! user through [`crate::LocalEndpoint::receive`].

use bytes::Bytes;

use crate::address::Address;
use crate::codec::ConnectionId;

/// An event enqueued on a [`crate::LocalEndpoint`]'s queue.
#[derive(Clone, Debug)]
pub enum Event {
    /// A peer opened a new lightweight connection to us.
    ConnectionOpened(ConnectionId, Address),
    /// A framed payload arrived on an already-open lightweight connection.
    Received(ConnectionId, Bytes),
    /// A lightweight connection (ours or the peer's) was closed.
    ConnectionClosed(ConnectionId),
    /// Something went wrong with a heavyweight connection; the failure is not tied to any
    /// single lightweight connection on it.
    ErrorEvent(ErrorEvent),
    /// The final event on this queue: the owning endpoint has been closed.
    EndPointClosed,
}

/// The cause carried by [`Event::ErrorEvent`].
#[derive(Clone, Debug)]
pub enum ErrorEvent {
    /// The heavyweight connection to `peer` broke after becoming usable.
    ConnectionLost { peer: Address, detail: String },
}
