// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! The error surface returned to callers of the API (§7 tier 2). Tier-1 local-recovery errors
//! never reach here; they are folded into [`crate::event::ErrorEvent`] instead.

use thiserror::Error;

use crate::address::{Address, AddressError};
use crate::codec::CodecError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("transport is closed")]
    TransportClosed,

    #[error("endpoint is closed")]
    EndPointClosed,

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("connection to {0} was lost")]
    ConnectionLost(Address),

    #[error("remote endpoint rejected the connection request as invalid")]
    ConnectionRequestInvalid,

    #[error("connection request crossed with a concurrent dial from the peer")]
    ConnectionRequestCrossed,

    #[error("remote endpoint rejected the connection request: host mismatch")]
    ConnectionRequestHostMismatch,

    #[error("failed to establish a connection to the remote endpoint")]
    ConnectFailed,

    #[error("no endpoint is listening at the requested address")]
    ConnectNotFound,

    #[error("already connected to this peer")]
    AlreadyConnected,

    #[error("{what} exceeds the configured limit of {max} bytes")]
    LimitExceeded { what: &'static str, max: u32 },

    #[error("invalid control request: {0}")]
    InvalidControlRequest(String),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
