// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! The six-variant remote-endpoint state machine (§3): the relationship between one
//! [`crate::LocalEndpoint`] and one peer address, from first contact to teardown.
//!
//! Each [`RemoteEndpoint`] owns exactly one [`parking_lot::Mutex`] guarding its tagged
//! [`RemoteState`]. Callers must never hold that lock across an `.await` point; the idiom
//! throughout `setup`/`dispatch`/`send` is to lock, inspect or mutate, capture whatever action
//! (a socket write, a notifier fire) needs to run, drop the guard, then run the action.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;

use crate::address::Address;
use crate::config::FIRST_NONRESERVED_LIGHTWEIGHT_ID;
use crate::error::Error;
use crate::notify::Rendezvous;

/// Who initiated the handshake this [`Init`] state is waiting on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    RequestedByUs,
    RequestedByThem,
}

/// A classified failure recorded on [`RemoteState::Invalid`] / [`RemoteState::Failed`].
#[derive(Clone, Debug)]
pub struct StateError {
    pub kind: StateErrorKind,
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateErrorKind {
    ConnectNotFound,
    ConnectFailed,
    ConnectionLost,
}

impl StateError {
    pub fn new(kind: StateErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Project this internal error onto the public [`Error`] surface for `peer`.
    pub fn to_error(&self, peer: &Address) -> Error {
        match self.kind {
            StateErrorKind::ConnectNotFound => Error::ConnectNotFound,
            StateErrorKind::ConnectFailed => Error::ConnectFailed,
            StateErrorKind::ConnectionLost => Error::ConnectionLost(peer.clone()),
        }
    }
}

/// Handshake in progress; not yet known whether it will resolve to `Valid` or not.
pub struct Init {
    /// Fired once the handshake resolves one way or another (accepted, invalid, failed).
    pub resolved: Arc<Rendezvous>,
    /// Fired only on the crossed-connect losing side, once the winning socket is installed.
    pub crossed: Arc<Rendezvous>,
    pub origin: Origin,
}

/// Operational: exactly one TCP socket backs this peer relationship.
pub struct Valid {
    pub write_half: Arc<AsyncMutex<OwnedWriteHalf>>,
    /// Next lightweight id we will assign to a locally-originated connection.
    pub next_conn_out: u32,
    /// Highest lightweight id we have observed the peer open.
    pub last_incoming: u32,
    /// Peer-originated lightweight connections that are still open.
    pub incoming: HashSet<u32>,
    /// Count of locally-originated lightweight connections that are still open.
    pub outgoing: u32,
}

impl Valid {
    pub fn fresh(write_half: Arc<AsyncMutex<OwnedWriteHalf>>) -> Self {
        Self {
            write_half,
            next_conn_out: FIRST_NONRESERVED_LIGHTWEIGHT_ID,
            last_incoming: 0,
            incoming: HashSet::new(),
            outgoing: 0,
        }
    }

    /// `lastSentByUs` per §4.8: 0 if we have never assigned an id, else the last one we did.
    pub fn last_sent_by_us(&self) -> u32 {
        if self.next_conn_out == FIRST_NONRESERVED_LIGHTWEIGHT_ID {
            0
        } else {
            self.next_conn_out - 1
        }
    }

    pub fn quiescent(&self) -> bool {
        self.outgoing == 0 && self.incoming.is_empty()
    }
}

/// We have sent `CloseSocket` and are waiting for the peer's matching close (or for a racing
/// `CreateNewConnection` to pull us back to `Valid`, §4.7).
pub struct Closing {
    pub resolved: Arc<Rendezvous>,
    pub write_half: Arc<AsyncMutex<OwnedWriteHalf>>,
    pub next_conn_out: u32,
    pub last_incoming: u32,
    pub incoming: HashSet<u32>,
    pub outgoing: u32,
}

impl Closing {
    pub fn last_sent_by_us(&self) -> u32 {
        if self.next_conn_out == FIRST_NONRESERVED_LIGHTWEIGHT_ID {
            0
        } else {
            self.next_conn_out - 1
        }
    }

    pub fn into_valid(self) -> Valid {
        Valid {
            write_half: self.write_half,
            next_conn_out: self.next_conn_out,
            last_incoming: self.last_incoming,
            incoming: self.incoming,
            outgoing: self.outgoing,
        }
    }
}

pub enum RemoteState {
    Init(Init),
    Valid(Valid),
    Closing(Closing),
    /// Terminal: the entry is about to be (or has been) removed from the local endpoint's table.
    Closed,
    Invalid(StateError),
    Failed(StateError),
}

impl RemoteState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init(_) => "Init",
            Self::Valid(_) => "Valid",
            Self::Closing(_) => "Closing",
            Self::Closed => "Closed",
            Self::Invalid(_) => "Invalid",
            Self::Failed(_) => "Failed",
        }
    }
}

/// The relationship between a [`crate::LocalEndpoint`] and one peer address.
pub struct RemoteEndpoint {
    pub peer: Address,
    pub heavyweight_id: u64,
    pub(crate) state: Mutex<RemoteState>,
}

impl RemoteEndpoint {
    pub fn new_init(peer: Address, heavyweight_id: u64, origin: Origin) -> Arc<Self> {
        Arc::new(Self {
            peer,
            heavyweight_id,
            state: Mutex::new(RemoteState::Init(Init {
                resolved: Arc::new(Rendezvous::new()),
                crossed: Arc::new(Rendezvous::new()),
                origin,
            })),
        })
    }
}
