// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! Send path (§4.9): a [`Connection`] handle backed by the remote's send lock, with
//! at-most-once `close` semantics enforced by a one-shot `alive` flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;

use crate::codec::{self, ConnectionId, ControlHeader};
use crate::dispatch;
use crate::error::Error;
use crate::local::LocalEndpoint;
use crate::remote::{RemoteEndpoint, RemoteState};

/// A cheap, unidirectional lightweight connection to a peer, obtained from
/// [`LocalEndpoint::dial`].
pub struct Connection {
    local: LocalEndpoint,
    remote: Arc<RemoteEndpoint>,
    conn_id: ConnectionId,
    lcid: u32,
    write_half: Arc<AsyncMutex<OwnedWriteHalf>>,
    alive: AtomicBool,
}

impl Connection {
    pub(crate) fn new(
        local: LocalEndpoint,
        remote: Arc<RemoteEndpoint>,
        conn_id: ConnectionId,
        write_half: Arc<AsyncMutex<OwnedWriteHalf>>,
        lcid: u32,
    ) -> Self {
        Self {
            local,
            remote,
            conn_id,
            lcid,
            write_half,
            alive: AtomicBool::new(true),
        }
    }

    /// The id under which peers will observe data sent on this connection (§6).
    pub fn id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Write a framed payload (§4.9). Fails with [`Error::ConnectionClosed`] after `close`, or
    /// with [`Error::ConnectionLost`] if the underlying heavyweight socket has broken.
    pub async fn send(&self, payload: &[u8]) -> Result<(), Error> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        let max = self.local.config().max_message_len;
        if payload.len() as u32 > max {
            return Err(Error::LimitExceeded {
                what: "message payload",
                max,
            });
        }

        let write_result = {
            let mut w = self.write_half.lock().await;
            let result: Result<(), codec::CodecError> = async {
                codec::write_u32(&mut *w, self.lcid).await?;
                codec::write_length_prefixed(&mut *w, payload).await
            }
            .await;
            result
        };

        if let Err(err) = write_result {
            dispatch::fail_remote(&self.local, &self.remote, Error::Codec(err)).await;
            return Err(Error::ConnectionLost(self.remote.peer.clone()));
        }
        Ok(())
    }

    /// Idempotent close (§4.9, §5 "Cancellation"): the second and later calls are no-ops.
    pub async fn close(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }

        let check_unused = {
            let mut state = self.remote.state.lock();
            match &mut *state {
                RemoteState::Valid(v) => {
                    v.outgoing = v.outgoing.saturating_sub(1);
                    v.quiescent()
                }
                RemoteState::Closing(c) => {
                    c.outgoing = c.outgoing.saturating_sub(1);
                    false
                }
                _ => false,
            }
        };

        let write_result = {
            let mut w = self.write_half.lock().await;
            let result: Result<(), codec::CodecError> = async {
                codec::write_u32(&mut *w, ControlHeader::CloseConnection as u32).await?;
                codec::write_u32(&mut *w, self.lcid).await
            }
            .await;
            result
        };

        if let Err(err) = write_result {
            dispatch::fail_remote(&self.local, &self.remote, Error::Codec(err)).await;
            return;
        }

        if check_unused {
            dispatch::close_if_unused(&self.local, &self.remote).await;
        }
    }
}
