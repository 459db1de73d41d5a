// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! Incoming-message dispatcher (§4.7) and graceful socket teardown (§4.8): the per-`Valid`
//! remote receive loop that decodes control headers and data frames, drives the remote state
//! machine, and enqueues user events.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::Mutex as AsyncMutex;

use crate::codec::{self, ConnectionId, ControlHeader};
use crate::error::Error;
use crate::event::{ErrorEvent, Event};
use crate::local::LocalEndpoint;
use crate::remote::{RemoteEndpoint, RemoteState, StateError, StateErrorKind};

enum Flow {
    Continue,
    Stop,
}

/// Take ownership of the current state, leaving a `Closed` placeholder in its place until the
/// caller writes back whatever the real next state is. Lets handlers match on an owned
/// `RemoteState` (needed to move fields like `Closing::write_half` into a new `Valid`) without
/// fighting the borrow checker over a `&mut` match.
fn take(remote: &RemoteEndpoint) -> RemoteState {
    let mut state = remote.state.lock();
    std::mem::replace(&mut *state, RemoteState::Closed)
}

fn put(remote: &RemoteEndpoint, new_state: RemoteState) {
    *remote.state.lock() = new_state;
}

/// The per-`Valid`-remote receive-dispatch activity (§4.7). Runs until the socket is closed or
/// a protocol violation ends the heavyweight connection; never returns an error to its caller,
/// since every failure here is resolved internally per the §7 tiering.
#[tracing::instrument(skip(local, remote, read_half), fields(peer = %remote.peer))]
pub(crate) async fn run(local: LocalEndpoint, remote: Arc<RemoteEndpoint>, mut read_half: OwnedReadHalf) {
    loop {
        let word = match codec::read_u32(&mut read_half).await {
            Ok(w) => w,
            Err(err) => {
                fail_remote(&local, &remote, Error::Codec(err)).await;
                break;
            }
        };

        let flow = if codec::is_lightweight_id(word) {
            handle_data_frame(&local, &remote, &mut read_half, word).await
        } else {
            match ControlHeader::from_u32(word) {
                Some(header) => handle_control(&local, &remote, &mut read_half, header).await,
                None => Err(Error::InvalidControlRequest(format!("unrecognised tag {}", word))),
            }
        };

        match flow {
            Ok(Flow::Continue) => continue,
            Ok(Flow::Stop) => break,
            Err(err) => {
                fail_remote(&local, &remote, err).await;
                break;
            }
        }
    }
}

async fn handle_data_frame(
    local: &LocalEndpoint,
    remote: &Arc<RemoteEndpoint>,
    read_half: &mut OwnedReadHalf,
    lcid: u32,
) -> Result<Flow, Error> {
    let payload = codec::read_length_prefixed(read_half, local.config().max_message_len).await?;
    let conn_id = codec::make_connection_id(remote.heavyweight_id, lcid);
    local.enqueue(Event::Received(conn_id, payload));
    Ok(Flow::Continue)
}

async fn handle_control(
    local: &LocalEndpoint,
    remote: &Arc<RemoteEndpoint>,
    read_half: &mut OwnedReadHalf,
    header: ControlHeader,
) -> Result<Flow, Error> {
    match header {
        ControlHeader::CreateNewConnection => {
            let lcid = codec::read_u32(read_half).await?;
            handle_create_new_connection(local, remote, lcid)
        }
        ControlHeader::CloseConnection => {
            let lcid = codec::read_u32(read_half).await?;
            handle_close_connection(local, remote, lcid)
        }
        ControlHeader::CloseSocket => {
            let last_received_by_peer = codec::read_u32(read_half).await?;
            handle_close_socket(local, remote, last_received_by_peer).await
        }
        ControlHeader::CloseEndPoint => Ok(handle_close_endpoint(local, remote)),
        ControlHeader::ProbeSocket | ControlHeader::ProbeSocketAck => Ok(Flow::Continue),
    }
}

fn handle_create_new_connection(
    local: &LocalEndpoint,
    remote: &Arc<RemoteEndpoint>,
    lcid: u32,
) -> Result<Flow, Error> {
    let old = take(remote);
    let (new_state, resolved_to_fire) = match old {
        RemoteState::Valid(mut v) => {
            v.incoming.insert(lcid);
            v.last_incoming = lcid;
            (RemoteState::Valid(v), None)
        }
        RemoteState::Closing(c) => {
            let resolved = c.resolved.clone();
            let mut v = c.into_valid();
            v.incoming.insert(lcid);
            v.last_incoming = lcid;
            (RemoteState::Valid(v), Some(resolved))
        }
        // A local `close()` raced this frame onto the wire moments before we force-closed the
        // remote; the peer doesn't know that yet. Tolerate it rather than rely-violating.
        failed @ RemoteState::Failed(_) => {
            put(remote, failed);
            return Ok(Flow::Continue);
        }
        other => crate::rely::violation(format!(
            "CreateNewConnection received while remote was {}",
            other.name()
        )),
    };
    put(remote, new_state);
    if let Some(resolved) = resolved_to_fire {
        resolved.fire();
    }
    let conn_id = codec::make_connection_id(remote.heavyweight_id, lcid);
    local.enqueue(Event::ConnectionOpened(conn_id, remote.peer.clone()));
    Ok(Flow::Continue)
}

fn handle_close_connection(
    local: &LocalEndpoint,
    remote: &Arc<RemoteEndpoint>,
    lcid: u32,
) -> Result<Flow, Error> {
    let old = take(remote);
    let (new_state, removed) = match old {
        RemoteState::Valid(mut v) => {
            let removed = v.incoming.remove(&lcid);
            (RemoteState::Valid(v), removed)
        }
        RemoteState::Closing(mut c) => {
            let removed = c.incoming.remove(&lcid);
            (RemoteState::Closing(c), removed)
        }
        // Tolerate the same race as `handle_create_new_connection`: a force-close already
        // moved this remote to `Failed` while this frame was in flight.
        failed @ RemoteState::Failed(_) => {
            put(remote, failed);
            return Ok(Flow::Continue);
        }
        other => crate::rely::violation(format!(
            "CloseConnection received while remote was {}",
            other.name()
        )),
    };
    put(remote, new_state);
    if !removed {
        return Err(Error::InvalidControlRequest(format!(
            "CloseConnection for lcid {} not in incoming",
            lcid
        )));
    }
    let conn_id = codec::make_connection_id(remote.heavyweight_id, lcid);
    local.enqueue(Event::ConnectionClosed(conn_id));
    Ok(Flow::Continue)
}

async fn handle_close_socket(
    local: &LocalEndpoint,
    remote: &Arc<RemoteEndpoint>,
    last_received_by_peer: u32,
) -> Result<Flow, Error> {
    struct Finish {
        write_half: Arc<AsyncMutex<tokio::net::tcp::OwnedWriteHalf>>,
        // `Some(last_incoming)` to reply with our own `CloseSocket`, `None` to just shut down.
        reply: Option<u32>,
        resolved: Option<Arc<crate::notify::Rendezvous>>,
    }

    let old = take(remote);
    let (new_state, closed_ids, finish) = match old {
        RemoteState::Valid(mut v) => {
            let closed_ids: Vec<ConnectionId> = v
                .incoming
                .drain()
                .map(|lcid| codec::make_connection_id(remote.heavyweight_id, lcid))
                .collect();
            let last_sent = v.last_sent_by_us();
            if v.outgoing > 0 || last_received_by_peer != last_sent {
                (RemoteState::Valid(v), closed_ids, None)
            } else {
                let finish = Finish {
                    write_half: v.write_half.clone(),
                    reply: Some(v.last_incoming),
                    resolved: None,
                };
                (RemoteState::Closed, closed_ids, Some(finish))
            }
        }
        RemoteState::Closing(c) => {
            let last_sent = c.last_sent_by_us();
            if c.outgoing > 0 || last_received_by_peer != last_sent {
                (RemoteState::Closing(c), Vec::new(), None)
            } else {
                // We already sent our own `CloseSocket` to get into `Closing`; this frame is
                // the peer's matching reply. Just close and notify `resolved` (§4.8) — writing
                // a second `CloseSocket` would race shutting down a socket the peer may
                // already be tearing down from its end.
                let finish = Finish {
                    write_half: c.write_half.clone(),
                    reply: None,
                    resolved: Some(c.resolved.clone()),
                };
                (RemoteState::Closed, Vec::new(), Some(finish))
            }
        }
        // A local `close()` raced this frame onto the wire moments before we force-closed the
        // remote; the socket is already (being) shut down by that path.
        failed @ RemoteState::Failed(_) => (failed, Vec::new(), None),
        other => crate::rely::violation(format!("CloseSocket received while remote was {}", other.name())),
    };
    put(remote, new_state);

    for id in closed_ids {
        local.enqueue(Event::ConnectionClosed(id));
    }

    match finish {
        None => Ok(Flow::Continue),
        Some(Finish { write_half, reply, resolved }) => {
            local.remove_remote_if_current(&remote.peer, remote.heavyweight_id);
            {
                let mut w = write_half.lock().await;
                if let Some(last_incoming) = reply {
                    let _ = codec::write_u32(&mut w, ControlHeader::CloseSocket as u32).await;
                    let _ = codec::write_u32(&mut w, last_incoming).await;
                }
                let _ = w.shutdown().await;
            }
            if let Some(resolved) = resolved {
                resolved.fire();
            }
            Ok(Flow::Stop)
        }
    }
}

fn handle_close_endpoint(local: &LocalEndpoint, remote: &Arc<RemoteEndpoint>) -> Flow {
    let old = take(remote);
    let (incoming, outgoing) = match old {
        RemoteState::Valid(ref v) => (v.incoming.clone(), v.outgoing),
        RemoteState::Closing(ref c) => (c.incoming.clone(), c.outgoing),
        // A local `close()` raced this frame onto the wire moments before we force-closed the
        // remote; the table entry and socket are already being torn down by that path.
        failed @ RemoteState::Failed(_) => {
            put(remote, failed);
            return Flow::Stop;
        }
        other => crate::rely::violation(format!("CloseEndPoint received while remote was {}", other.name())),
    };
    put(remote, RemoteState::Closed);
    local.remove_remote_if_current(&remote.peer, remote.heavyweight_id);

    for lcid in incoming {
        let conn_id = codec::make_connection_id(remote.heavyweight_id, lcid);
        local.enqueue(Event::ConnectionClosed(conn_id));
    }
    if outgoing > 0 {
        local.enqueue(Event::ErrorEvent(ErrorEvent::ConnectionLost {
            peer: remote.peer.clone(),
            detail: "peer closed its endpoint".to_owned(),
        }));
    }
    Flow::Stop
}

/// Any read error (§4.7): fold into `Failed` and surface `ConnectionLost`, tolerating the entry
/// already having been removed by a concurrent force-close (§9, "back-references and
/// ownership") — that is normal termination, not a bug. `Invalid`/`Init` here would mean the
/// dispatcher somehow started running before the handshake installed `Valid`, which cannot
/// happen: that is a genuine rely violation.
pub(crate) async fn fail_remote(local: &LocalEndpoint, remote: &Arc<RemoteEndpoint>, err: Error) {
    let detail = err.to_string();
    let was_local_valid = !local.is_closed();
    let old = take(remote);
    let (new_state, emit) = match old {
        RemoteState::Valid(_) | RemoteState::Closing(_) => {
            local.remove_remote_if_current(&remote.peer, remote.heavyweight_id);
            (
                RemoteState::Failed(StateError::new(StateErrorKind::ConnectionLost, detail.clone())),
                true,
            )
        }
        RemoteState::Failed(e) => (RemoteState::Failed(e), was_local_valid),
        // A concurrent force-close already replaced the entry with `Closed` — normal
        // termination, not a rely violation (§9).
        RemoteState::Closed => (RemoteState::Closed, false),
        other => crate::rely::violation(format!(
            "receive loop hit a read error while remote was {}: {}",
            other.name(),
            detail
        )),
    };
    put(remote, new_state);
    if emit {
        local.enqueue(Event::ErrorEvent(ErrorEvent::ConnectionLost {
            peer: remote.peer.clone(),
            detail,
        }));
    }
}

/// `closeIfUnused` (§4.8 final paragraph): called after a user `close()` on a handle drops
/// `outgoing` to zero. If the remote is now fully quiescent, begin graceful teardown.
pub(crate) async fn close_if_unused(local: &LocalEndpoint, remote: &Arc<RemoteEndpoint>) {
    struct Finish {
        write_half: Arc<AsyncMutex<tokio::net::tcp::OwnedWriteHalf>>,
        last_incoming: u32,
    }

    let old = take(remote);
    let (new_state, finish) = match old {
        RemoteState::Valid(v) if v.quiescent() => {
            let finish = Finish {
                write_half: v.write_half.clone(),
                last_incoming: v.last_incoming,
            };
            let closing = crate::remote::Closing {
                resolved: Arc::new(crate::notify::Rendezvous::new()),
                write_half: v.write_half,
                next_conn_out: v.next_conn_out,
                last_incoming: v.last_incoming,
                incoming: v.incoming,
                outgoing: v.outgoing,
            };
            (RemoteState::Closing(closing), Some(finish))
        }
        other => (other, None),
    };
    put(remote, new_state);

    if let Some(Finish { write_half, last_incoming }) = finish {
        let mut w = write_half.lock().await;
        if let Err(err) = async {
            codec::write_u32(&mut *w, ControlHeader::CloseSocket as u32).await?;
            codec::write_u32(&mut *w, last_incoming).await
        }
        .await
        {
            drop(w);
            fail_remote(local, remote, Error::Codec(err)).await;
        }
    }
}

/// A user's `LocalEndpoint::close()` force-tearing-down every remote it owns (§4.3): `Init`
/// entries are failed outright (nobody is going to finish their handshake); `Valid`/`Closing`
/// entries get a best-effort `CloseEndPoint` and their socket shut down.
pub(crate) async fn force_close_for_endpoint_shutdown(remote: &Arc<RemoteEndpoint>) {
    struct Finish {
        write_half: Arc<AsyncMutex<tokio::net::tcp::OwnedWriteHalf>>,
    }

    let old = take(remote);
    let (new_state, finish, to_fire) = match old {
        RemoteState::Init(init) => (
            RemoteState::Failed(StateError::new(
                StateErrorKind::ConnectionLost,
                "local endpoint closed while handshake was in progress",
            )),
            None,
            vec![init.resolved, init.crossed],
        ),
        // Not `Closed`: the write/shutdown below is not synchronized with the peer's in-flight
        // bytes, so the receive loop (already parked on `read_half`) can still decode one more
        // control frame the peer sent moments ago. `Failed` is the state every dispatch handler
        // above explicitly tolerates; `Closed` there is a rely violation.
        RemoteState::Valid(v) => (
            RemoteState::Failed(StateError::new(StateErrorKind::ConnectionLost, "local endpoint closed")),
            Some(Finish { write_half: v.write_half }),
            vec![],
        ),
        RemoteState::Closing(c) => {
            let resolved = c.resolved.clone();
            (
                RemoteState::Failed(StateError::new(StateErrorKind::ConnectionLost, "local endpoint closed")),
                Some(Finish { write_half: c.write_half }),
                vec![resolved],
            )
        }
        other => (other, None, vec![]),
    };
    put(remote, new_state);

    for r in to_fire {
        r.fire();
    }

    if let Some(Finish { write_half }) = finish {
        let mut w = write_half.lock().await;
        let _ = codec::write_u32(&mut w, ControlHeader::CloseEndPoint as u32).await;
        let _ = w.shutdown().await;
    }
}
