// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! Connection-setup protocol: `findRemoteEndPoint` rendezvous (§4.4), outbound `dial`
//! handshake (§4.5), inbound accept handshake (§4.6), and the crossed-connect tie-break.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;

use crate::address::Address;
use crate::codec::{self, ControlHeader, HandshakeResponse};
use crate::dispatch;
use crate::error::Error;
use crate::local::LocalEndpoint;
use crate::notify::Rendezvous;
use crate::remote::{Origin, RemoteEndpoint, RemoteState, StateError, StateErrorKind, Valid};
use crate::send::Connection;
use crate::transport::TransportInner;

/// The four outcomes the peer's handshake response can resolve to (§4.1).
enum DialAttempt {
    Accepted,
    Invalid,
    Crossed,
    HostMismatch,
}

/// `findRemoteEndPoint` (§4.4): resolve `peer` to a `RemoteEndpoint`, waiting out any
/// in-progress handshake or teardown and retrying as the table entry evolves.
async fn find_remote_endpoint(
    local: &LocalEndpoint,
    peer: &Address,
    origin: Origin,
) -> Result<(Arc<RemoteEndpoint>, bool), Error> {
    loop {
        let (entry, is_new) = local.lookup_or_insert_init(peer, origin)?;
        if is_new {
            return Ok((entry, true));
        }

        enum Action {
            Existing,
            NewFalse,
            Retry,
            Wait(Arc<Rendezvous>),
            WaitThenNew(Arc<Rendezvous>),
            Fail(Error),
        }

        let action = {
            let mut state = entry.state.lock();
            match &mut *state {
                RemoteState::Valid(v) => match origin {
                    Origin::RequestedByUs => {
                        v.outgoing += 1;
                        Action::Existing
                    }
                    Origin::RequestedByThem => Action::Fail(Error::AlreadyConnected),
                },
                RemoteState::Init(init) => match origin {
                    Origin::RequestedByUs => Action::Wait(init.resolved.clone()),
                    Origin::RequestedByThem => match init.origin {
                        Origin::RequestedByThem => Action::Fail(Error::AlreadyConnected),
                        Origin::RequestedByUs => {
                            if local.address().to_string() > peer.to_string() {
                                Action::WaitThenNew(init.crossed.clone())
                            } else {
                                Action::NewFalse
                            }
                        }
                    },
                },
                RemoteState::Closing(c) => Action::Wait(c.resolved.clone()),
                RemoteState::Closed => Action::Retry,
                RemoteState::Invalid(e) | RemoteState::Failed(e) => Action::Fail(e.to_error(peer)),
            }
        };

        match action {
            Action::Existing => return Ok((entry, false)),
            Action::NewFalse => return Ok((entry, false)),
            Action::Fail(e) => return Err(e),
            Action::Wait(r) => {
                r.wait().await;
                continue;
            }
            Action::WaitThenNew(r) => {
                r.wait().await;
                return Ok((entry, true));
            }
            Action::Retry => {
                local.remove_remote_if_current(peer, entry.heavyweight_id);
                continue;
            }
        }
    }
}

fn reset_if_broken(local: &LocalEndpoint, peer: &Address) {
    if let Some(entry) = local.peek_remote(peer) {
        let broken = matches!(
            &*entry.state.lock(),
            RemoteState::Invalid(_) | RemoteState::Failed(_)
        );
        if broken {
            local.remove_remote_if_current(peer, entry.heavyweight_id);
        }
    }
}

/// Open a lightweight connection to `peer` (§4.5).
#[tracing::instrument(skip(local), fields(local = %local.address()))]
pub(crate) async fn dial(local: &LocalEndpoint, peer: Address) -> Result<Connection, Error> {
    reset_if_broken(local, &peer);

    loop {
        let (entry, is_new) = find_remote_endpoint(local, &peer, Origin::RequestedByUs).await?;

        if !is_new {
            return allocate_outbound_connection(local, &entry).await;
        }

        match perform_outbound_handshake(local, &entry, &peer).await? {
            DialAttempt::Accepted => continue,
            DialAttempt::Crossed => {
                let crossed = match &*entry.state.lock() {
                    RemoteState::Init(init) => init.crossed.clone(),
                    other => crate::rely::violation(format!(
                        "dial: expected Init after Crossed response, found {}",
                        other.name()
                    )),
                };
                crossed.fire();
                continue;
            }
            DialAttempt::Invalid => return Err(Error::ConnectionRequestInvalid),
            DialAttempt::HostMismatch => return Err(Error::ConnectionRequestHostMismatch),
        }
    }
}

async fn perform_outbound_handshake(
    local: &LocalEndpoint,
    entry: &Arc<RemoteEndpoint>,
    peer: &Address,
) -> Result<DialAttempt, Error> {
    let our_address = local.address().to_string();

    let socket = match TcpStream::connect(peer.host_port()).await {
        Ok(s) => s,
        Err(err) => {
            mark_invalid(entry, StateErrorKind::ConnectFailed, err.to_string());
            return Err(Error::ConnectFailed);
        }
    };
    let _ = socket.set_nodelay(true);
    let (mut read_half, mut write_half) = socket.into_split();

    if let Err(err) = codec::write_u32(&mut write_half, peer.endpoint_id()).await {
        mark_invalid(entry, StateErrorKind::ConnectFailed, err.to_string());
        return Err(Error::ConnectFailed);
    }
    if let Err(err) = codec::write_length_prefixed_string(&mut write_half, &our_address).await {
        mark_invalid(entry, StateErrorKind::ConnectFailed, err.to_string());
        return Err(Error::ConnectFailed);
    }
    let response = match codec::read_u32(&mut read_half).await {
        Ok(word) => word,
        Err(err) => {
            mark_invalid(entry, StateErrorKind::ConnectFailed, err.to_string());
            return Err(Error::ConnectFailed);
        }
    };

    match HandshakeResponse::from_u32(response) {
        Some(HandshakeResponse::Accepted) => {
            let write_half = Arc::new(AsyncMutex::new(write_half));
            let resolved = install_valid(entry, write_half.clone());
            resolved.fire();
            tokio::spawn(dispatch::run(local.clone(), entry.clone(), read_half));
            Ok(DialAttempt::Accepted)
        }
        Some(HandshakeResponse::Invalid) => {
            mark_invalid(entry, StateErrorKind::ConnectNotFound, "peer replied Invalid");
            Ok(DialAttempt::Invalid)
        }
        Some(HandshakeResponse::Crossed) => {
            drop(read_half);
            Ok(DialAttempt::Crossed)
        }
        Some(HandshakeResponse::HostMismatch) => {
            mark_invalid(entry, StateErrorKind::ConnectFailed, "peer replied HostMismatch");
            Ok(DialAttempt::HostMismatch)
        }
        None => {
            mark_invalid(
                entry,
                StateErrorKind::ConnectFailed,
                format!("unrecognised handshake response {}", response),
            );
            Ok(DialAttempt::Invalid)
        }
    }
}

/// Allocate the next outbound lightweight id and announce it to the peer with
/// `CreateNewConnection` (§4.5 step 4), under the send lock like every other control write.
async fn allocate_outbound_connection(
    local: &LocalEndpoint,
    entry: &Arc<RemoteEndpoint>,
) -> Result<Connection, Error> {
    let (conn_id, lcid, write_half) = {
        let mut state = entry.state.lock();
        match &mut *state {
            RemoteState::Valid(v) => {
                let lcid = v.next_conn_out;
                v.next_conn_out += 1;
                let conn_id = codec::make_connection_id(entry.heavyweight_id, lcid);
                (conn_id, lcid, v.write_half.clone())
            }
            other => crate::rely::violation(format!(
                "allocate_outbound_connection: expected Valid, found {}",
                other.name()
            )),
        }
    };

    let write_result = {
        let mut w = write_half.lock().await;
        let result: Result<(), codec::CodecError> = async {
            codec::write_u32(&mut *w, ControlHeader::CreateNewConnection as u32).await?;
            codec::write_u32(&mut *w, lcid).await
        }
        .await;
        result
    };

    if let Err(err) = write_result {
        dispatch::fail_remote(local, entry, Error::Codec(err)).await;
        return Err(Error::ConnectionLost(entry.peer.clone()));
    }

    Ok(Connection::new(local.clone(), entry.clone(), conn_id, write_half, lcid))
}

fn install_valid(entry: &Arc<RemoteEndpoint>, write_half: Arc<AsyncMutex<tokio::net::tcp::OwnedWriteHalf>>) -> Arc<Rendezvous> {
    let mut state = entry.state.lock();
    match &*state {
        RemoteState::Init(init) => {
            let resolved = init.resolved.clone();
            *state = RemoteState::Valid(Valid::fresh(write_half));
            resolved
        }
        other => crate::rely::violation(format!("install_valid: expected Init, found {}", other.name())),
    }
}

fn mark_invalid(entry: &Arc<RemoteEndpoint>, kind: StateErrorKind, detail: impl Into<String>) {
    let mut state = entry.state.lock();
    let resolved = match &*state {
        RemoteState::Init(init) => Some(init.resolved.clone()),
        _ => None,
    };
    *state = RemoteState::Invalid(StateError::new(kind, detail));
    drop(state);
    if let Some(resolved) = resolved {
        resolved.fire();
    }
}

/// Inbound accept handshake (§4.6). Runs for the lifetime of the accepted socket: on success it
/// tail-calls straight into the receive dispatcher and does not return until the socket closes.
#[tracing::instrument(skip(inner, socket), fields(peer_addr = %peer_addr))]
pub(crate) async fn handle_inbound(
    inner: &Arc<TransportInner>,
    socket: TcpStream,
    peer_addr: SocketAddr,
) -> Result<(), Error> {
    let _ = socket.set_nodelay(true);
    let (mut read_half, mut write_half) = socket.into_split();

    let target_endpoint_id = codec::read_u32(&mut read_half).await?;
    let peer_address_str =
        codec::read_length_prefixed_string(&mut read_half, inner.config.max_address_len).await?;
    let peer = match Address::parse(&peer_address_str, inner.config.max_address_len) {
        Ok(p) => p,
        Err(_) => {
            let _ = codec::write_u32(&mut write_half, HandshakeResponse::Invalid as u32).await;
            return Ok(());
        }
    };

    let claimed_host: Option<std::net::IpAddr> = peer.host().parse().ok();
    if claimed_host != Some(peer_addr.ip()) {
        let _ = codec::write_u32(&mut write_half, HandshakeResponse::HostMismatch as u32).await;
        return Ok(());
    }

    let local = match inner.find_endpoint(target_endpoint_id) {
        Some(l) => l,
        None => {
            let _ = codec::write_u32(&mut write_half, HandshakeResponse::Invalid as u32).await;
            return Ok(());
        }
    };

    let (entry, is_new) = match find_remote_endpoint(&local, &peer, Origin::RequestedByThem).await {
        Ok(v) => v,
        Err(_) => {
            let _ = codec::write_u32(&mut write_half, HandshakeResponse::Invalid as u32).await;
            return Ok(());
        }
    };

    if !is_new {
        let _ = codec::write_u32(&mut write_half, HandshakeResponse::Crossed as u32).await;
        return Ok(());
    }

    let write_half = Arc::new(AsyncMutex::new(write_half));
    let resolved = install_valid(&entry, write_half.clone());
    resolved.fire();

    {
        let mut w = write_half.lock().await;
        codec::write_u32(&mut w, HandshakeResponse::Accepted as u32).await?;
    }

    dispatch::run(local, entry, read_half).await;
    Ok(())
}
