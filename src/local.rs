// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! [`LocalEndpoint`]: an event queue plus a table of [`RemoteEndpoint`]s (§4.3).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::address::{Address, EndpointId};
use crate::config::{TransportConfig, FIRST_NONRESERVED_HEAVYWEIGHT_ID};
use crate::error::Error;
use crate::event::Event;
use crate::remote::{Origin, RemoteEndpoint};
use crate::setup;

struct LocalState {
    closed: bool,
    remotes: HashMap<Address, Arc<RemoteEndpoint>>,
    next_heavyweight_id: u64,
}

struct LocalEndpointInner {
    listen_addr: String,
    endpoint_id: EndpointId,
    config: TransportConfig,
    state: Mutex<LocalState>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: AsyncMutex<mpsc::UnboundedReceiver<Event>>,
}

/// A named participant `(host:port, epid)` within a [`crate::Transport`].
///
/// Cheaply cloneable; all clones refer to the same underlying endpoint (same queue, same
/// remote table). `receive` is single-consumer in the sense that concurrent callers will each
/// get a disjoint subset of the event stream, not that cloning is forbidden.
#[derive(Clone)]
pub struct LocalEndpoint(pub(crate) Arc<LocalEndpointInner>);

impl LocalEndpoint {
    pub(crate) fn new(listen_addr: String, endpoint_id: EndpointId, config: TransportConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self(Arc::new(LocalEndpointInner {
            listen_addr,
            endpoint_id,
            config,
            state: Mutex::new(LocalState {
                closed: false,
                remotes: HashMap::new(),
                next_heavyweight_id: FIRST_NONRESERVED_HEAVYWEIGHT_ID,
            }),
            events_tx,
            events_rx: AsyncMutex::new(events_rx),
        }))
    }

    /// `(listenAddr, epid)` per §4.3.
    pub fn address(&self) -> Address {
        Address::new(self.0.listen_addr.clone(), self.0.endpoint_id)
    }

    /// Block until the next event is available and return it.
    ///
    /// Returns [`Event::EndPointClosed`] forever once the endpoint has been closed and the
    /// queue drained, matching the invariant that it is always the final event observed.
    pub async fn receive(&self) -> Event {
        let mut rx = self.0.events_rx.lock().await;
        rx.recv().await.unwrap_or(Event::EndPointClosed)
    }

    /// Open a lightweight connection to `peer` (§4.5).
    pub async fn dial(&self, peer: Address) -> Result<crate::send::Connection, Error> {
        setup::dial(self, peer).await
    }

    /// Mark the endpoint closed and tear down every remote relationship (§4.3).
    pub async fn close(&self) {
        let remotes: Vec<Arc<RemoteEndpoint>> = {
            let mut state = self.0.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.remotes.drain().map(|(_, r)| r).collect()
        };

        for remote in remotes {
            crate::dispatch::force_close_for_endpoint_shutdown(&remote).await;
        }

        self.enqueue(Event::EndPointClosed);
    }

    pub(crate) fn config(&self) -> &TransportConfig {
        &self.0.config
    }

    pub(crate) fn listen_addr(&self) -> &str {
        &self.0.listen_addr
    }

    pub(crate) fn endpoint_id(&self) -> EndpointId {
        self.0.endpoint_id
    }

    pub(crate) fn enqueue(&self, event: Event) {
        let _ = self.0.events_tx.send(event);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.0.state.lock().closed
    }

    /// Step 1 of `findRemoteEndPoint` (§4.4): look up `peer`, inserting a fresh `Init` entry
    /// (with a freshly assigned heavyweight id) if absent.
    pub(crate) fn lookup_or_insert_init(
        &self,
        peer: &Address,
        origin: Origin,
    ) -> Result<(Arc<RemoteEndpoint>, bool), Error> {
        let mut state = self.0.state.lock();
        if state.closed {
            return Err(Error::EndPointClosed);
        }
        if let Some(existing) = state.remotes.get(peer) {
            return Ok((existing.clone(), false));
        }
        let heavyweight_id = state.next_heavyweight_id;
        state.next_heavyweight_id += 1;
        let entry = RemoteEndpoint::new_init(peer.clone(), heavyweight_id, origin);
        state.remotes.insert(peer.clone(), entry.clone());
        Ok((entry, true))
    }

    /// Remove `peer`'s table entry, but only if it still refers to `expected_heavyweight_id` —
    /// guards against a concurrently re-created incarnation being evicted by a stale removal.
    pub(crate) fn remove_remote_if_current(&self, peer: &Address, expected_heavyweight_id: u64) {
        let mut state = self.0.state.lock();
        if let Some(entry) = state.remotes.get(peer) {
            if entry.heavyweight_id == expected_heavyweight_id {
                state.remotes.remove(peer);
            }
        }
    }

    pub(crate) fn insert_remote(&self, peer: Address, entry: Arc<RemoteEndpoint>) {
        let mut state = self.0.state.lock();
        state.remotes.insert(peer, entry);
    }

    /// Read-only lookup, used by the "reset-if-broken" step of `dial` (§4.5) to decide whether
    /// a stale `Invalid`/`Failed` entry needs clearing before the handshake even starts.
    pub(crate) fn peek_remote(&self, peer: &Address) -> Option<Arc<RemoteEndpoint>> {
        self.0.state.lock().remotes.get(peer).cloned()
    }
}
