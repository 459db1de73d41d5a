// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! [`Transport`]: the listening socket and the table of [`LocalEndpoint`]s bound to it (§4.2).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::address::EndpointId;
use crate::config::TransportConfig;
use crate::error::Error;
use crate::local::LocalEndpoint;
use crate::setup;

struct TransportState {
    closed: bool,
    endpoints: HashMap<EndpointId, LocalEndpoint>,
    next_endpoint_id: EndpointId,
}

pub(crate) struct TransportInner {
    pub(crate) listen_addr: String,
    pub(crate) config: TransportConfig,
    state: Mutex<TransportState>,
    shutdown: Notify,
}

impl TransportInner {
    pub(crate) fn find_endpoint(&self, id: EndpointId) -> Option<LocalEndpoint> {
        let state = self.state.lock();
        if state.closed {
            return None;
        }
        state.endpoints.get(&id).cloned()
    }
}

/// Owns the listening socket and every [`LocalEndpoint`] bound through it.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

impl Transport {
    /// Bind `bind_addr` and start accepting, using [`TransportConfig::default`].
    pub async fn create(bind_addr: &str) -> Result<Self, Error> {
        Self::create_with_config(bind_addr, TransportConfig::default()).await
    }

    /// Bind `bind_addr` and start accepting with an explicit [`TransportConfig`].
    ///
    /// The bound address (which may differ from `bind_addr` if the OS assigned the port) is
    /// available afterwards through [`Transport::listen_addr`].
    #[tracing::instrument(skip(config))]
    pub async fn create_with_config(bind_addr: &str, config: TransportConfig) -> Result<Self, Error> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let listen_addr = format!("{}:{}", local_addr.ip(), local_addr.port());

        let inner = Arc::new(TransportInner {
            listen_addr,
            config,
            state: Mutex::new(TransportState {
                closed: false,
                endpoints: HashMap::new(),
                next_endpoint_id: 0,
            }),
            shutdown: Notify::new(),
        });

        tokio::spawn(accept_loop(inner.clone(), listener));

        Ok(Self { inner })
    }

    pub fn listen_addr(&self) -> &str {
        &self.inner.listen_addr
    }

    /// Allocate an unused endpoint id and insert a fresh [`LocalEndpoint`] (§4.2).
    pub fn new_endpoint(&self) -> Result<LocalEndpoint, Error> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(Error::TransportClosed);
        }
        let id = state.next_endpoint_id;
        state.next_endpoint_id += 1;
        let endpoint = LocalEndpoint::new(self.inner.listen_addr.clone(), id, self.inner.config.clone());
        state.endpoints.insert(id, endpoint.clone());
        Ok(endpoint)
    }

    /// Transition to `Closed`, stop accepting, and force-close every [`LocalEndpoint`] (§4.2).
    #[tracing::instrument(skip(self))]
    pub async fn close(&self) {
        let endpoints: Vec<LocalEndpoint> = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.endpoints.drain().map(|(_, e)| e).collect()
        };
        self.inner.shutdown.notify_waiters();
        for endpoint in endpoints {
            endpoint.close().await;
        }
    }
}

#[tracing::instrument(skip(inner, listener), fields(listen_addr = %inner.listen_addr))]
async fn accept_loop(inner: Arc<TransportInner>, listener: TcpListener) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer_addr)) => {
                        let inner = inner.clone();
                        tokio::spawn(async move {
                            if let Err(err) = setup::handle_inbound(&inner, socket, peer_addr).await {
                                tracing::debug!(%err, "inbound handshake did not complete");
                            }
                        });
                    }
                    Err(err) => {
                        tracing::warn!(%err, "accept failed");
                    }
                }
            }
            _ = inner.shutdown.notified() => {
                tracing::debug!("accept loop shutting down");
                break;
            }
        }
    }
}
