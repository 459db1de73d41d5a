// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! A single-use rendezvous signal: fired exactly once, observable by any number of waiters
//! regardless of whether they started waiting before or after the fire.
//!
//! Backs the `resolved` and `crossed` notifiers on [`crate::remote::Init`].

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct Rendezvous {
    notify: Notify,
    fired: AtomicBool,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self {
            notify: Notify::new(),
            fired: AtomicBool::new(false),
        }
    }

    /// Signal all current and future waiters. Idempotent.
    pub fn fire(&self) {
        self.fired.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Wait for [`Self::fire`], returning immediately if it already happened.
    ///
    /// `Notify::notified()` registers the waiter at creation, not at first poll, so a `fire()`
    /// racing in between is still observed; the flag only short-circuits the already-fired case.
    pub async fn wait(&self) {
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        let notified = self.notify.notified();
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}
