// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! Tunables for a [`crate::Transport`].

/// First lightweight connection id handed out within a fresh `Valid` incarnation.
pub const FIRST_NONRESERVED_LIGHTWEIGHT_ID: u32 = 1024;

/// First heavyweight connection id a [`crate::Transport`] ever assigns; `0` is reserved.
pub const FIRST_NONRESERVED_HEAVYWEIGHT_ID: u64 = 1;

/// Default cap on a single message payload (4 MiB).
pub const DEFAULT_MAX_MESSAGE_LEN: u32 = 4 * 1024 * 1024;

/// Default cap on an encoded peer address string.
pub const DEFAULT_MAX_ADDRESS_LEN: u32 = 1000;

/// Runtime-tunable limits for a [`crate::Transport`] instance.
///
/// Cloned into every [`crate::LocalEndpoint`] created from the owning transport, so each
/// endpoint enforces the same limits without holding a reference back to the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// Maximum accepted length, in bytes, of a single lightweight-connection payload.
    pub max_message_len: u32,
    /// Maximum accepted length, in bytes, of an encoded peer address string.
    pub max_address_len: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            max_address_len: DEFAULT_MAX_ADDRESS_LEN,
        }
    }
}
