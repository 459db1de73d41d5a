// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! Rely violations: state transitions the protocol guarantees cannot occur.
//!
//! Reaching one of these means the state machine invariants in the crate
//! documentation have been broken by a bug, not by an untrusted peer. We
//! abort rather than unwind so that a panicking task can't leave the
//! guilty `RemoteEndpoint` half-mutated for some other task to trip over.

/// Log and abort the process. Never returns.
pub(crate) fn violation(msg: impl std::fmt::Display) -> ! {
    tracing::error!(%msg, "rely violation");
    std::process::abort()
}
