// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

use std::env;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialise logging for a test binary. `RUST_LOG` defaults to `error` so CI stays quiet.
pub fn init() {
    if env_logger::builder().is_test(true).try_init().is_ok() {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "error");
        }

        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(true)
            .compact()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
