// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Structured logging setup. `RUST_LOG` overrides the level `verbose` picks,
//! the way `tracing_subscriber::EnvFilter` is conventionally layered in.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. Safe to call at most once per
/// process; a second call is a programmer error and panics, matching
/// `tracing::subscriber::set_global_default`'s own behavior.
pub fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(verbose);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
