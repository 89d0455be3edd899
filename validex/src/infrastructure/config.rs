// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Layered runtime configuration: defaults, then an optional TOML file, then
//! `VALIDEX__`-prefixed environment variables, in that order of precedence
//! (spec.md's ambient configuration section). This is the only settings
//! layer validex loads; `validex_bootstrap` only resolves what CLI parsing
//! needs before this layer runs.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use validex_domain::error::{Result, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    None,
    DuckDb,
    FileArtifact,
}

impl Default for StoreKind {
    fn default() -> Self {
        StoreKind::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default per-binding timeout applied when a binding doesn't set its own
    /// (`None` means no timeout).
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Port the Prometheus `/metrics` and `/health` endpoint binds to.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    #[serde(default)]
    pub store: StoreKind,

    /// Filesystem root for `FileArtifact`, or the `.duckdb` file path for
    /// `DuckDb`. Ignored when `store` is `None`.
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Named engines available to suites, keyed by the name suites reference
    /// in `engine:`, valued by a connection target (`duckdb:file.db`,
    /// `duckdb:memory`, or an ODBC DSN string).
    #[serde(default)]
    pub engines: HashMap<String, String>,
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_store_path() -> String {
    "validex-data".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            default_timeout_secs: None,
            metrics_port: default_metrics_port(),
            store: StoreKind::default(),
            store_path: default_store_path(),
            engines: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Loads defaults, then `path` if it exists, then `VALIDEX__`-prefixed
    /// environment variables (`VALIDEX__METRICS_PORT=9100`,
    /// `VALIDEX__ENGINES__MAIN=duckdb:warehouse.db`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            }
        }

        builder = builder.add_source(config::Environment::with_prefix("VALIDEX").separator("__"));

        let config = builder.build().map_err(|e| ValidationError::ConfigError(e.to_string()))?;
        config.try_deserialize().map_err(|e| ValidationError::ConfigError(e.to_string()))
    }
}
