// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain-wide error type.
//!
//! Errors are split by propagation policy, not just by cause: the
//! `DuplicateMetric` / `UnknownMetric` / `InvalidMetric` / `DuplicateAlias`
//! family are programmer errors raised by the registry and batch builder and
//! meant to abort the enclosing call loudly. `EngineError`, `Timeout`, and
//! `Cancelled` are runtime conditions the runner catches at binding
//! granularity and turns into a `Status::Error` result instead of propagating.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("metric '{0}' is already registered with a different builder")]
    DuplicateMetric(String),

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("invalid metric expression: {0}")]
    InvalidMetric(String),

    #[error("duplicate alias '{0}' in batch")]
    DuplicateAlias(String),

    #[error("suite configuration error: {0}")]
    ConfigError(String),

    #[error("engine error running `{sql}`: {underlying}")]
    EngineError { sql: String, underlying: String },

    #[error("binding timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("run cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ValidationError {
    /// Whether this error represents infrastructure failure (vs. a
    /// programmer error that should never occur with well-formed input).
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ValidationError::EngineError { .. } | ValidationError::Timeout(_) | ValidationError::Cancelled
        )
    }

    pub fn category(&self) -> &'static str {
        match self {
            ValidationError::DuplicateMetric(_) => "registry",
            ValidationError::UnknownMetric(_) => "registry",
            ValidationError::InvalidMetric(_) => "batch",
            ValidationError::DuplicateAlias(_) => "batch",
            ValidationError::ConfigError(_) => "config",
            ValidationError::EngineError { .. } => "engine",
            ValidationError::Timeout(_) => "timeout",
            ValidationError::Cancelled => "cancellation",
            ValidationError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for ValidationError {
    fn from(err: std::io::Error) -> Self {
        ValidationError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        ValidationError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ValidationError>;
