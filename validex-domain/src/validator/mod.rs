// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The validator model: declarative expectations about rows, columns, or
//! cross-table relationships.
//!
//! Every validator carries a common [`Envelope`] (`where`, `severity`, `tags`)
//! and is one of two kinds, routed by the runner without downcasting via
//! [`ValidatorKind`]:
//!
//! - [`MetricBackedValidator`] — declares the [`crate::metric::MetricRequest`]s
//!   it needs and interprets the scalar(s) the batch builder's single scan
//!   returns for them.
//! - [`CustomValidator`] — issues its own SQL and interprets the result set
//!   directly.

pub mod kinds;

use crate::engine::Engine;
use crate::error::Result;
use crate::metric::MetricRequest;
use crate::result::{ErrorSample, Status};
use crate::scalar::Scalar;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Fail,
    Warn,
    Info,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Fail
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Fail => "FAIL",
            Severity::Warn => "WARN",
            Severity::Info => "INFO",
        };
        write!(f, "{s}")
    }
}

/// Fields shared by every validator, regardless of kind.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub where_sql: Option<String>,
    pub severity: Severity,
    pub tags: Vec<String>,
}

impl Envelope {
    pub fn new(severity: Severity) -> Self {
        Envelope { where_sql: None, severity, tags: Vec::new() }
    }

    pub fn with_where(mut self, where_sql: impl Into<String>) -> Self {
        self.where_sql = Some(where_sql.into());
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// The pre-interpretation outcome of running a validator, before the runner
/// stamps in `run_id`, `binding_ix`, `engine_name`, `table`, `started_at`, and
/// `duration` to produce a [`crate::result::ValidationResult`].
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: Status,
    pub metric_values: IndexMap<String, Scalar>,
    pub error_sample: Option<ErrorSample>,
    pub error_message: Option<String>,
}

impl Outcome {
    pub fn pass() -> Self {
        Outcome { status: Status::Pass, metric_values: IndexMap::new(), error_sample: None, error_message: None }
    }

    pub fn fail() -> Self {
        Outcome { status: Status::Fail, metric_values: IndexMap::new(), error_sample: None, error_message: None }
    }

    pub fn with_metric(mut self, alias: impl Into<String>, value: Scalar) -> Self {
        self.metric_values.insert(alias.into(), value);
        self
    }

    pub fn with_error_sample(mut self, sample: ErrorSample) -> Self {
        self.error_sample = Some(sample);
        self
    }
}

/// A validator whose expectation reduces to interpreting one or more scalar
/// metric values, all fused into a single scan by the batch builder alongside
/// every other metric-backed validator on the same `(engine, table)`.
pub trait MetricBackedValidator: Send + Sync {
    /// The class name used in `ValidationResult::validator_type` and suite
    /// configuration's `expectation_type:` key.
    fn type_name(&self) -> &'static str;

    fn envelope(&self) -> &Envelope;

    /// The metrics this validator needs, with column references filled in
    /// but aliases left for the runner to assign (spec.md §4.5 step 2 —
    /// `v0, v1, ...`).
    fn metric_requests(&self) -> Vec<MetricRequest>;

    /// Interprets the scalar values keyed by the aliases `metric_requests`
    /// declared, in the same order, after the runner has distributed the
    /// batch's single result row.
    fn interpret(&self, values: &IndexMap<String, Scalar>) -> Outcome;
}

/// A validator that issues its own SQL and interprets the result set
/// directly — used when the expectation can't be expressed as a single
/// aggregate scalar (row-sampling checks, cross-engine reconciliation).
#[async_trait]
pub trait CustomValidator: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn envelope(&self) -> &Envelope;

    async fn execute(&self, engine: &dyn Engine, table: &str) -> Result<Outcome>;
}

/// Routes a binding to the right dispatch path without downcasting.
#[derive(Clone)]
pub enum ValidatorKind {
    MetricBacked(Arc<dyn MetricBackedValidator>),
    Custom(Arc<dyn CustomValidator>),
}

impl ValidatorKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ValidatorKind::MetricBacked(v) => v.type_name(),
            ValidatorKind::Custom(v) => v.type_name(),
        }
    }

    pub fn envelope(&self) -> Envelope {
        match self {
            ValidatorKind::MetricBacked(v) => v.envelope().clone(),
            ValidatorKind::Custom(v) => v.envelope().clone(),
        }
    }
}
