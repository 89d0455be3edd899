// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The outcome of evaluating one [`crate::binding::Binding`].

use crate::run::RunId;
use crate::scalar::Scalar;
use crate::validator::Severity;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pass,
    Fail,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
            Status::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

/// A sample of rows that violated a validator's expectation, capped at the
/// validator's configured `max_error_rows`. `truncated` is set when more
/// violating rows existed than were captured.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorSample {
    pub rows: Vec<IndexMap<String, Scalar>>,
    pub truncated: bool,
}

/// Immutable once constructed. `metric_values` carries every scalar the
/// validator consulted to reach its verdict — for a metric-backed validator
/// this is usually one entry, but reconciliation validators populate several.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub run_id: RunId,
    pub binding_ix: usize,
    pub validator_type: String,
    pub engine_name: String,
    pub table: String,
    pub status: Status,
    pub severity: Severity,
    pub metric_values: IndexMap<String, Scalar>,
    pub error_sample: Option<ErrorSample>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl ValidationResult {
    pub fn is_pass(&self) -> bool {
        matches!(self.status, Status::Pass)
    }

    /// Equality ignoring timestamps, used by the determinism property
    /// (spec.md Invariant 5): two runs over the same snapshot must agree on
    /// every field except `started_at`/`duration`.
    pub fn eq_ignoring_timing(&self, other: &ValidationResult) -> bool {
        self.run_id == other.run_id
            && self.binding_ix == other.binding_ix
            && self.validator_type == other.validator_type
            && self.engine_name == other.engine_name
            && self.table == other.table
            && self.status == other.status
            && self.severity == other.severity
            && self.metric_values == other.metric_values
            && self.error_message == other.error_message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: Status) -> ValidationResult {
        ValidationResult {
            run_id: RunId::new(),
            binding_ix: 0,
            validator_type: "ColumnNotNull".into(),
            engine_name: "default".into(),
            table: "t".into(),
            status,
            severity: Severity::Fail,
            metric_values: IndexMap::new(),
            error_sample: None,
            error_message: None,
            started_at: Utc::now(),
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn eq_ignoring_timing_tolerates_different_timestamps() {
        let mut a = sample(Status::Pass);
        let mut b = a.clone();
        a.started_at = Utc::now();
        b.started_at = a.started_at + chrono::Duration::seconds(5);
        b.duration = Duration::from_secs(9);
        assert!(a.eq_ignoring_timing(&b));
    }

    #[test]
    fn eq_ignoring_timing_detects_status_drift() {
        let a = sample(Status::Pass);
        let mut b = a.clone();
        b.status = Status::Fail;
        assert!(!a.eq_ignoring_timing(&b));
    }
}
