// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `ResultStore` port: an external collaborator that persists finished
//! runs. The core never reaches for a store on its own — a caller that wants
//! persistence hands one to the runner explicitly.

use crate::error::Result;
use crate::result::ValidationResult;
use crate::run::RunMetadata;
use crate::scalar::Scalar;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One column-statistic observation, written by an optional post-run
/// statistics pass (spec.md §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatRow {
    pub table: String,
    pub column: String,
    pub metric_key: String,
    pub value: Scalar,
}

/// Append-only from the core's perspective; pruning is an out-of-band
/// concern of whatever owns the backing store.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Atomically records run metadata and its results. `sla` is the owning
    /// SLA name, if the suite was run as part of one.
    async fn persist_run(&self, run: &RunMetadata, results: &[ValidationResult], sla: Option<&str>) -> Result<()>;

    /// Records optional column statistics collected for `run`.
    async fn persist_stats(&self, run: &RunMetadata, stats: &[StatRow]) -> Result<()>;

    /// Reads the most recent statistic values for `(table, column, metric_key)`
    /// across prior runs, most recent first, capped at `limit`. Backs the
    /// `MetricDrift` validator's read path (spec.md Design Notes §9) — stores
    /// that don't support history may return an empty vector.
    async fn load_recent_stats(&self, table: &str, column: &str, metric_key: &str, limit: usize) -> Result<Vec<Scalar>>;
}
