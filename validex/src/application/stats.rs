// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Optional post-run statistics pass (spec.md §6.2): collects a handful of
//! column-level metric observations per table and hands them to a
//! [`ResultStore`] so later runs' `MetricDrift` validators have history to
//! compare against. A thin wrapper around the same batch builder the runner
//! uses, not a separate subsystem.

use tracing::{debug, instrument};
use validex_domain::engine::Engine;
use validex_domain::error::Result;
use validex_domain::metric::{MetricRequest, MetricSet};
use validex_domain::run::RunMetadata;
use validex_domain::scalar::Scalar;
use validex_domain::store::{ResultStore, StatRow};
use validex_domain::build_batch;

/// One `(column, metric_key)` observation to collect for a table.
#[derive(Debug, Clone)]
pub struct StatSpec {
    pub column: String,
    pub metric_key: String,
}

impl StatSpec {
    pub fn new(column: impl Into<String>, metric_key: impl Into<String>) -> Self {
        StatSpec { column: column.into(), metric_key: metric_key.into() }
    }
}

/// Fuses every `spec` for `table` into a single scan, the same way the
/// runner fuses metric-backed validators.
#[instrument(skip(engine, registry, specs), fields(table, specs = specs.len()))]
pub async fn collect_stats(engine: &dyn Engine, table: &str, specs: &[StatSpec], registry: &MetricSet) -> Result<Vec<StatRow>> {
    if specs.is_empty() {
        return Ok(Vec::new());
    }

    let requests: Vec<MetricRequest> = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| MetricRequest::new(&spec.metric_key, format!("v{i}")).with_column(&spec.column))
        .collect();

    let sql = build_batch(table, &requests, registry, engine.dialect())?;
    debug!(%sql, "collecting table statistics");
    let rows = engine.run_sql(&sql).await?;
    let row = rows.single_row();

    Ok(specs
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let value = row.get(&format!("v{i}")).cloned().unwrap_or(Scalar::Null);
            StatRow { table: table.to_string(), column: spec.column.clone(), metric_key: spec.metric_key.clone(), value }
        })
        .collect())
}

/// Collects and persists statistics for `table` under the run identified by
/// `run`. A no-op when `specs` is empty, so callers can invoke this
/// unconditionally per bound table without checking first.
pub async fn collect_and_persist(
    engine: &dyn Engine,
    table: &str,
    specs: &[StatSpec],
    registry: &MetricSet,
    run: &RunMetadata,
    store: &dyn ResultStore,
) -> Result<()> {
    let stats = collect_stats(engine, table, specs, registry).await?;
    if stats.is_empty() {
        return Ok(());
    }
    store.persist_stats(run, &stats).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use validex_domain::engine::Rows;
    use validex_domain::result::ValidationResult;
    use validex_domain::sql::Dialect;
    use std::sync::Mutex;

    struct FakeEngine;

    #[async_trait]
    impl Engine for FakeEngine {
        async fn run_sql(&self, _sql: &str) -> Result<Rows> {
            let mut row = validex_domain::engine::Row::new();
            row.insert("v0".to_string(), Scalar::I64(42));
            row.insert("v1".to_string(), Scalar::F64(3.5));
            Ok(Rows { columns: vec!["v0".into(), "v1".into()], rows: vec![row] })
        }
        async fn list_columns(&self, _table: &str) -> Result<Vec<String>> {
            Ok(vec![])
        }
        fn dialect(&self) -> Dialect {
            Dialect::DuckDb
        }
        fn name(&self) -> &str {
            "fake"
        }
        async fn close(&self) {}
    }

    #[tokio::test]
    async fn collects_one_row_per_spec() {
        let engine = FakeEngine;
        let registry = MetricSet::new();
        let specs = vec![StatSpec::new("id", "distinct_cnt"), StatSpec::new("amount", "mean")];
        let stats = collect_stats(&engine, "orders", &specs, &registry).await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].column, "id");
        assert_eq!(stats[0].value, Scalar::I64(42));
        assert_eq!(stats[1].column, "amount");
        assert_eq!(stats[1].value, Scalar::F64(3.5));
    }

    #[tokio::test]
    async fn empty_specs_short_circuit() {
        let engine = FakeEngine;
        let registry = MetricSet::new();
        let stats = collect_stats(&engine, "orders", &[], &registry).await.unwrap();
        assert!(stats.is_empty());
    }

    struct RecordingStore {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ResultStore for RecordingStore {
        async fn persist_run(&self, _run: &RunMetadata, _results: &[ValidationResult], _sla: Option<&str>) -> Result<()> {
            Ok(())
        }
        async fn persist_stats(&self, _run: &RunMetadata, _stats: &[StatRow]) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            Ok(())
        }
        async fn load_recent_stats(&self, _table: &str, _column: &str, _metric_key: &str, _limit: usize) -> Result<Vec<Scalar>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn collect_and_persist_skips_store_call_when_empty() {
        let engine = FakeEngine;
        let registry = MetricSet::new();
        let store = RecordingStore { calls: Mutex::new(0) };
        let run = RunMetadata::start("s", None);
        collect_and_persist(&engine, "orders", &[], &registry, &run, &store).await.unwrap();
        assert_eq!(*store.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn collect_and_persist_calls_store_when_nonempty() {
        let engine = FakeEngine;
        let registry = MetricSet::new();
        let store = RecordingStore { calls: Mutex::new(0) };
        let run = RunMetadata::start("s", None);
        let specs = vec![StatSpec::new("id", "distinct_cnt")];
        collect_and_persist(&engine, "orders", &specs, &registry, &run, &store).await.unwrap();
        assert_eq!(*store.calls.lock().unwrap(), 1);
    }
}
