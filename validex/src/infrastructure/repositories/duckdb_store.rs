// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The reference [`ResultStore`]: a DuckDB database holding the four tables
//! described in spec.md §6 (`slas`, `runs`, `results`, `statistics`).
//! `metric_values` and `error_sample` are stored as JSON text rather than
//! DuckDB's native `STRUCT`/`JSON` types, keeping the schema portable to a
//! plain SQL warehouse if a deployment ever swaps the backing engine.

use std::path::PathBuf;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tracing::instrument;
use validex_domain::error::{Result, ValidationError};
use validex_domain::result::ValidationResult;
use validex_domain::run::RunMetadata;
use validex_domain::scalar::Scalar;
use validex_domain::store::{ResultStore, StatRow};

use crate::infrastructure::pool::ConnectionPool;
use crate::infrastructure::repositories::schema;

pub struct DuckDbResultStore {
    pool: ConnectionPool<Connection>,
}

impl DuckDbResultStore {
    pub async fn open_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let factory = move || -> Result<Connection> { Connection::open(&path).map_err(db_err) };
        let store = DuckDbResultStore { pool: ConnectionPool::new(1, factory) };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self> {
        let factory = || -> Result<Connection> { Connection::open_in_memory().map_err(db_err) };
        let store = DuckDbResultStore { pool: ConnectionPool::new(1, factory) };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        let conn = self.pool.acquire().await?;
        tokio::task::block_in_place(|| {
            for ddl in schema::ALL {
                conn.execute_batch(ddl).map_err(db_err)?;
            }
            Ok(())
        })
    }
}

fn db_err(e: duckdb::Error) -> ValidationError {
    ValidationError::Internal(format!("result store error: {e}"))
}

#[async_trait]
impl ResultStore for DuckDbResultStore {
    #[instrument(skip(self, run, results), fields(run_id = %run.run_id, results = results.len()))]
    async fn persist_run(&self, run: &RunMetadata, results: &[ValidationResult], sla: Option<&str>) -> Result<()> {
        let conn = self.pool.acquire().await?;
        let run = run.clone();
        let results = results.to_vec();
        let sla = sla.map(str::to_string);
        tokio::task::block_in_place(|| insert_run(&conn, &run, &results, sla.as_deref()))
    }

    #[instrument(skip(self, run, stats), fields(run_id = %run.run_id, stats = stats.len()))]
    async fn persist_stats(&self, run: &RunMetadata, stats: &[StatRow]) -> Result<()> {
        let conn = self.pool.acquire().await?;
        let run_id = run.run_id.to_string();
        let stats = stats.to_vec();
        tokio::task::block_in_place(|| insert_stats(&conn, &run_id, &stats))
    }

    async fn load_recent_stats(&self, table: &str, column: &str, metric_key: &str, limit: usize) -> Result<Vec<Scalar>> {
        let conn = self.pool.acquire().await?;
        let table = table.to_string();
        let column = column.to_string();
        let metric_key = metric_key.to_string();
        tokio::task::block_in_place(|| select_recent_stats(&conn, &table, &column, &metric_key, limit))
    }
}

fn insert_run(conn: &Connection, run: &RunMetadata, results: &[ValidationResult], sla: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO runs (run_id, suite_name, sla_name, started_at, finished_at, status) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            run.run_id.to_string(),
            run.suite_name,
            sla,
            run.started_at.to_rfc3339(),
            run.finished_at.map(|t| t.to_rfc3339()),
            run.status.to_string(),
        ],
    )
    .map_err(db_err)?;

    for result in results {
        let metric_values = serde_json::to_string(&result.metric_values)?;
        let error_sample = result.error_sample.as_ref().map(serde_json::to_string).transpose()?;

        conn.execute(
            "INSERT INTO results (run_id, binding_ix, validator_type, engine, \"table\", status, severity, metric_values, error_sample, error_message, started_at, duration_ms) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                result.run_id.to_string(),
                result.binding_ix as i64,
                result.validator_type,
                result.engine_name,
                result.table,
                result.status.to_string(),
                result.severity.to_string(),
                metric_values,
                error_sample,
                result.error_message,
                result.started_at.to_rfc3339(),
                result.duration.as_millis() as i64,
            ],
        )
        .map_err(db_err)?;
    }
    Ok(())
}

fn insert_stats(conn: &Connection, run_id: &str, stats: &[StatRow]) -> Result<()> {
    for stat in stats {
        let value = serde_json::to_string(&stat.value)?;
        conn.execute(
            "INSERT INTO statistics (run_id, engine, schema, \"table\", column_name, metric_key, value) VALUES (?, NULL, NULL, ?, ?, ?, ?)",
            params![run_id, stat.table, stat.column, stat.metric_key, value],
        )
        .map_err(db_err)?;
    }
    Ok(())
}

fn select_recent_stats(conn: &Connection, table: &str, column: &str, metric_key: &str, limit: usize) -> Result<Vec<Scalar>> {
    let mut stmt = conn
        .prepare(
            "SELECT s.value FROM statistics s JOIN runs r ON s.run_id = r.run_id \
             WHERE s.\"table\" = ? AND s.column_name = ? AND s.metric_key = ? \
             ORDER BY r.started_at DESC LIMIT ?",
        )
        .map_err(db_err)?;

    let rows = stmt
        .query_map(params![table, column, metric_key, limit as i64], |row| row.get::<_, String>(0))
        .map_err(db_err)?;

    let mut out = Vec::new();
    for row in rows {
        let text = row.map_err(db_err)?;
        out.push(serde_json::from_str(&text)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use validex_domain::result::Status;
    use validex_domain::run::RunStatus;
    use validex_domain::validator::Severity;
    use indexmap::IndexMap;
    use std::time::Duration;

    fn sample_result(run: &RunMetadata) -> ValidationResult {
        ValidationResult {
            run_id: run.run_id,
            binding_ix: 0,
            validator_type: "ColumnNotNull".into(),
            engine_name: "main".into(),
            table: "users".into(),
            status: Status::Pass,
            severity: Severity::Fail,
            metric_values: IndexMap::new(),
            error_sample: None,
            error_message: None,
            started_at: chrono::Utc::now(),
            duration: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn persists_and_loads_recent_stats_most_recent_first() {
        let store = DuckDbResultStore::in_memory().await.unwrap();
        let mut run = RunMetadata::start("suite", None);
        run.finish(RunStatus::Complete);
        store.persist_run(&run, &[sample_result(&run)], None).await.unwrap();
        store
            .persist_stats(&run, &[StatRow { table: "users".into(), column: "id".into(), metric_key: "distinct_cnt".into(), value: Scalar::I64(10) }])
            .await
            .unwrap();

        let loaded = store.load_recent_stats("users", "id", "distinct_cnt", 5).await.unwrap();
        assert_eq!(loaded, vec![Scalar::I64(10)]);
    }

    #[tokio::test]
    async fn load_recent_stats_respects_limit() {
        let store = DuckDbResultStore::in_memory().await.unwrap();
        for i in 0..5 {
            let mut run = RunMetadata::start("suite", None);
            run.finish(RunStatus::Complete);
            store.persist_run(&run, &[], None).await.unwrap();
            store
                .persist_stats(&run, &[StatRow { table: "t".into(), column: "c".into(), metric_key: "mean".into(), value: Scalar::F64(i as f64) }])
                .await
                .unwrap();
        }
        let loaded = store.load_recent_stats("t", "c", "mean", 3).await.unwrap();
        assert_eq!(loaded.len(), 3);
    }
}
