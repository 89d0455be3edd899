// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The default [`Engine`] adapter: an embedded DuckDB database, reached
//! through the application's [`ConnectionPool`](crate::infrastructure::pool::ConnectionPool).
//!
//! `duckdb` is a synchronous, blocking API, so every call here runs under
//! `tokio::task::block_in_place`, the async-runtime equivalent of the
//! `spawn_blocking` wrapping this crate's other adapters use for CPU-bound
//! work — chosen over `spawn_blocking` itself because the pooled connection
//! borrow can't cross a task boundary.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::Connection;
use indexmap::IndexMap;
use validex_domain::engine::{Engine, Row, Rows};
use validex_domain::error::{Result, ValidationError};
use validex_domain::scalar::Scalar;
use validex_domain::sql::Dialect;

use crate::infrastructure::pool::ConnectionPool;

/// How a `DuckDbEngine` reaches its data.
pub enum DuckDbTarget {
    /// A private in-process database, gone once the engine is dropped.
    InMemory,
    /// A DuckDB database file on disk.
    File(PathBuf),
}

pub struct DuckDbEngine {
    name: String,
    pool: ConnectionPool<Connection>,
}

impl DuckDbEngine {
    pub fn new(name: impl Into<String>, target: DuckDbTarget) -> Result<Self> {
        let name = name.into();
        let factory = move || -> Result<Connection> {
            let conn = match &target {
                DuckDbTarget::InMemory => Connection::open_in_memory(),
                DuckDbTarget::File(path) => Connection::open(path),
            };
            conn.map_err(|e| ValidationError::EngineError { sql: "<open connection>".to_string(), underlying: e.to_string() })
        };
        // A single physical connection: DuckDB's single-writer semantics make
        // a pool of independent connections to the same target more trouble
        // than it is worth, and an in-memory target would otherwise give each
        // pooled connection its own, mutually invisible, database.
        let pool = ConnectionPool::new(1, factory);
        Ok(DuckDbEngine { name, pool })
    }

    pub fn in_memory(name: impl Into<String>) -> Result<Self> {
        Self::new(name, DuckDbTarget::InMemory)
    }

    pub fn open_file(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(name, DuckDbTarget::File(path.into()))
    }

    /// Registers `view_name` over a glob of Parquet or CSV files, so suites
    /// can target file-based sources the same way they target tables.
    pub async fn create_view_over(&self, view_name: &str, glob: &str, format: SourceFormat) -> Result<()> {
        let reader = match format {
            SourceFormat::Parquet => "read_parquet",
            SourceFormat::Csv => "read_csv_auto",
        };
        let sql = format!(
            "CREATE OR REPLACE VIEW \"{}\" AS SELECT * FROM {reader}('{}')",
            view_name.replace('"', "\"\""),
            glob.replace('\'', "''")
        );
        self.run_sql(&sql).await.map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Parquet,
    Csv,
}

#[async_trait]
impl Engine for DuckDbEngine {
    async fn run_sql(&self, sql: &str) -> Result<Rows> {
        let conn = self.pool.acquire().await?;
        // `duckdb::Connection` is a blocking driver; `block_in_place` hands
        // this OS thread to blocking work without moving the pooled
        // connection across threads, which spawning a task would require.
        tokio::task::block_in_place(|| execute(&conn, sql))
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT column_name FROM information_schema.columns WHERE table_name = '{}' ORDER BY ordinal_position",
            table.replace('\'', "''")
        );
        let rows = self.run_sql(&sql).await?;
        Ok(rows
            .rows
            .into_iter()
            .filter_map(|mut r| r.shift_remove("column_name"))
            .filter_map(|v| match v {
                Scalar::Str(s) => Some(s),
                _ => None,
            })
            .collect())
    }

    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) {}
}

fn execute(conn: &Connection, sql: &str) -> Result<Rows> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| ValidationError::EngineError { sql: sql.to_string(), underlying: e.to_string() })?;

    let column_count = stmt.column_count();
    let columns: Vec<String> = (0..column_count).map(|i| stmt.column_name(i).unwrap_or_default().to_string()).collect();

    let mut rows_iter =
        stmt.query([]).map_err(|e| ValidationError::EngineError { sql: sql.to_string(), underlying: e.to_string() })?;

    let mut rows = Vec::new();
    while let Some(row) = rows_iter.next().map_err(|e| ValidationError::EngineError { sql: sql.to_string(), underlying: e.to_string() })? {
        let mut out: Row = IndexMap::new();
        for (ix, name) in columns.iter().enumerate() {
            let value: duckdb::types::Value = row
                .get(ix)
                .map_err(|e| ValidationError::EngineError { sql: sql.to_string(), underlying: e.to_string() })?;
            out.insert(name.clone(), value_to_scalar(value));
        }
        rows.push(out);
    }

    Ok(Rows { columns, rows })
}

fn value_to_scalar(value: duckdb::types::Value) -> Scalar {
    use duckdb::types::Value;
    match value {
        Value::Null => Scalar::Null,
        Value::Boolean(b) => Scalar::Bool(b),
        Value::TinyInt(v) => Scalar::I64(v as i64),
        Value::SmallInt(v) => Scalar::I64(v as i64),
        Value::Int(v) => Scalar::I64(v as i64),
        Value::BigInt(v) => Scalar::I64(v),
        Value::HugeInt(v) => Scalar::I64(v as i64),
        Value::UTinyInt(v) => Scalar::I64(v as i64),
        Value::USmallInt(v) => Scalar::I64(v as i64),
        Value::UInt(v) => Scalar::I64(v as i64),
        Value::UBigInt(v) => Scalar::I64(v as i64),
        Value::Float(v) => Scalar::F64(v as f64),
        Value::Double(v) => Scalar::F64(v),
        Value::Decimal(d) => d.to_string().parse::<f64>().map(Scalar::F64).unwrap_or(Scalar::Null),
        Value::Text(s) => Scalar::Str(s),
        other => Scalar::Str(format!("{other:?}")),
    }
}
