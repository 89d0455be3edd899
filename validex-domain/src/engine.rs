// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `Engine` port: a uniform row-returning SQL interface over whatever
//! backend an adapter wraps. Concrete adapters (DuckDB, file-glob views,
//! an ODBC warehouse) live in `validex`'s infrastructure layer; this crate
//! only knows the contract.

use crate::error::Result;
use crate::scalar::Scalar;
use crate::sql::Dialect;
use async_trait::async_trait;
use indexmap::IndexMap;

/// One row, column-name-keyed, in the order the engine projected them.
pub type Row = IndexMap<String, Scalar>;

/// An eagerly materialized result set. `columns` preserves projection order
/// even for rows where a driver's map type would otherwise not.
#[derive(Debug, Clone, Default)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Rows {
    pub fn empty() -> Self {
        Rows { columns: Vec::new(), rows: Vec::new() }
    }

    /// The single row a batch-builder `SELECT` is expected to produce.
    /// Absence (zero rows) or more than one row is an adapter bug, not a
    /// validator-level condition, so this panics rather than threading
    /// another error variant through every caller.
    pub fn single_row(&self) -> &Row {
        assert_eq!(self.rows.len(), 1, "expected exactly one aggregate row, got {}", self.rows.len());
        &self.rows[0]
    }
}

/// A handle to a SQL-accessible data source. Implementations own a bounded
/// pool of backend connections; each `run_sql` call acquires one, runs one
/// statement, and releases it on every exit path including errors.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Executes one SQL statement and returns its result set, fully
    /// materialized.
    async fn run_sql(&self, sql: &str) -> Result<Rows>;

    /// Ordered column names for `table`, used by suite loading to reject a
    /// configuration that names a nonexistent column before any binding
    /// reaches the runner.
    async fn list_columns(&self, table: &str) -> Result<Vec<String>>;

    /// The SQL dialect this engine renders expressions for.
    fn dialect(&self) -> Dialect;

    /// A stable name for this engine, used in `ValidationResult::engine_name`
    /// and suite configuration's `engine:` key.
    fn name(&self) -> &str;

    /// Releases the connection pool. Idempotent.
    async fn close(&self);
}
