// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A documented, unimplemented [`Engine`] adapter for warehouses reached
//! over ODBC (Snowflake, SQL Server, Databricks). Linking a real ODBC
//! driver manager requires a system package (`unixodbc`) this workspace does
//! not assume is present, so `OdbcEngine` exists to give such a deployment a
//! named extension point without pretending to support it: every method
//! returns [`ValidationError::Internal`] instead of connecting.
//!
//! A real implementation would wrap the `odbc-api` crate the way
//! [`super::duckdb_engine::DuckDbEngine`] wraps `duckdb`, behind the same
//! [`ConnectionPool`](crate::infrastructure::pool::ConnectionPool).

use async_trait::async_trait;
use validex_domain::engine::{Engine, Rows};
use validex_domain::error::{Result, ValidationError};
use validex_domain::sql::Dialect;

pub struct OdbcEngine {
    name: String,
    dialect: Dialect,
}

impl OdbcEngine {
    /// `dsn` is accepted (and ignored) so suite configuration that names a
    /// DSN for a future real implementation round-trips cleanly today.
    pub fn new(name: impl Into<String>, _dsn: impl Into<String>, dialect: Dialect) -> Self {
        OdbcEngine { name: name.into(), dialect }
    }

    fn unimplemented(&self) -> ValidationError {
        ValidationError::Internal(format!(
            "engine '{}' is configured as ODBC but validex does not link an ODBC driver manager in this build",
            self.name
        ))
    }
}

#[async_trait]
impl Engine for OdbcEngine {
    async fn run_sql(&self, _sql: &str) -> Result<Rows> {
        Err(self.unimplemented())
    }

    async fn list_columns(&self, _table: &str) -> Result<Vec<String>> {
        Err(self.unimplemented())
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_call_reports_the_same_unimplemented_error() {
        let engine = OdbcEngine::new("warehouse", "DSN=prod", Dialect::Generic);
        assert!(engine.run_sql("SELECT 1").await.is_err());
        assert!(engine.list_columns("t").await.is_err());
        assert_eq!(engine.name(), "warehouse");
        assert_eq!(engine.dialect(), Dialect::Generic);
    }
}
