// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Dialect name the rendering pass targets.
//!
//! Only SQL-standard constructs are required of [`Expr::render`], so most
//! dialects need no special-casing — `Dialect` exists mainly so an `Engine`
//! adapter can identify itself and so identifier quoting can differ per
//! backend.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    DuckDb,
    Postgres,
    Generic,
}

impl Dialect {
    /// Quote an identifier for this dialect. DuckDB and Postgres both accept
    /// ANSI double-quoted identifiers; `Generic` does the same since it is
    /// meant for dialects that have not declared a need to differ.
    pub fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::DuckDb => "duckdb",
            Dialect::Postgres => "postgres",
            Dialect::Generic => "generic",
        };
        write!(f, "{name}")
    }
}
