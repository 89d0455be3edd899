// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Validex
//!
//! A data-quality validation engine: declarative expectations over SQL
//! tables, evaluated by fusing every metric-backed expectation on the same
//! `(engine, table)` pair into one scan.
//!
//! `validex-domain` holds the pure model (metrics, the batch builder,
//! validators, the error and result types) with no I/O. This crate wires
//! that model to the outside world:
//!
//! - `application` — `SuiteLoader` (YAML → `Binding`), `Runner`
//!   (partition-and-dispatch), and the optional post-run statistics pass.
//! - `infrastructure` — concrete `Engine` adapters (DuckDB, a documented
//!   ODBC stub), `ResultStore` adapters (DuckDB, flat files), configuration,
//!   logging, and metrics.
//! - `presentation` — console/JSON rendering of a run's results.
//!
//! Process startup, signal handling, and CLI parsing live one layer out, in
//! `validex-bootstrap`.

pub mod application;
pub mod infrastructure;
pub mod presentation;

// Tests are organized as:
// - Unit tests: #[cfg(test)] modules within each source file
// - Integration tests: validex/tests/
