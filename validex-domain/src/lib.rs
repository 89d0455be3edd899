// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Pure domain logic for Validex: a data-quality validation engine.
//!
//! This crate has no I/O. It knows how to build SQL for metrics, fuse many
//! requests into one scan, and interpret the results against validators — it
//! does not know how to run SQL against a real database, load a suite from
//! YAML, or persist a run. Those live in the `validex` application/
//! infrastructure crate, which depends on this one.

pub mod batch;
pub mod binding;
pub mod engine;
pub mod error;
pub mod metric;
pub mod result;
pub mod run;
pub mod scalar;
pub mod sql;
pub mod store;
pub mod validator;

pub use batch::build_batch;
pub use binding::Binding;
pub use engine::{Engine, Row, Rows};
pub use error::{Result, ValidationError};
pub use metric::{MetricBuilder, MetricRequest, MetricSet};
pub use result::{ErrorSample, Status, ValidationResult};
pub use run::{RunId, RunMetadata, RunStatus};
pub use scalar::Scalar;
pub use sql::{Dialect, Expr};
pub use store::{ResultStore, StatRow};
pub use validator::{CustomValidator, Envelope, MetricBackedValidator, Outcome, Severity, ValidatorKind};
