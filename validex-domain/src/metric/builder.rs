// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A metric builder is a pure function from column names to an aggregate SQL
//! expression. Builders are content-free state — they hold no mutable data
//! and are invariant under registration, so `MetricBuilder` is simply a
//! cloneable function pointer wrapper.

use crate::error::{Result, ValidationError};
use crate::sql::Expr;
use std::sync::Arc;

/// `(column_names...) -> SQL expression`.
///
/// `columns` is whatever the metric needs: zero columns for `row_cnt`, one
/// for `null_cnt(c)`, several for `duplicate_row_cnt(c1, c2, ...)`. A `"*"`
/// column argument is reserved for metrics that operate on the whole row
/// (`row_cnt`).
#[derive(Clone)]
pub struct MetricBuilder(Arc<dyn Fn(&[&str]) -> Result<Expr> + Send + Sync>);

impl MetricBuilder {
    pub fn new(f: impl Fn(&[&str]) -> Result<Expr> + Send + Sync + 'static) -> Self {
        MetricBuilder(Arc::new(f))
    }

    /// Builders that never fail to construct an expression (the overwhelming
    /// majority) can skip the `Result` in their closure.
    pub fn infallible(f: impl Fn(&[&str]) -> Expr + Send + Sync + 'static) -> Self {
        MetricBuilder(Arc::new(move |cols| Ok(f(cols))))
    }

    pub fn build(&self, columns: &[&str]) -> Result<Expr> {
        let expr = (self.0)(columns)?;
        if !expr.is_metric_root() {
            return Err(ValidationError::InvalidMetric(
                "metric builder must return a top-level aggregate or a ratio of aggregates".into(),
            ));
        }
        Ok(expr)
    }
}

impl std::fmt::Debug for MetricBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MetricBuilder(..)")
    }
}

// `Arc<dyn Fn>` pointer identity is used for the registry's idempotent-reregistration
// check (spec.md "registration of an identical object is idempotent").
impl PartialEq for MetricBuilder {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
