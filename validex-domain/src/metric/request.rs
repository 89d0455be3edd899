// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A single metric, as requested by a validator, destined for fusion into a
//! batch by [`crate::batch::build_batch`].

/// One column, projected to a `metric_key(column) AS alias` output.
///
/// `filter_sql` is an optional per-request predicate (already rendered SQL,
/// e.g. `"region = 'EU'"`) that the batch builder pushes into the aggregate
/// via `CASE WHEN` so that differently-filtered metrics can still share one
/// table scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRequest {
    pub metric_key: String,
    pub columns: Vec<String>,
    pub alias: String,
    pub filter_sql: Option<String>,
}

impl MetricRequest {
    pub fn new(metric_key: impl Into<String>, alias: impl Into<String>) -> Self {
        MetricRequest { metric_key: metric_key.into(), columns: Vec::new(), alias: alias.into(), filter_sql: None }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn with_columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter(mut self, filter_sql: impl Into<String>) -> Self {
        self.filter_sql = Some(filter_sql.into());
        self
    }

    pub fn columns_as_str(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }
}
