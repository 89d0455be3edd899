// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Concrete validators, per spec.md §4.4.

use crate::batch::build_batch;
use crate::engine::Engine;
use crate::error::Result;
use crate::metric::{self, MetricRequest};
use crate::result::{ErrorSample, Status};
use crate::scalar::Scalar;
use crate::sql::Dialect;
use crate::store::ResultStore;
use crate::validator::{CustomValidator, Envelope, MetricBackedValidator, Outcome};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;

fn metric_request(key: &str, alias: &str, columns: &[&str], envelope: &Envelope) -> MetricRequest {
    let mut req = MetricRequest::new(key, alias).with_columns(columns.iter().copied());
    if let Some(filter) = &envelope.where_sql {
        req = req.with_filter(filter.clone());
    }
    req
}

fn as_i64(values: &IndexMap<String, Scalar>, alias: &str) -> i64 {
    values.get(alias).and_then(Scalar::as_i64).unwrap_or(0)
}

fn as_f64_opt(values: &IndexMap<String, Scalar>, alias: &str) -> Option<f64> {
    values.get(alias).and_then(Scalar::as_f64)
}

// ---------------------------------------------------------------------------
// ColumnNotNull
// ---------------------------------------------------------------------------

pub struct ColumnNotNull {
    pub column: String,
    pub envelope: Envelope,
}

impl MetricBackedValidator for ColumnNotNull {
    fn type_name(&self) -> &'static str {
        "ColumnNotNull"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn metric_requests(&self) -> Vec<MetricRequest> {
        vec![metric_request("null_cnt", "value", &[&self.column], &self.envelope)]
    }

    fn interpret(&self, values: &IndexMap<String, Scalar>) -> Outcome {
        let null_cnt = as_i64(values, "value");
        let outcome = if null_cnt == 0 { Outcome::pass() } else { Outcome::fail() };
        outcome.with_metric("null_cnt", Scalar::I64(null_cnt))
    }
}

// ---------------------------------------------------------------------------
// ColumnNullPct
// ---------------------------------------------------------------------------

pub struct ColumnNullPct {
    pub column: String,
    pub max: f64,
    pub envelope: Envelope,
}

impl MetricBackedValidator for ColumnNullPct {
    fn type_name(&self) -> &'static str {
        "ColumnNullPct"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn metric_requests(&self) -> Vec<MetricRequest> {
        vec![metric_request("null_pct", "value", &[&self.column], &self.envelope)]
    }

    fn interpret(&self, values: &IndexMap<String, Scalar>) -> Outcome {
        // An empty (or filtered-to-empty) table divides by NULLIF(count,0) ->
        // NULL; treated as vacuously passing rather than erroring.
        let pct = as_f64_opt(values, "value").unwrap_or(0.0);
        let outcome = if pct <= self.max { Outcome::pass() } else { Outcome::fail() };
        outcome.with_metric("null_pct", Scalar::F64(pct))
    }
}

// ---------------------------------------------------------------------------
// ColumnDistinctCount
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ge,
    Le,
}

impl CmpOp {
    fn holds(&self, actual: i64, expected: i64) -> bool {
        match self {
            CmpOp::Eq => actual == expected,
            CmpOp::Ge => actual >= expected,
            CmpOp::Le => actual <= expected,
        }
    }
}

pub struct ColumnDistinctCount {
    pub column: String,
    pub expected: i64,
    pub op: CmpOp,
    pub envelope: Envelope,
}

impl MetricBackedValidator for ColumnDistinctCount {
    fn type_name(&self) -> &'static str {
        "ColumnDistinctCount"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn metric_requests(&self) -> Vec<MetricRequest> {
        vec![metric_request("distinct_cnt", "value", &[&self.column], &self.envelope)]
    }

    fn interpret(&self, values: &IndexMap<String, Scalar>) -> Outcome {
        let actual = as_i64(values, "value");
        let outcome = if self.op.holds(actual, self.expected) { Outcome::pass() } else { Outcome::fail() };
        outcome.with_metric("distinct_cnt", Scalar::I64(actual))
    }
}

// ---------------------------------------------------------------------------
// ColumnMin / ColumnMax / ColumnRange
// ---------------------------------------------------------------------------

pub struct ColumnMin {
    pub column: String,
    pub bound: f64,
    pub strict: bool,
    pub envelope: Envelope,
}

impl MetricBackedValidator for ColumnMin {
    fn type_name(&self) -> &'static str {
        "ColumnMin"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn metric_requests(&self) -> Vec<MetricRequest> {
        vec![metric_request("min", "value", &[&self.column], &self.envelope)]
    }

    fn interpret(&self, values: &IndexMap<String, Scalar>) -> Outcome {
        match as_f64_opt(values, "value") {
            // No rows (or all-NULL column) under the filter: nothing to
            // violate the bound.
            None => Outcome::pass(),
            Some(actual) => {
                let holds = if self.strict { actual > self.bound } else { actual >= self.bound };
                let outcome = if holds { Outcome::pass() } else { Outcome::fail() };
                outcome.with_metric("min", Scalar::F64(actual))
            }
        }
    }
}

pub struct ColumnMax {
    pub column: String,
    pub bound: f64,
    pub strict: bool,
    pub envelope: Envelope,
}

impl MetricBackedValidator for ColumnMax {
    fn type_name(&self) -> &'static str {
        "ColumnMax"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn metric_requests(&self) -> Vec<MetricRequest> {
        vec![metric_request("max", "value", &[&self.column], &self.envelope)]
    }

    fn interpret(&self, values: &IndexMap<String, Scalar>) -> Outcome {
        match as_f64_opt(values, "value") {
            None => Outcome::pass(),
            Some(actual) => {
                let holds = if self.strict { actual < self.bound } else { actual <= self.bound };
                let outcome = if holds { Outcome::pass() } else { Outcome::fail() };
                outcome.with_metric("max", Scalar::F64(actual))
            }
        }
    }
}

pub struct ColumnRange {
    pub column: String,
    pub lo: f64,
    pub hi: f64,
    pub envelope: Envelope,
}

impl MetricBackedValidator for ColumnRange {
    fn type_name(&self) -> &'static str {
        "ColumnRange"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn metric_requests(&self) -> Vec<MetricRequest> {
        vec![
            metric_request("min", "min", &[&self.column], &self.envelope),
            metric_request("max", "max", &[&self.column], &self.envelope),
        ]
    }

    fn interpret(&self, values: &IndexMap<String, Scalar>) -> Outcome {
        let min = as_f64_opt(values, "min");
        let max = as_f64_opt(values, "max");
        let holds = min.map_or(true, |v| v >= self.lo) && max.map_or(true, |v| v <= self.hi);
        let mut outcome = if holds { Outcome::pass() } else { Outcome::fail() };
        if let Some(v) = min {
            outcome = outcome.with_metric("min", Scalar::F64(v));
        }
        if let Some(v) = max {
            outcome = outcome.with_metric("max", Scalar::F64(v));
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// RowCountValidator
// ---------------------------------------------------------------------------

pub struct RowCountValidator {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub envelope: Envelope,
}

impl MetricBackedValidator for RowCountValidator {
    fn type_name(&self) -> &'static str {
        "RowCountValidator"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn metric_requests(&self) -> Vec<MetricRequest> {
        vec![metric_request("row_cnt", "value", &[], &self.envelope)]
    }

    fn interpret(&self, values: &IndexMap<String, Scalar>) -> Outcome {
        let cnt = as_i64(values, "value");
        let holds = self.min.map_or(true, |m| cnt >= m) && self.max.map_or(true, |m| cnt <= m);
        let outcome = if holds { Outcome::pass() } else { Outcome::fail() };
        outcome.with_metric("row_cnt", Scalar::I64(cnt))
    }
}

// ---------------------------------------------------------------------------
// PrimaryKeyUniqueness
// ---------------------------------------------------------------------------

pub struct PrimaryKeyUniqueness {
    pub keys: Vec<String>,
    pub envelope: Envelope,
}

impl MetricBackedValidator for PrimaryKeyUniqueness {
    fn type_name(&self) -> &'static str {
        "PrimaryKeyUniqueness"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn metric_requests(&self) -> Vec<MetricRequest> {
        let keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();
        vec![
            metric_request("row_cnt", "row_cnt", &[], &self.envelope),
            metric_request("distinct_cnt", "distinct_cnt", &keys, &self.envelope),
        ]
    }

    fn interpret(&self, values: &IndexMap<String, Scalar>) -> Outcome {
        let row_cnt = as_i64(values, "row_cnt");
        let distinct_cnt = as_i64(values, "distinct_cnt");
        let outcome = if row_cnt == distinct_cnt { Outcome::pass() } else { Outcome::fail() };
        outcome.with_metric("row_cnt", Scalar::I64(row_cnt)).with_metric("distinct_cnt", Scalar::I64(distinct_cnt))
    }
}

// ---------------------------------------------------------------------------
// Custom validators: issue their own SQL, cap error-row samples at
// `max_error_rows + 1` and flag overflow.
// ---------------------------------------------------------------------------

fn combine_where(envelope: &Envelope, extra: &str) -> String {
    match &envelope.where_sql {
        Some(w) => format!("({w}) AND ({extra})"),
        None => extra.to_string(),
    }
}

async fn sample_violations(
    engine: &dyn Engine,
    table: &str,
    predicate: &str,
    max_error_rows: usize,
) -> Result<Outcome> {
    let dialect = engine.dialect();
    let sql = format!(
        "SELECT * FROM {} WHERE {} LIMIT {}",
        dialect.quote_ident(table),
        predicate,
        max_error_rows + 1
    );
    let rows = engine.run_sql(&sql).await?;
    if rows.rows.is_empty() {
        return Ok(Outcome::pass());
    }
    let truncated = rows.rows.len() > max_error_rows;
    let sample = ErrorSample { rows: rows.rows.into_iter().take(max_error_rows).collect(), truncated };
    Ok(Outcome::fail().with_error_sample(sample))
}

fn quote_set_literal(v: &str) -> String {
    format!("'{}'", v.replace('\'', "''"))
}

// ---------------------------------------------------------------------------
// ColumnValueInSet
// ---------------------------------------------------------------------------

pub struct ColumnValueInSet {
    pub column: String,
    pub set: Vec<String>,
    pub allow_null: bool,
    pub max_error_rows: usize,
    pub envelope: Envelope,
}

#[async_trait]
impl CustomValidator for ColumnValueInSet {
    fn type_name(&self) -> &'static str {
        "ColumnValueInSet"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    async fn execute(&self, engine: &dyn Engine, table: &str) -> Result<Outcome> {
        let dialect = engine.dialect();
        let col = dialect.quote_ident(&self.column);
        let set_sql = self.set.iter().map(|v| quote_set_literal(v)).collect::<Vec<_>>().join(", ");
        let not_in = format!("{col} NOT IN ({set_sql})");
        let violation = if self.allow_null {
            format!("{col} IS NOT NULL AND {not_in}")
        } else {
            format!("{col} IS NULL OR {not_in}")
        };
        let predicate = combine_where(&self.envelope, &violation);
        sample_violations(engine, table, &predicate, self.max_error_rows).await
    }
}

// ---------------------------------------------------------------------------
// ColumnMatchesRegex
// ---------------------------------------------------------------------------

pub struct ColumnMatchesRegex {
    pub column: String,
    pub pattern: String,
    pub max_error_rows: usize,
    pub envelope: Envelope,
}

#[async_trait]
impl CustomValidator for ColumnMatchesRegex {
    fn type_name(&self) -> &'static str {
        "ColumnMatchesRegex"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    async fn execute(&self, engine: &dyn Engine, table: &str) -> Result<Outcome> {
        // NULLs are not considered a regex violation; ColumnNotNull covers
        // null-ness separately.
        let dialect = engine.dialect();
        let col = dialect.quote_ident(&self.column);
        let pattern = quote_set_literal(&self.pattern);
        let violation = format!("{col} IS NOT NULL AND NOT regexp_matches({col}, {pattern})");
        let predicate = combine_where(&self.envelope, &violation);
        sample_violations(engine, table, &predicate, self.max_error_rows).await
    }
}

// ---------------------------------------------------------------------------
// ColumnGreaterEqual
// ---------------------------------------------------------------------------

pub struct ColumnGreaterEqual {
    pub left: String,
    pub right: String,
    pub max_error_rows: usize,
    pub envelope: Envelope,
}

#[async_trait]
impl CustomValidator for ColumnGreaterEqual {
    fn type_name(&self) -> &'static str {
        "ColumnGreaterEqual"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    async fn execute(&self, engine: &dyn Engine, table: &str) -> Result<Outcome> {
        let dialect = engine.dialect();
        let left = dialect.quote_ident(&self.left);
        let right = dialect.quote_ident(&self.right);
        let violation = format!("{left} < {right}");
        let predicate = combine_where(&self.envelope, &violation);
        sample_violations(engine, table, &predicate, self.max_error_rows).await
    }
}

// ---------------------------------------------------------------------------
// DuplicateRowValidator
// ---------------------------------------------------------------------------

pub struct DuplicateRowValidator {
    pub keys: Vec<String>,
    pub max_error_rows: usize,
    pub envelope: Envelope,
}

#[async_trait]
impl CustomValidator for DuplicateRowValidator {
    fn type_name(&self) -> &'static str {
        "DuplicateRowValidator"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    async fn execute(&self, engine: &dyn Engine, table: &str) -> Result<Outcome> {
        let dialect = engine.dialect();
        let keys_sql = self.keys.iter().map(|k| dialect.quote_ident(k)).collect::<Vec<_>>().join(", ");
        let where_clause = self.envelope.where_sql.as_ref().map(|w| format!(" WHERE {w}")).unwrap_or_default();
        let sql = format!(
            "SELECT {keys_sql}, COUNT(*) AS dup_count FROM {}{where_clause} GROUP BY {keys_sql} HAVING COUNT(*) > 1 \
             LIMIT {}",
            dialect.quote_ident(table),
            self.max_error_rows + 1
        );
        let rows = engine.run_sql(&sql).await?;
        if rows.rows.is_empty() {
            return Ok(Outcome::pass());
        }
        let truncated = rows.rows.len() > self.max_error_rows;
        let sample = ErrorSample { rows: rows.rows.into_iter().take(self.max_error_rows).collect(), truncated };
        Ok(Outcome::fail().with_error_sample(sample))
    }
}

// ---------------------------------------------------------------------------
// SqlErrorRowsValidator
// ---------------------------------------------------------------------------

pub struct SqlErrorRowsValidator {
    pub sql: String,
    pub max_error_rows: usize,
    pub envelope: Envelope,
}

#[async_trait]
impl CustomValidator for SqlErrorRowsValidator {
    fn type_name(&self) -> &'static str {
        "SqlErrorRowsValidator"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    async fn execute(&self, engine: &dyn Engine, _table: &str) -> Result<Outcome> {
        let wrapped = format!("SELECT * FROM ({}) AS validex_error_rows LIMIT {}", self.sql, self.max_error_rows + 1);
        let rows = engine.run_sql(&wrapped).await?;
        if rows.rows.is_empty() {
            return Ok(Outcome::pass());
        }
        let truncated = rows.rows.len() > self.max_error_rows;
        let sample = ErrorSample { rows: rows.rows.into_iter().take(self.max_error_rows).collect(), truncated };
        Ok(Outcome::fail().with_error_sample(sample))
    }
}

// ---------------------------------------------------------------------------
// TableReconciliation
// ---------------------------------------------------------------------------

pub struct TableReconciliation {
    pub other_engine: Arc<dyn Engine>,
    pub other_table: String,
    pub envelope: Envelope,
}

#[async_trait]
impl CustomValidator for TableReconciliation {
    fn type_name(&self) -> &'static str {
        "TableReconciliation"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    async fn execute(&self, engine: &dyn Engine, table: &str) -> Result<Outcome> {
        let left_sql = build_batch(table, &[MetricRequest::new("row_cnt", "value")], metric::global(), engine.dialect())?;
        let right_sql = build_batch(
            &self.other_table,
            &[MetricRequest::new("row_cnt", "value")],
            metric::global(),
            self.other_engine.dialect(),
        )?;
        let left = engine.run_sql(&left_sql).await?;
        let right = self.other_engine.run_sql(&right_sql).await?;
        let left_cnt = left.single_row().get("value").and_then(Scalar::as_i64).unwrap_or(0);
        let right_cnt = right.single_row().get("value").and_then(Scalar::as_i64).unwrap_or(0);
        let outcome = if left_cnt == right_cnt { Outcome::pass() } else { Outcome::fail() };
        Ok(outcome.with_metric("row_cnt_left", Scalar::I64(left_cnt)).with_metric("row_cnt_right", Scalar::I64(right_cnt)))
    }
}

// ---------------------------------------------------------------------------
// ColumnReconciliation
// ---------------------------------------------------------------------------

/// One paired metric comparison in a [`ColumnReconciliation`]. `metric_key`
/// is a registered metric (`min`, `max`, `non_null_cnt`, `distinct_cnt`, ...)
/// applied to `left_column` on the primary side and `right_column` on the
/// comparison side.
pub struct ColumnMapping {
    pub metric_key: String,
    pub left_column: String,
    pub right_column: String,
    /// Open Question resolution (spec.md §9): exact equality unless this is
    /// set, in which case `|left - right| <= tolerance`.
    pub tolerance: Option<f64>,
}

pub struct ColumnReconciliation {
    pub other_engine: Arc<dyn Engine>,
    pub other_table: String,
    pub mappings: Vec<ColumnMapping>,
    pub envelope: Envelope,
}

#[async_trait]
impl CustomValidator for ColumnReconciliation {
    fn type_name(&self) -> &'static str {
        "ColumnReconciliation"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    async fn execute(&self, engine: &dyn Engine, table: &str) -> Result<Outcome> {
        let left_requests: Vec<MetricRequest> = self
            .mappings
            .iter()
            .enumerate()
            .map(|(i, m)| MetricRequest::new(&m.metric_key, format!("v{i}")).with_column(&m.left_column))
            .collect();
        let right_requests: Vec<MetricRequest> = self
            .mappings
            .iter()
            .enumerate()
            .map(|(i, m)| MetricRequest::new(&m.metric_key, format!("v{i}")).with_column(&m.right_column))
            .collect();

        let left_sql = build_batch(table, &left_requests, metric::global(), engine.dialect())?;
        let right_sql = build_batch(&self.other_table, &right_requests, metric::global(), self.other_engine.dialect())?;
        let left = engine.run_sql(&left_sql).await?;
        let right = self.other_engine.run_sql(&right_sql).await?;
        let left_row = left.single_row();
        let right_row = right.single_row();

        let mut outcome = Outcome::pass();
        for (i, mapping) in self.mappings.iter().enumerate() {
            let alias = format!("v{i}");
            let lv = left_row.get(&alias).cloned().unwrap_or(Scalar::Null);
            let rv = right_row.get(&alias).cloned().unwrap_or(Scalar::Null);
            if !lv.reconciles_with(&rv, mapping.tolerance) {
                outcome.status = Status::Fail;
            }
            outcome = outcome
                .with_metric(format!("{}_left", mapping.metric_key), lv)
                .with_metric(format!("{}_right", mapping.metric_key), rv);
        }
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// ColumnZScoreOutlierRows
// ---------------------------------------------------------------------------

/// Flags rows whose `column` value is more than `z_thresh` standard
/// deviations from the column's mean. Needs the population mean/stddev
/// before it can select offending rows, so it runs as two scans rather than
/// joining the batch fusion (spec.md's "Validator flags" default:
/// `z_thresh=3.0`).
pub struct ColumnZScoreOutlierRows {
    pub column: String,
    pub z_thresh: f64,
    pub max_error_rows: usize,
    pub envelope: Envelope,
}

#[async_trait]
impl CustomValidator for ColumnZScoreOutlierRows {
    fn type_name(&self) -> &'static str {
        "ColumnZScoreOutlierRows"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    async fn execute(&self, engine: &dyn Engine, table: &str) -> Result<Outcome> {
        let mut stats_request = MetricRequest::new("mean", "mean").with_column(&self.column);
        if let Some(filter) = &self.envelope.where_sql {
            stats_request = stats_request.with_filter(filter.clone());
        }
        let mut stddev_request = MetricRequest::new("stddev", "stddev").with_column(&self.column);
        if let Some(filter) = &self.envelope.where_sql {
            stddev_request = stddev_request.with_filter(filter.clone());
        }
        let sql = build_batch(table, &[stats_request, stddev_request], metric::global(), engine.dialect())?;
        let stats = engine.run_sql(&sql).await?;
        let row = stats.single_row();
        let mean = row.get("mean").and_then(Scalar::as_f64);
        let stddev = row.get("stddev").and_then(Scalar::as_f64);

        // An empty table, or a column with zero variance, has no outliers by
        // definition rather than a validator error.
        let (mean, stddev) = match (mean, stddev) {
            (Some(mean), Some(stddev)) if stddev > 0.0 => (mean, stddev),
            _ => return Ok(Outcome::pass()),
        };

        let dialect = engine.dialect();
        let col = dialect.quote_ident(&self.column);
        let predicate = format!("ABS(({col} - {mean}) / {stddev}) > {}", self.z_thresh);
        let where_sql = match &self.envelope.where_sql {
            Some(filter) => format!("({filter}) AND {predicate}"),
            None => predicate,
        };
        let wrapped = format!(
            "SELECT * FROM {} WHERE {where_sql} LIMIT {}",
            dialect.quote_ident(table),
            self.max_error_rows + 1
        );
        let rows = engine.run_sql(&wrapped).await?;

        let outcome = if rows.rows.is_empty() {
            Outcome::pass()
        } else {
            let truncated = rows.rows.len() > self.max_error_rows;
            let sample = ErrorSample { rows: rows.rows.into_iter().take(self.max_error_rows).collect(), truncated };
            Outcome::fail().with_error_sample(sample)
        };
        Ok(outcome.with_metric("mean", Scalar::F64(mean)).with_metric("stddev", Scalar::F64(stddev)))
    }
}

// ---------------------------------------------------------------------------
// MetricDrift
// ---------------------------------------------------------------------------

/// Compares a metric's current value against the average of its `window`
/// most recent historical observations (spec.md's "Validator flags" default:
/// `window=20`), failing when the relative change exceeds `max_pct_change`.
/// Vacuously passes when the store has no history yet — there is nothing to
/// drift from on a table's first run.
pub struct MetricDrift {
    pub metric_key: String,
    pub column: Option<String>,
    pub window: usize,
    pub max_pct_change: f64,
    pub store: Arc<dyn ResultStore>,
    pub envelope: Envelope,
}

#[async_trait]
impl CustomValidator for MetricDrift {
    fn type_name(&self) -> &'static str {
        "MetricDrift"
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    async fn execute(&self, engine: &dyn Engine, table: &str) -> Result<Outcome> {
        let mut request = MetricRequest::new(&self.metric_key, "value");
        if let Some(column) = &self.column {
            request = request.with_column(column);
        }
        if let Some(filter) = &self.envelope.where_sql {
            request = request.with_filter(filter.clone());
        }
        let sql = build_batch(table, &[request], metric::global(), engine.dialect())?;
        let rows = engine.run_sql(&sql).await?;
        let current = rows.single_row().get("value").and_then(Scalar::as_f64).unwrap_or(0.0);

        let column_key = self.column.as_deref().unwrap_or("");
        let history = self.store.load_recent_stats(table, column_key, &self.metric_key, self.window).await?;
        let samples: Vec<f64> = history.iter().filter_map(Scalar::as_f64).collect();
        if samples.is_empty() {
            return Ok(Outcome::pass().with_metric("current", Scalar::F64(current)));
        }

        let baseline = samples.iter().sum::<f64>() / samples.len() as f64;
        let pct_change = if baseline == 0.0 {
            if current == 0.0 {
                0.0
            } else {
                f64::INFINITY
            }
        } else {
            (current - baseline).abs() / baseline.abs()
        };

        let outcome = if pct_change <= self.max_pct_change { Outcome::pass() } else { Outcome::fail() };
        Ok(outcome.with_metric("current", Scalar::F64(current)).with_metric("baseline", Scalar::F64(baseline)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> Envelope {
        Envelope::new(crate::validator::Severity::Fail)
    }

    fn values(pairs: &[(&str, Scalar)]) -> IndexMap<String, Scalar> {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn column_not_null_passes_on_zero() {
        let v = ColumnNotNull { column: "email".into(), envelope: envelope() };
        let outcome = v.interpret(&values(&[("value", Scalar::I64(0))]));
        assert_eq!(outcome.status, Status::Pass);
    }

    #[test]
    fn column_not_null_fails_on_nonzero() {
        let v = ColumnNotNull { column: "email".into(), envelope: envelope() };
        let outcome = v.interpret(&values(&[("value", Scalar::I64(3))]));
        assert_eq!(outcome.status, Status::Fail);
    }

    #[test]
    fn column_distinct_count_respects_op() {
        let v = ColumnDistinctCount { column: "status".into(), expected: 3, op: CmpOp::Eq, envelope: envelope() };
        assert_eq!(v.interpret(&values(&[("value", Scalar::I64(3))])).status, Status::Pass);
        assert_eq!(v.interpret(&values(&[("value", Scalar::I64(4))])).status, Status::Fail);

        let v = ColumnDistinctCount { column: "status".into(), expected: 3, op: CmpOp::Ge, envelope: envelope() };
        assert_eq!(v.interpret(&values(&[("value", Scalar::I64(5))])).status, Status::Pass);
    }

    #[test]
    fn column_range_passes_within_bounds() {
        let v = ColumnRange { column: "age".into(), lo: 0.0, hi: 120.0, envelope: envelope() };
        let outcome = v.interpret(&values(&[("min", Scalar::F64(0.0)), ("max", Scalar::F64(99.0))]));
        assert_eq!(outcome.status, Status::Pass);
    }

    #[test]
    fn column_range_fails_outside_bounds() {
        let v = ColumnRange { column: "age".into(), lo: 0.0, hi: 120.0, envelope: envelope() };
        let outcome = v.interpret(&values(&[("min", Scalar::F64(-1.0)), ("max", Scalar::F64(99.0))]));
        assert_eq!(outcome.status, Status::Fail);
    }

    #[test]
    fn row_count_validator_enforces_min_and_max() {
        let v = RowCountValidator { min: Some(10), max: Some(100), envelope: envelope() };
        assert_eq!(v.interpret(&values(&[("value", Scalar::I64(50))])).status, Status::Pass);
        assert_eq!(v.interpret(&values(&[("value", Scalar::I64(5))])).status, Status::Fail);
        assert_eq!(v.interpret(&values(&[("value", Scalar::I64(500))])).status, Status::Fail);
    }

    #[test]
    fn primary_key_uniqueness_detects_duplicates() {
        let v = PrimaryKeyUniqueness { keys: vec!["id".into()], envelope: envelope() };
        let outcome = v.interpret(&values(&[("row_cnt", Scalar::I64(10)), ("distinct_cnt", Scalar::I64(10))]));
        assert_eq!(outcome.status, Status::Pass);
        let outcome = v.interpret(&values(&[("row_cnt", Scalar::I64(10)), ("distinct_cnt", Scalar::I64(8))]));
        assert_eq!(outcome.status, Status::Fail);
    }

    #[test]
    fn metric_requests_carry_filter_into_each_request() {
        let v = ColumnNotNull { column: "email".into(), envelope: envelope().with_where("region='EU'") };
        let reqs = v.metric_requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].filter_sql.as_deref(), Some("region='EU'"));
    }

    struct StatsThenRowsEngine {
        mean: f64,
        stddev: f64,
        outlier_rows: Vec<IndexMap<String, Scalar>>,
    }

    #[async_trait]
    impl Engine for StatsThenRowsEngine {
        async fn run_sql(&self, sql: &str) -> Result<crate::engine::Rows> {
            if sql.contains("AVG") {
                let mut row = IndexMap::new();
                row.insert("mean".to_string(), Scalar::F64(self.mean));
                row.insert("stddev".to_string(), Scalar::F64(self.stddev));
                Ok(crate::engine::Rows { columns: vec!["mean".into(), "stddev".into()], rows: vec![row] })
            } else {
                Ok(crate::engine::Rows { columns: vec![], rows: self.outlier_rows.clone() })
            }
        }
        async fn list_columns(&self, _table: &str) -> Result<Vec<String>> {
            Ok(vec![])
        }
        fn dialect(&self) -> Dialect {
            Dialect::DuckDb
        }
        fn name(&self) -> &str {
            "stub"
        }
        async fn close(&self) {}
    }

    #[tokio::test]
    async fn z_score_outlier_rows_passes_when_stddev_is_zero() {
        let engine = StatsThenRowsEngine { mean: 10.0, stddev: 0.0, outlier_rows: vec![] };
        let v = ColumnZScoreOutlierRows { column: "amount".into(), z_thresh: 3.0, max_error_rows: 20, envelope: envelope() };
        let outcome = v.execute(&engine, "t").await.unwrap();
        assert_eq!(outcome.status, Status::Pass);
    }

    #[tokio::test]
    async fn z_score_outlier_rows_fails_when_rows_found() {
        let mut row = IndexMap::new();
        row.insert("amount".to_string(), Scalar::F64(999.0));
        let engine = StatsThenRowsEngine { mean: 10.0, stddev: 2.0, outlier_rows: vec![row] };
        let v = ColumnZScoreOutlierRows { column: "amount".into(), z_thresh: 3.0, max_error_rows: 20, envelope: envelope() };
        let outcome = v.execute(&engine, "t").await.unwrap();
        assert_eq!(outcome.status, Status::Fail);
        assert!(outcome.error_sample.is_some());
    }

    struct FixedValueEngine {
        value: f64,
    }

    #[async_trait]
    impl Engine for FixedValueEngine {
        async fn run_sql(&self, _sql: &str) -> Result<crate::engine::Rows> {
            let mut row = IndexMap::new();
            row.insert("value".to_string(), Scalar::F64(self.value));
            Ok(crate::engine::Rows { columns: vec!["value".into()], rows: vec![row] })
        }
        async fn list_columns(&self, _table: &str) -> Result<Vec<String>> {
            Ok(vec![])
        }
        fn dialect(&self) -> Dialect {
            Dialect::DuckDb
        }
        fn name(&self) -> &str {
            "stub"
        }
        async fn close(&self) {}
    }

    struct FakeStore {
        history: Vec<Scalar>,
    }

    #[async_trait]
    impl ResultStore for FakeStore {
        async fn persist_run(
            &self,
            _run: &crate::run::RunMetadata,
            _results: &[crate::result::ValidationResult],
            _sla: Option<&str>,
        ) -> Result<()> {
            Ok(())
        }
        async fn persist_stats(&self, _run: &crate::run::RunMetadata, _stats: &[crate::store::StatRow]) -> Result<()> {
            Ok(())
        }
        async fn load_recent_stats(&self, _table: &str, _column: &str, _metric_key: &str, _limit: usize) -> Result<Vec<Scalar>> {
            Ok(self.history.clone())
        }
    }

    #[tokio::test]
    async fn metric_drift_passes_without_history() {
        let engine = FixedValueEngine { value: 100.0 };
        let store: Arc<dyn ResultStore> = Arc::new(FakeStore { history: vec![] });
        let v = MetricDrift {
            metric_key: "row_cnt".into(),
            column: None,
            window: 20,
            max_pct_change: 0.1,
            store,
            envelope: envelope(),
        };
        let outcome = v.execute(&engine, "t").await.unwrap();
        assert_eq!(outcome.status, Status::Pass);
    }

    #[tokio::test]
    async fn metric_drift_fails_on_large_relative_change() {
        let engine = FixedValueEngine { value: 1000.0 };
        let store: Arc<dyn ResultStore> =
            Arc::new(FakeStore { history: vec![Scalar::F64(100.0), Scalar::F64(105.0), Scalar::F64(95.0)] });
        let v = MetricDrift {
            metric_key: "row_cnt".into(),
            column: None,
            window: 20,
            max_pct_change: 0.1,
            store,
            envelope: envelope(),
        };
        let outcome = v.execute(&engine, "t").await.unwrap();
        assert_eq!(outcome.status, Status::Fail);
    }
}
