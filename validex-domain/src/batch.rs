// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Fuses many independent [`MetricRequest`]s, each possibly with its own row
//! filter, into a single `SELECT` statement.
//!
//! The one non-trivial piece is the per-request filter rewrite: when two
//! metrics on the same table need different `WHERE` predicates, they can
//! still share one scan by pushing each predicate into its own aggregate via
//! `CASE WHEN`, per spec.md §4.2.

use crate::error::{Result, ValidationError};
use crate::metric::{MetricRequest, MetricSet};
use crate::sql::{rewrite, AggKind, BinOp, Dialect, Expr, Rewriter};
use std::collections::HashSet;

/// Implements the per-request filter rewrite rule (spec.md §4.2): every
/// aggregate node in the metric's expression is replaced with a
/// filter-guarded equivalent so the request's scalar, computed over the
/// *whole* batched scan, equals what running the metric alone over
/// `table WHERE filter` would have produced.
struct FilterRewriter<'a> {
    filter: &'a str,
}

impl Rewriter for FilterRewriter<'_> {
    fn rewrite_agg(&self, kind: AggKind, arg: Option<Expr>) -> Expr {
        let cond = Expr::Raw(self.filter.to_string());
        match kind {
            AggKind::CountStar => {
                Expr::sum(Expr::case_when(cond, Expr::lit_i64(1)).otherwise(Expr::lit_i64(0)).build())
            }
            AggKind::Count => {
                let arg = arg.expect("COUNT requires an argument");
                let guarded = Expr::BinaryOp(Box::new(cond), BinOp::And, Box::new(Expr::is_not_null(arg)));
                Expr::sum(Expr::case_when(guarded, Expr::lit_i64(1)).otherwise(Expr::lit_i64(0)).build())
            }
            AggKind::CountDistinct => {
                let arg = arg.expect("COUNT DISTINCT requires an argument");
                Expr::count_distinct(Expr::case_when(cond, arg).build())
            }
            AggKind::Sum | AggKind::Avg | AggKind::Min | AggKind::Max => {
                let arg = arg.expect("aggregate requires an argument");
                Expr::Agg { kind, arg: Some(Box::new(Expr::case_when(cond, arg).build())) }
            }
        }
    }
}

/// Builds the single `SELECT` statement fusing `requests` into one scan of
/// `table`. Exactly one projected column per request, in input order; no
/// `WHERE` clause unless every request shares the identical filter, in which
/// case the per-request rewrite is skipped as an optimization (spec.md
/// §4.2 "Guarantees").
pub fn build_batch(table: &str, requests: &[MetricRequest], registry: &MetricSet, dialect: Dialect) -> Result<String> {
    let mut seen_aliases = HashSet::with_capacity(requests.len());
    for req in requests {
        if !seen_aliases.insert(req.alias.as_str()) {
            return Err(ValidationError::DuplicateAlias(req.alias.clone()));
        }
    }

    let global_filter = uniform_filter(requests);

    let mut projections = Vec::with_capacity(requests.len());
    for req in requests {
        let builder = registry.get(&req.metric_key)?;
        let expr = builder.build(&req.columns_as_str())?;
        let expr = match (&global_filter, &req.filter_sql) {
            // A global WHERE already restricts every row the scan sees, so
            // per-request rewriting would double-apply the same predicate.
            (Some(_), _) => expr,
            (None, Some(filter)) => rewrite(&expr, &FilterRewriter { filter }),
            (None, None) => expr,
        };
        projections.push(format!("{} AS {}", expr.render(dialect), dialect.quote_ident(&req.alias)));
    }

    let mut sql = format!("SELECT {} FROM {}", projections.join(", "), dialect.quote_ident(table));
    if let Some(filter) = global_filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    Ok(sql)
}

/// `Some(filter)` iff every request carries the identical `filter_sql`
/// (including the case where all requests have none — `filter_sql` absent is
/// not itself a filter to hoist, so that case returns `None`).
fn uniform_filter(requests: &[MetricRequest]) -> Option<&str> {
    let mut iter = requests.iter().map(|r| r.filter_sql.as_deref());
    let first = iter.next()?;
    let first = first?;
    if iter.all(|f| f == Some(first)) {
        Some(first)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricSet;

    fn registry() -> MetricSet {
        MetricSet::new()
    }

    #[test]
    fn two_filtered_metrics_one_scan() {
        // spec.md S1
        let reg = registry();
        let requests = vec![
            MetricRequest::new("row_cnt", "total"),
            MetricRequest::new("row_cnt", "active").with_filter("status='active'"),
        ];
        let sql = build_batch("users", &requests, &reg, Dialect::DuckDb).unwrap();
        assert_eq!(
            sql,
            "SELECT COUNT(*) AS \"total\", SUM(CASE WHEN status='active' THEN 1 ELSE 0 END) AS \"active\" FROM \"users\""
        );
    }

    #[test]
    fn shared_filter_becomes_global_where_and_skips_rewrite() {
        let reg = registry();
        let requests = vec![
            MetricRequest::new("row_cnt", "v0").with_filter("region='EU'"),
            MetricRequest::new("non_null_cnt", "v1").with_column("email").with_filter("region='EU'"),
        ];
        let sql = build_batch("users", &requests, &reg, Dialect::DuckDb).unwrap();
        assert_eq!(sql, "SELECT COUNT(*) AS \"v0\", COUNT(\"email\") AS \"v1\" FROM \"users\" WHERE region='EU'");
    }

    #[test]
    fn duplicate_alias_rejected() {
        let reg = registry();
        let requests = vec![MetricRequest::new("row_cnt", "v0"), MetricRequest::new("row_cnt", "v0")];
        let err = build_batch("t", &requests, &reg, Dialect::DuckDb).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateAlias(_)));
    }

    #[test]
    fn projection_count_matches_request_count() {
        let reg = registry();
        let requests = vec![
            MetricRequest::new("row_cnt", "v0"),
            MetricRequest::new("null_cnt", "v1").with_column("c"),
            MetricRequest::new("distinct_cnt", "v2").with_column("c"),
        ];
        let sql = build_batch("t", &requests, &reg, Dialect::DuckDb).unwrap();
        assert_eq!(sql.matches(" AS ").count(), 3);
    }

    #[test]
    fn non_null_cnt_filter_rewrites_to_and_is_not_null() {
        let reg = registry();
        let requests = vec![MetricRequest::new("non_null_cnt", "v0").with_column("email").with_filter("region='EU'")];
        let sql = build_batch("t", &requests, &reg, Dialect::DuckDb).unwrap();
        assert_eq!(
            sql,
            "SELECT SUM(CASE WHEN (region='EU' AND (\"email\" IS NOT NULL)) THEN 1 ELSE 0 END) AS \"v0\" FROM \"t\""
        );
    }
}
