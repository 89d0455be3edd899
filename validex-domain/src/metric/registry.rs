// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The metric registry: a name -> [`MetricBuilder`] mapping.
//!
//! `MetricSet` is the injectable value — construct one per test, or share
//! one process-wide instance via [`global`]. It is guarded by a
//! [`parking_lot::ReentrantMutex`] rather than a plain `Mutex` because
//! [`MetricSet::register_pct_where`] calls back into `register`, and a
//! non-reentrant lock would deadlock a caller who builds that convenience
//! helper while already holding the lock (e.g. seeding built-ins during
//! construction).

use super::builder::MetricBuilder;
use crate::error::{Result, ValidationError};
use crate::sql::Expr;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::OnceLock;

pub struct MetricSet {
    inner: ReentrantMutex<RefCell<HashMap<String, MetricBuilder>>>,
}

impl MetricSet {
    pub fn new() -> Self {
        let set = MetricSet { inner: ReentrantMutex::new(RefCell::new(HashMap::new())) };
        set.register_builtins();
        set
    }

    /// An empty set with no built-ins registered — for tests that want full
    /// control over what's available.
    pub fn empty() -> Self {
        MetricSet { inner: ReentrantMutex::new(RefCell::new(HashMap::new())) }
    }

    /// Registers `key -> builder`. Re-registering the identical builder
    /// under the same key is a no-op; registering a different builder under
    /// an already-taken key is a `DuplicateMetric` error.
    pub fn register(&self, key: impl Into<String>, builder: MetricBuilder) -> Result<()> {
        let key = key.into();
        let guard = self.inner.lock();
        let mut map = guard.borrow_mut();
        match map.get(&key) {
            Some(existing) if *existing == builder => Ok(()),
            Some(_) => Err(ValidationError::DuplicateMetric(key)),
            None => {
                map.insert(key, builder);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &str) -> Result<MetricBuilder> {
        let guard = self.inner.lock();
        guard.borrow().get(key).cloned().ok_or_else(|| ValidationError::UnknownMetric(key.to_string()))
    }

    /// Synthesizes a builder that computes the fraction of rows matching
    /// `predicate_sql`: `SUM(CASE WHEN <pred> THEN 1 ELSE 0 END) / NULLIF(COUNT(*), 0)`.
    pub fn register_pct_where(&self, key: impl Into<String>, predicate_sql: impl Into<String>) -> Result<()> {
        let predicate_sql = predicate_sql.into();
        let builder = MetricBuilder::infallible(move |_cols| {
            let matched = Expr::sum(
                Expr::case_when(Expr::Raw(predicate_sql.clone()), Expr::lit_i64(1))
                    .otherwise(Expr::lit_i64(0))
                    .build(),
            );
            Expr::div(matched, Expr::count_star())
        });
        self.register(key, builder)
    }

    fn register_builtins(&self) {
        self.register("row_cnt", MetricBuilder::infallible(|_| Expr::count_star())).unwrap();

        self.register(
            "null_cnt",
            MetricBuilder::infallible(|cols| {
                let col = cols[0];
                Expr::sum(
                    Expr::case_when(Expr::is_null(Expr::column(col)), Expr::lit_i64(1))
                        .otherwise(Expr::lit_i64(0))
                        .build(),
                )
            }),
        )
        .unwrap();

        self.register(
            "null_pct",
            MetricBuilder::infallible(|cols| {
                let col = cols[0];
                let null_cnt = Expr::sum(
                    Expr::case_when(Expr::is_null(Expr::column(col)), Expr::lit_i64(1))
                        .otherwise(Expr::lit_i64(0))
                        .build(),
                );
                Expr::div(null_cnt, Expr::count_star())
            }),
        )
        .unwrap();

        // Single column: COUNT(DISTINCT col). Composite key (PrimaryKeyUniqueness
        // over multiple columns): COUNT(DISTINCT (k1, k2, ...)) via a raw tuple,
        // same construction `duplicate_row_cnt` uses below.
        self.register(
            "distinct_cnt",
            MetricBuilder::infallible(|cols| {
                if cols.len() == 1 {
                    Expr::count_distinct(Expr::column(cols[0]))
                } else {
                    let tuple_sql =
                        format!("({})", cols.iter().map(|c| format!("\"{c}\"")).collect::<Vec<_>>().join(", "));
                    Expr::count_distinct(Expr::Raw(tuple_sql))
                }
            }),
        )
        .unwrap();

        // `COUNT(*) - COUNT(DISTINCT (cols...))`. The tuple itself has no
        // dedicated node, so it's rendered as a raw parenthesized column list
        // and wrapped in `COUNT(DISTINCT ...)`.
        self.register(
            "duplicate_row_cnt",
            MetricBuilder::infallible(|cols| {
                let tuple_sql = format!("({})", cols.iter().map(|c| format!("\"{c}\"")).collect::<Vec<_>>().join(", "));
                Expr::sub(Expr::count_star(), Expr::count_distinct(Expr::Raw(tuple_sql)))
            }),
        )
        .unwrap();

        self.register("min", MetricBuilder::infallible(|cols| Expr::min(Expr::column(cols[0])))).unwrap();
        self.register("max", MetricBuilder::infallible(|cols| Expr::max(Expr::column(cols[0])))).unwrap();
        self.register("non_null_cnt", MetricBuilder::infallible(|cols| Expr::count(Expr::column(cols[0])))).unwrap();
        self.register("mean", MetricBuilder::infallible(|cols| Expr::avg(Expr::column(cols[0])))).unwrap();
        self.register("stddev", MetricBuilder::infallible(|cols| Expr::stddev(Expr::column(cols[0])))).unwrap();
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceLock<MetricSet> = OnceLock::new();

/// The process-wide registry (Design Notes: "process-wide mutable registry,
/// retained as a process singleton with a mutex for ergonomic registration").
/// Prefer constructing a standalone [`MetricSet`] in tests.
pub fn global() -> &'static MetricSet {
    GLOBAL.get_or_init(MetricSet::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_get_roundtrips() {
        let set = MetricSet::empty();
        let b = MetricBuilder::infallible(|_| Expr::count_star());
        set.register("k", b.clone()).unwrap();
        let got = set.get("k").unwrap();
        assert_eq!(got, b);
    }

    #[test]
    fn reregistering_identical_builder_is_noop() {
        let set = MetricSet::empty();
        let b = MetricBuilder::infallible(|_| Expr::count_star());
        set.register("k", b.clone()).unwrap();
        set.register("k", b).unwrap();
    }

    #[test]
    fn reregistering_different_builder_errors() {
        let set = MetricSet::empty();
        let a = MetricBuilder::infallible(|_| Expr::count_star());
        let b = MetricBuilder::infallible(|_| Expr::count_star());
        set.register("k", a).unwrap();
        let err = set.register("k", b).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateMetric(_)));
    }

    #[test]
    fn unknown_metric_errors() {
        let set = MetricSet::empty();
        let err = set.get("nope").unwrap_err();
        assert!(matches!(err, ValidationError::UnknownMetric(_)));
    }

    #[test]
    fn builtins_are_present() {
        let set = MetricSet::new();
        for key in [
            "row_cnt",
            "null_cnt",
            "null_pct",
            "distinct_cnt",
            "duplicate_row_cnt",
            "min",
            "max",
            "non_null_cnt",
            "mean",
            "stddev",
        ]
        {
            assert!(set.get(key).is_ok(), "missing builtin {key}");
        }
    }

    #[test]
    fn distinct_cnt_builds_tuple_for_composite_keys() {
        let set = MetricSet::new();
        let builder = set.get("distinct_cnt").unwrap();
        let expr = builder.build(&["id", "region"]).unwrap();
        let rendered = expr.render(crate::sql::Dialect::DuckDb);
        assert_eq!(rendered, "COUNT(DISTINCT (\"id\", \"region\"))");
    }

    #[test]
    fn pct_where_builds_ratio() {
        let set = MetricSet::empty();
        set.register_pct_where("active_pct", "status = 'active'").unwrap();
        let builder = set.get("active_pct").unwrap();
        let expr = builder.build(&[]).unwrap();
        assert!(expr.is_metric_root());
    }
}
