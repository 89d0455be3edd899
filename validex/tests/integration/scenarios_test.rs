//! spec.md §8 "Concrete scenarios" run against a real engine, not a fake
//! one — these exercise the batch builder's SQL, DuckDB's execution of it,
//! and the runner's partitioning together.

use std::collections::HashMap;
use std::sync::Arc;

use validex::application::runner::{RunOptions, RunOutcome, Runner};
use validex::infrastructure::adapters::duckdb_engine::DuckDbEngine;
use validex_domain::engine::Engine;
use validex_domain::metric::MetricSet;
use validex_domain::result::Status;
use validex_domain::run::RunId;
use validex_domain::scalar::Scalar;
use validex_domain::validator::kinds::{ColumnNotNull, PrimaryKeyUniqueness, RowCountValidator};
use validex_domain::validator::{Envelope, Severity, ValidatorKind};
use validex_domain::Binding;

async fn engine_with(name: &str, setup: &[&str]) -> Arc<dyn Engine> {
    let engine = DuckDbEngine::in_memory(name).unwrap();
    for sql in setup {
        engine.run_sql(sql).await.unwrap();
    }
    Arc::new(engine)
}

fn engines(pairs: Vec<(&str, Arc<dyn Engine>)>) -> HashMap<String, Arc<dyn Engine>> {
    pairs.into_iter().map(|(name, engine)| (name.to_string(), engine)).collect()
}

#[tokio::test]
async fn s2_and_s3_column_not_null() {
    // spec.md S2/S3: t(c) = [1,2,3] passes, t(c) = [1,NULL,3] fails.
    let pass_engine = engine_with(
        "e",
        &["CREATE TABLE t (c INTEGER)", "INSERT INTO t VALUES (1), (2), (3)"],
    )
    .await;
    let fail_engine = engine_with(
        "e",
        &["CREATE TABLE t (c INTEGER)", "INSERT INTO t VALUES (1), (NULL), (3)"],
    )
    .await;

    let registry = MetricSet::new();
    let validator = ValidatorKind::MetricBacked(Arc::new(ColumnNotNull {
        column: "c".to_string(),
        envelope: Envelope::new(Severity::Fail),
    }));
    let binding = Binding::new("e", "t", validator);

    for (engine, expected) in [(pass_engine, Status::Pass), (fail_engine, Status::Fail)] {
        let engines = engines(vec![("e", engine)]);
        let runner = Runner::new(&engines, &registry);
        let report = runner.run(RunId::new(), &[binding.clone()], &RunOptions::default()).await;
        assert_eq!(report.outcome, RunOutcome::Complete);
        assert_eq!(report.results[0].status, expected);
    }
}

#[tokio::test]
async fn s4_row_count_bounds() {
    // spec.md S4: row count = 5. min=1,max=10 passes; min=6 fails.
    let engine = engine_with(
        "e",
        &[
            "CREATE TABLE t (id INTEGER)",
            "INSERT INTO t VALUES (1), (2), (3), (4), (5)",
        ],
    )
    .await;
    let engines_map = engines(vec![("e", engine)]);
    let registry = MetricSet::new();
    let runner = Runner::new(&engines_map, &registry);

    let passing = Binding::new(
        "e",
        "t",
        ValidatorKind::MetricBacked(Arc::new(RowCountValidator {
            min: Some(1),
            max: Some(10),
            envelope: Envelope::new(Severity::Fail),
        })),
    );
    let failing = Binding::new(
        "e",
        "t",
        ValidatorKind::MetricBacked(Arc::new(RowCountValidator {
            min: Some(6),
            max: None,
            envelope: Envelope::new(Severity::Fail),
        })),
    );

    let report = runner.run(RunId::new(), &[passing, failing], &RunOptions::default()).await;
    assert_eq!(report.results[0].status, Status::Pass);
    assert_eq!(report.results[1].status, Status::Fail);
    // Both bindings target the same (engine, table): one fused scan.
    assert_eq!(report.results[0].metric_values.get("row_cnt"), Some(&Scalar::I64(5)));
}

#[tokio::test]
async fn s5_primary_key_uniqueness_detects_duplicates() {
    // spec.md S5: rows [(1,'a'),(1,'b'),(2,'c')] -> FAIL, row_cnt=3, distinct_cnt=2.
    let engine = engine_with(
        "e",
        &[
            "CREATE TABLE t (id INTEGER, label VARCHAR)",
            "INSERT INTO t VALUES (1, 'a'), (1, 'b'), (2, 'c')",
        ],
    )
    .await;
    let engines_map = engines(vec![("e", engine)]);
    let registry = MetricSet::new();
    let runner = Runner::new(&engines_map, &registry);

    let binding = Binding::new(
        "e",
        "t",
        ValidatorKind::MetricBacked(Arc::new(PrimaryKeyUniqueness {
            keys: vec!["id".to_string()],
            envelope: Envelope::new(Severity::Fail),
        })),
    );

    let report = runner.run(RunId::new(), &[binding], &RunOptions::default()).await;
    assert_eq!(report.results[0].status, Status::Fail);
    assert_eq!(report.results[0].metric_values.get("row_cnt"), Some(&Scalar::I64(3)));
    assert_eq!(report.results[0].metric_values.get("distinct_cnt"), Some(&Scalar::I64(2)));
}

#[tokio::test]
async fn s6_engine_error_survives_alongside_good_bindings() {
    // spec.md S6: [good, bad, good] -> statuses [PASS, ERROR, PASS], length 3.
    let good_engine = engine_with("good", &["CREATE TABLE t (c INTEGER)", "INSERT INTO t VALUES (1)"]).await;
    let bad_engine = engine_with("bad", &[]).await; // no "missing" table ever created

    let engines_map = engines(vec![("good", good_engine), ("bad", bad_engine)]);
    let registry = MetricSet::new();
    let runner = Runner::new(&engines_map, &registry);

    let ok = || {
        Binding::new(
            "good",
            "t",
            ValidatorKind::MetricBacked(Arc::new(ColumnNotNull {
                column: "c".to_string(),
                envelope: Envelope::new(Severity::Fail),
            })),
        )
    };
    let bad = Binding::new(
        "bad",
        "missing",
        ValidatorKind::MetricBacked(Arc::new(ColumnNotNull {
            column: "c".to_string(),
            envelope: Envelope::new(Severity::Fail),
        })),
    );

    let bindings = vec![ok(), bad, ok()];
    let report = runner.run(RunId::new(), &bindings, &RunOptions::default()).await;

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.results[0].status, Status::Pass);
    assert_eq!(report.results[1].status, Status::Error);
    assert!(report.results[1].error_message.is_some());
    assert_eq!(report.results[2].status, Status::Pass);
}

#[tokio::test]
async fn runner_is_idempotent_on_a_stable_snapshot() {
    // Invariant 5: running the same bindings twice against the same data
    // yields the same statuses and metric values (ignoring timestamps).
    let engine = engine_with(
        "e",
        &["CREATE TABLE t (c INTEGER)", "INSERT INTO t VALUES (1), (NULL), (3)"],
    )
    .await;
    let engines_map = engines(vec![("e", engine)]);
    let registry = MetricSet::new();
    let runner = Runner::new(&engines_map, &registry);

    let binding = Binding::new(
        "e",
        "t",
        ValidatorKind::MetricBacked(Arc::new(ColumnNotNull {
            column: "c".to_string(),
            envelope: Envelope::new(Severity::Fail),
        })),
    );

    let first = runner.run(RunId::new(), &[binding.clone()], &RunOptions::default()).await;
    let second = runner.run(RunId::new(), &[binding], &RunOptions::default()).await;

    assert_eq!(first.results[0].status, second.results[0].status);
    assert_eq!(first.results[0].metric_values, second.results[0].metric_values);
}
