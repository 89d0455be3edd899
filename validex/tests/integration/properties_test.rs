//! Property-based tests for spec.md §8 invariants 2 and 6. Both are
//! statements about engine execution semantics, not pure domain logic, so
//! they run against a real in-memory DuckDB engine rather than a fake one.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use validex::application::runner::{RunOptions, Runner};
use validex::infrastructure::adapters::duckdb_engine::DuckDbEngine;
use validex_domain::batch::build_batch;
use validex_domain::engine::Engine;
use validex_domain::metric::{MetricRequest, MetricSet};
use validex_domain::result::Status;
use validex_domain::run::RunId;
use validex_domain::sql::Dialect;
use validex_domain::validator::kinds::ColumnNotNull;
use validex_domain::validator::{Envelope, Severity, ValidatorKind};
use validex_domain::Binding;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // spec.md Invariant 2: a metric request's batched scalar, run with
    // `filter_sql=phi`, equals what running the metric alone over
    // `table WHERE phi` would produce.
    #[test]
    fn filtered_batch_scalar_matches_the_direct_filtered_query(flags in prop::collection::vec(any::<bool>(), 0..40)) {
        runtime().block_on(async {
            let engine = DuckDbEngine::in_memory("e").unwrap();
            engine.run_sql("CREATE TABLE t (flag BOOLEAN)").await.unwrap();
            for flag in &flags {
                engine.run_sql(&format!("INSERT INTO t VALUES ({flag})")).await.unwrap();
            }

            let registry = MetricSet::new();
            let requests = vec![MetricRequest::new("row_cnt", "v0").with_filter("flag")];
            let sql = build_batch("t", &requests, &registry, Dialect::DuckDb).unwrap();
            let batched = engine.run_sql(&sql).await.unwrap();
            let batched_value = batched.single_row().get("v0").cloned().unwrap();

            let direct = engine.run_sql("SELECT COUNT(*) AS c FROM t WHERE flag").await.unwrap();
            let direct_value = direct.single_row().get("c").cloned().unwrap();

            prop_assert_eq!(batched_value, direct_value);
        });
    }

    // spec.md Invariant 6: an engine error during one binding never prevents
    // the remaining bindings from executing, for any position of the bad
    // binding within the input list.
    #[test]
    fn an_engine_error_anywhere_in_the_list_never_drops_other_bindings(
        good_count in 1usize..6,
        bad_ix in 0usize..6,
    ) {
        runtime().block_on(async {
            let good_engine = DuckDbEngine::in_memory("good").unwrap();
            good_engine.run_sql("CREATE TABLE t (c INTEGER)").await.unwrap();
            good_engine.run_sql("INSERT INTO t VALUES (1), (2), (3)").await.unwrap();
            let bad_engine = DuckDbEngine::in_memory("bad").unwrap(); // "missing" table never created

            let mut engines: HashMap<String, Arc<dyn Engine>> = HashMap::new();
            engines.insert("good".to_string(), Arc::new(good_engine));
            engines.insert("bad".to_string(), Arc::new(bad_engine));

            let registry = MetricSet::new();
            let runner = Runner::new(&engines, &registry);

            let bad_ix = bad_ix.min(good_count);
            let mut bindings = Vec::with_capacity(good_count + 1);
            for i in 0..=good_count {
                if i == bad_ix {
                    bindings.push(Binding::new(
                        "bad",
                        "missing",
                        ValidatorKind::MetricBacked(Arc::new(ColumnNotNull {
                            column: "c".to_string(),
                            envelope: Envelope::new(Severity::Fail),
                        })),
                    ));
                } else {
                    bindings.push(Binding::new(
                        "good",
                        "t",
                        ValidatorKind::MetricBacked(Arc::new(ColumnNotNull {
                            column: "c".to_string(),
                            envelope: Envelope::new(Severity::Fail),
                        })),
                    ));
                }
            }

            let report = runner.run(RunId::new(), &bindings, &RunOptions::default()).await;

            prop_assert_eq!(report.results.len(), bindings.len());
            for (i, result) in report.results.iter().enumerate() {
                if i == bad_ix {
                    prop_assert_eq!(result.status, Status::Error);
                } else {
                    prop_assert_eq!(result.status, Status::Pass);
                }
            }
        });
    }
}
