// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Dispatches bindings against their engines, fusing metric-backed validators
//! on the same `(engine, table)` into a single batched scan.
//!
//! The runner never parallelizes within a single `run` call: bindings are
//! executed sequentially in input order, so result order matches binding
//! order and determinism (spec.md Invariant 5) is trivial to reason about.
//! A caller that wants concurrency invokes multiple runners.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, instrument, warn};
use validex_domain::engine::Engine;
use validex_domain::error::ValidationError;
use validex_domain::metric::MetricSet;
use validex_domain::result::{Status, ValidationResult};
use validex_domain::run::RunId;
use validex_domain::validator::{Outcome, ValidatorKind};
use validex_domain::{build_batch, Binding};

/// Optional per-binding behavior a caller can layer on top of the bare
/// partition-and-dispatch algorithm.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Checked between bindings; when set, a cancelled run stops early and
    /// returns the results produced so far.
    pub cancellation: Option<Arc<AtomicBool>>,
    /// Wraps each binding's engine call. `None` means no timeout.
    pub per_binding_timeout: Option<Duration>,
}

/// Whether a run completed every binding or was stopped early by
/// cancellation — mirrors `validex_domain::run::RunStatus` without requiring
/// the caller to also track `RunMetadata` to know which bucket a run landed
/// in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Complete,
    Aborted,
}

pub struct RunReport {
    pub results: Vec<ValidationResult>,
    pub outcome: RunOutcome,
}

/// Executes bindings against a map of named engines.
pub struct Runner<'a> {
    engines: &'a HashMap<String, Arc<dyn Engine>>,
    registry: &'a MetricSet,
}

impl<'a> Runner<'a> {
    pub fn new(engines: &'a HashMap<String, Arc<dyn Engine>>, registry: &'a MetricSet) -> Self {
        Runner { engines, registry }
    }

    /// Dispatches `bindings`, stamping every emitted result with `run_id`.
    /// Preserves the input order of `bindings` in the output (spec.md §4.5
    /// step 5) even though partitions are processed out of binding order
    /// internally.
    #[instrument(skip(self, bindings, options), fields(run_id = %run_id, bindings = bindings.len()))]
    pub async fn run(&self, run_id: RunId, bindings: &[Binding], options: &RunOptions) -> RunReport {
        let mut results: Vec<Option<ValidationResult>> = (0..bindings.len()).map(|_| None).collect();

        for (partition_key, indices) in partition(bindings) {
            if is_cancelled(options) {
                warn!("run cancelled before partition ({}, {})", partition_key.0, partition_key.1);
                return RunReport { results: finish(results), outcome: RunOutcome::Aborted };
            }

            let engine = match self.engines.get(&partition_key.0) {
                Some(engine) => engine.clone(),
                None => {
                    for &ix in &indices {
                        results[ix] = Some(error_result(
                            run_id,
                            ix,
                            &bindings[ix],
                            format!("unknown engine '{}'", partition_key.0),
                        ));
                    }
                    continue;
                }
            };

            let (metric_ixs, custom_ixs): (Vec<usize>, Vec<usize>) =
                indices.into_iter().partition(|&ix| matches!(bindings[ix].validator, ValidatorKind::MetricBacked(_)));

            if !metric_ixs.is_empty() {
                self.run_metric_partition(run_id, bindings, &metric_ixs, &partition_key.1, engine.as_ref(), options, &mut results)
                    .await;
            }

            for ix in custom_ixs {
                if is_cancelled(options) {
                    return RunReport { results: finish(results), outcome: RunOutcome::Aborted };
                }
                let result = self.run_custom_binding(run_id, ix, &bindings[ix], engine.as_ref(), options).await;
                results[ix] = Some(result);
            }
        }

        RunReport { results: finish(results), outcome: RunOutcome::Complete }
    }

    async fn run_metric_partition(
        &self,
        run_id: RunId,
        bindings: &[Binding],
        indices: &[usize],
        table: &str,
        engine: &dyn Engine,
        options: &RunOptions,
        results: &mut [Option<ValidationResult>],
    ) {
        let validators: Vec<_> = indices
            .iter()
            .map(|&ix| match &bindings[ix].validator {
                ValidatorKind::MetricBacked(v) => v.clone(),
                ValidatorKind::Custom(_) => unreachable!("partitioned by kind"),
            })
            .collect();

        let mut requests = Vec::with_capacity(validators.len());
        let mut aliases_per_validator = Vec::with_capacity(validators.len());
        for validator in &validators {
            let mut local_aliases = Vec::new();
            for mut req in validator.metric_requests() {
                let alias = format!("v{}", requests.len());
                req.alias = alias.clone();
                local_aliases.push(alias);
                requests.push(req);
            }
            aliases_per_validator.push(local_aliases);
        }

        let sql = match build_batch(table, &requests, self.registry, engine.dialect()) {
            Ok(sql) => sql,
            Err(err) => {
                for &ix in indices {
                    results[ix] = Some(error_result(run_id, ix, &bindings[ix], err.to_string()));
                }
                return;
            }
        };
        debug!(%sql, "executing fused metric batch");

        let started = Instant::now();
        let run_outcome = run_with_timeout(engine.run_sql(&sql), options.per_binding_timeout).await;

        match run_outcome {
            Ok(Ok(rows)) => {
                let row = rows.single_row();
                for (pos, &ix) in indices.iter().enumerate() {
                    let validator = &validators[pos];
                    let mut values = IndexMap::new();
                    for alias in &aliases_per_validator[pos] {
                        if let Some(value) = row.get(alias) {
                            values.insert(alias.clone(), value.clone());
                        }
                    }
                    let outcome = validator.interpret(&values);
                    results[ix] = Some(stamp(run_id, ix, &bindings[ix], outcome, started.elapsed()));
                }
            }
            Ok(Err(err)) => {
                for &ix in indices {
                    results[ix] = Some(error_result(run_id, ix, &bindings[ix], err.to_string()));
                }
            }
            Err(_elapsed) => {
                let timeout = options.per_binding_timeout.unwrap_or_default();
                for &ix in indices {
                    results[ix] =
                        Some(error_result(run_id, ix, &bindings[ix], ValidationError::Timeout(timeout).to_string()));
                }
            }
        }
    }

    async fn run_custom_binding(
        &self,
        run_id: RunId,
        ix: usize,
        binding: &Binding,
        engine: &dyn Engine,
        options: &RunOptions,
    ) -> ValidationResult {
        let validator = match &binding.validator {
            ValidatorKind::Custom(v) => v.clone(),
            ValidatorKind::MetricBacked(_) => unreachable!("partitioned by kind"),
        };

        let started = Instant::now();
        let outcome = run_with_timeout(validator.execute(engine, &binding.table), options.per_binding_timeout).await;

        match outcome {
            Ok(Ok(outcome)) => stamp(run_id, ix, binding, outcome, started.elapsed()),
            Ok(Err(err)) => error_result(run_id, ix, binding, err.to_string()),
            Err(_elapsed) => {
                let timeout = options.per_binding_timeout.unwrap_or_default();
                error_result(run_id, ix, binding, ValidationError::Timeout(timeout).to_string())
            }
        }
    }
}

async fn run_with_timeout<T>(
    fut: impl std::future::Future<Output = T>,
    timeout: Option<Duration>,
) -> Result<T, tokio::time::error::Elapsed> {
    match timeout {
        Some(d) => tokio::time::timeout(d, fut).await,
        None => Ok(fut.await),
    }
}

fn is_cancelled(options: &RunOptions) -> bool {
    options.cancellation.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst))
}

fn stamp(run_id: RunId, binding_ix: usize, binding: &Binding, outcome: Outcome, duration: Duration) -> ValidationResult {
    ValidationResult {
        run_id,
        binding_ix,
        validator_type: binding.validator.type_name().to_string(),
        engine_name: binding.engine_name.clone(),
        table: binding.table.clone(),
        status: outcome.status,
        severity: binding.validator.envelope().severity,
        metric_values: outcome.metric_values,
        error_sample: outcome.error_sample,
        error_message: outcome.error_message,
        started_at: Utc::now(),
        duration,
    }
}

fn error_result(run_id: RunId, binding_ix: usize, binding: &Binding, message: String) -> ValidationResult {
    ValidationResult {
        run_id,
        binding_ix,
        validator_type: binding.validator.type_name().to_string(),
        engine_name: binding.engine_name.clone(),
        table: binding.table.clone(),
        status: Status::Error,
        severity: binding.validator.envelope().severity,
        metric_values: IndexMap::new(),
        error_sample: None,
        error_message: Some(message),
        started_at: Utc::now(),
        duration: Duration::ZERO,
    }
}

fn finish(results: Vec<Option<ValidationResult>>) -> Vec<ValidationResult> {
    results.into_iter().flatten().collect()
}

/// Groups binding indices by `(engine_name, table)`, preserving first-seen
/// partition order; within a partition, indices stay in input order.
fn partition(bindings: &[Binding]) -> Vec<((String, String), Vec<usize>)> {
    let mut order = Vec::new();
    let mut groups: HashMap<(String, String), Vec<usize>> = HashMap::new();
    for (ix, binding) in bindings.iter().enumerate() {
        let key = (binding.engine_name.clone(), binding.table.clone());
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(ix);
    }
    order.into_iter().map(|key| { let ixs = groups.remove(&key).unwrap(); (key, ixs) }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use validex_domain::engine::{Row, Rows};
    use validex_domain::error::Result;
    use validex_domain::metric::MetricRequest;
    use validex_domain::scalar::Scalar;
    use validex_domain::sql::Dialect;
    use validex_domain::validator::{Envelope, MetricBackedValidator, Severity};

    struct FakeEngine {
        name: String,
        fail_sql: Option<String>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Engine for FakeEngine {
        async fn run_sql(&self, sql: &str) -> Result<Rows> {
            *self.calls.lock().unwrap() += 1;
            if let Some(bad) = &self.fail_sql {
                if sql.contains(bad) {
                    return Err(ValidationError::EngineError { sql: sql.to_string(), underlying: "no such table".into() });
                }
            }
            let mut row = Row::new();
            row.insert("v0".to_string(), Scalar::I64(0));
            Ok(Rows { columns: vec!["v0".to_string()], rows: vec![row] })
        }

        async fn list_columns(&self, _table: &str) -> Result<Vec<String>> {
            Ok(vec!["c".to_string()])
        }

        fn dialect(&self) -> Dialect {
            Dialect::DuckDb
        }

        fn name(&self) -> &str {
            &self.name
        }

        async fn close(&self) {}
    }

    struct AlwaysNotNull {
        column: String,
        envelope: Envelope,
    }

    impl MetricBackedValidator for AlwaysNotNull {
        fn type_name(&self) -> &'static str {
            "ColumnNotNull"
        }
        fn envelope(&self) -> &Envelope {
            &self.envelope
        }
        fn metric_requests(&self) -> Vec<MetricRequest> {
            vec![MetricRequest::new("null_cnt", "value").with_column(&self.column)]
        }
        fn interpret(&self, values: &IndexMap<String, Scalar>) -> Outcome {
            match values.get("value") {
                Some(Scalar::I64(0)) => Outcome::pass(),
                _ => Outcome::fail(),
            }
        }
    }

    fn binding(engine: &str, table: &str) -> Binding {
        Binding::new(
            engine,
            table,
            ValidatorKind::MetricBacked(Arc::new(AlwaysNotNull {
                column: "c".to_string(),
                envelope: Envelope::new(Severity::Fail),
            })),
        )
    }

    #[tokio::test]
    async fn preserves_binding_order_and_survives_engine_error() {
        // spec.md S6
        let good_engine: Arc<dyn Engine> =
            Arc::new(FakeEngine { name: "e".to_string(), fail_sql: None, calls: Mutex::new(0) });
        let bad_engine: Arc<dyn Engine> =
            Arc::new(FakeEngine { name: "bad".to_string(), fail_sql: Some("FROM \"missing\"".to_string()), calls: Mutex::new(0) });

        let mut engines = HashMap::new();
        engines.insert("e".to_string(), good_engine);
        engines.insert("bad".to_string(), bad_engine);

        let bindings = vec![binding("e", "t"), binding("bad", "missing"), binding("e", "t")];
        let registry = MetricSet::new();
        let runner = Runner::new(&engines, &registry);

        let report = runner.run(RunId::new(), &bindings, &RunOptions::default()).await;
        assert_eq!(report.outcome, RunOutcome::Complete);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.results[0].status, Status::Pass);
        assert_eq!(report.results[1].status, Status::Error);
        assert!(report.results[1].error_message.is_some());
        assert_eq!(report.results[2].status, Status::Pass);
    }

    #[tokio::test]
    async fn same_partition_validators_share_one_scan() {
        let fake = Arc::new(FakeEngine { name: "e".to_string(), fail_sql: None, calls: Mutex::new(0) });
        let engine: Arc<dyn Engine> = fake.clone();
        let mut engines = HashMap::new();
        engines.insert("e".to_string(), engine);

        let bindings = vec![binding("e", "t"), binding("e", "t")];
        let registry = MetricSet::new();
        let runner = Runner::new(&engines, &registry);
        let report = runner.run(RunId::new(), &bindings, &RunOptions::default()).await;

        assert_eq!(report.results.len(), 2);
        assert_eq!(*fake.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_before_later_partitions() {
        let engine: Arc<dyn Engine> = Arc::new(FakeEngine { name: "e".to_string(), fail_sql: None, calls: Mutex::new(0) });
        let mut engines = HashMap::new();
        engines.insert("e".to_string(), engine);

        let bindings = vec![binding("e", "t1"), binding("e", "t2")];
        let registry = MetricSet::new();
        let runner = Runner::new(&engines, &registry);

        let flag = Arc::new(AtomicBool::new(true));
        let options = RunOptions { cancellation: Some(flag), per_binding_timeout: None };
        let report = runner.run(RunId::new(), &bindings, &options).await;
        assert_eq!(report.outcome, RunOutcome::Aborted);
        assert!(report.results.is_empty());
    }
}
