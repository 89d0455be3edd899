// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Process entry point: wires bootstrap-layer CLI parsing to the
//! application/infrastructure layers and maps the outcome to a process exit
//! code. Everything here is glue — the actual work happens in
//! `validex::application` and `validex::infrastructure`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use validex::application::runner::{RunOptions, RunOutcome, Runner};
use validex::application::stats::{self, StatSpec};
use validex::application::suite::{RawSla, RawSuite, SuiteLoader};
use validex::infrastructure::adapters::duckdb_engine::{DuckDbEngine, DuckDbTarget};
use validex::infrastructure::adapters::odbc_stub::OdbcEngine;
use validex::infrastructure::config::{AppConfig, StoreKind};
use validex::infrastructure::metrics::endpoint as metrics_endpoint;
use validex::infrastructure::metrics::ValidexMetrics;
use validex::infrastructure::repositories::duckdb_store::DuckDbResultStore;
use validex::infrastructure::repositories::file_store::FileArtifactResultStore;
use validex::presentation;
use validex_bootstrap::cli::ParseError;
use validex_bootstrap::signals::create_signal_handler;
use validex_bootstrap::{ExitCode as BootstrapExitCode, ValidatedCli, ValidatedCommand};
use validex_domain::engine::Engine;
use validex_domain::error::{Result, ValidationError};
use validex_domain::metric::MetricSet;
use validex_domain::run::{RunMetadata, RunStatus};
use validex_domain::sql::Dialect;
use validex_domain::store::ResultStore;
use validex_domain::validator::ValidatorKind;
use validex_domain::Binding;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = match validex_bootstrap::bootstrap_cli() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            return parse_error_exit_code(&err).into();
        }
    };

    validex::infrastructure::logging::init_tracing(cli.verbose, cli.json);

    validex_bootstrap::result_to_exit_code(dispatch(cli).await)
}

fn parse_error_exit_code(err: &ParseError) -> BootstrapExitCode {
    match err {
        ParseError::PathNotFound(_) => BootstrapExitCode::NoInput,
        ParseError::PathTraversal(_) | ParseError::InvalidValue { .. } => BootstrapExitCode::Usage,
    }
}

async fn dispatch(cli: ValidatedCli) -> anyhow::Result<bool> {
    let config = AppConfig::load(cli.config.as_deref()).context("loading application configuration")?;
    let engines = build_engines(&config).context("constructing configured engines")?;
    let store = build_store(&config).await.context("opening result store")?;

    let metrics = Arc::new(ValidexMetrics::new().context("initializing metrics registry")?);
    spawn_metrics_endpoint(config.metrics_port, metrics.clone());

    match cli.command {
        ValidatedCommand::Run { suite, sla, timeout_secs, no_fail_exit } => {
            let cancellation = spawn_signal_watcher();
            run_command(&suite, sla.as_deref(), timeout_secs, no_fail_exit, cli.json, &config, &engines, store, metrics, cancellation)
                .await
        }
        ValidatedCommand::Validate { suite } => validate_command(&suite, &engines).await,
        ValidatedCommand::Engines { suite } => engines_command(&suite, &engines).await,
    }
}

/// `config.engines` values are `"<kind>:<target>"`: `duckdb:memory`,
/// `duckdb:<path-to-file>`, or `odbc:[<dialect>:]<dsn>` (`<dialect>` one of
/// `postgres`/`generic`, defaulting to `generic`).
fn build_engines(config: &AppConfig) -> Result<HashMap<String, Arc<dyn Engine>>> {
    let mut engines: HashMap<String, Arc<dyn Engine>> = HashMap::new();
    for (name, target) in &config.engines {
        engines.insert(name.clone(), build_engine(name, target)?);
    }
    Ok(engines)
}

fn build_engine(name: &str, target: &str) -> Result<Arc<dyn Engine>> {
    let mut parts = target.splitn(2, ':');
    let kind = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("");

    match kind {
        "duckdb" => {
            let db_target =
                if rest.is_empty() || rest == "memory" { DuckDbTarget::InMemory } else { DuckDbTarget::File(PathBuf::from(rest)) };
            Ok(Arc::new(DuckDbEngine::new(name, db_target)?))
        }
        "odbc" => {
            let mut rest_parts = rest.splitn(2, ':');
            let first = rest_parts.next().unwrap_or("");
            let (dialect, dsn) = match rest_parts.next() {
                Some(dsn) => (parse_odbc_dialect(first), dsn),
                None => (Dialect::Generic, first),
            };
            Ok(Arc::new(OdbcEngine::new(name, dsn, dialect)))
        }
        other => Err(ValidationError::ConfigError(format!("engine '{name}' has unknown target kind '{other}'"))),
    }
}

fn parse_odbc_dialect(raw: &str) -> Dialect {
    match raw {
        "postgres" => Dialect::Postgres,
        _ => Dialect::Generic,
    }
}

async fn build_store(config: &AppConfig) -> Result<Option<Arc<dyn ResultStore>>> {
    match config.store {
        StoreKind::None => Ok(None),
        StoreKind::DuckDb => {
            let store = DuckDbResultStore::open_file(&config.store_path).await?;
            Ok(Some(Arc::new(store) as Arc<dyn ResultStore>))
        }
        StoreKind::FileArtifact => {
            let store = FileArtifactResultStore::new(&config.store_path).await?;
            Ok(Some(Arc::new(store) as Arc<dyn ResultStore>))
        }
    }
}

fn spawn_metrics_endpoint(port: u16, metrics: Arc<ValidexMetrics>) {
    tokio::spawn(async move {
        if let Err(err) = metrics_endpoint::serve(port, metrics).await {
            tracing::warn!(error = %err, "metrics endpoint stopped");
        }
    });
}

/// Installs the platform signal handler and returns the flag it sets on
/// SIGINT/SIGTERM/SIGHUP, wired directly into `RunOptions::cancellation`.
fn spawn_signal_watcher() -> Arc<AtomicBool> {
    let cancellation = Arc::new(AtomicBool::new(false));
    let flag = cancellation.clone();
    tokio::spawn(async move {
        let handler = create_signal_handler();
        handler.wait_for_signal(Box::new(move || flag.store(true, Ordering::SeqCst))).await;
    });
    cancellation
}

/// A suite file is either one suite, run standalone, or one SLA bundling
/// several suites under a shared `sla_name`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SuiteFile {
    Sla(RawSla),
    Suite(RawSuite),
}

fn parse_suite_file(yaml: &str) -> Result<SuiteFile> {
    serde_yaml::from_str(yaml).map_err(|e| ValidationError::ConfigError(format!("invalid suite YAML: {e}")))
}

async fn load_run_bindings(
    loader: &SuiteLoader<'_>,
    yaml: &str,
    sla_filter: Option<&str>,
) -> Result<(String, Option<String>, Vec<Binding>)> {
    match parse_suite_file(yaml)? {
        SuiteFile::Suite(suite) => {
            let bindings = loader.load_suite(&suite).await?;
            Ok((suite.suite_name, None, bindings))
        }
        SuiteFile::Sla(sla) => {
            if let Some(wanted) = sla_filter {
                if wanted != sla.sla_name {
                    return Err(ValidationError::ConfigError(format!(
                        "suite file defines sla '{}', but --sla '{wanted}' was requested",
                        sla.sla_name
                    )));
                }
            }
            let mut bindings = Vec::new();
            for suite in &sla.suites {
                bindings.extend(loader.load_suite(suite).await?);
            }
            Ok((sla.sla_name.clone(), Some(sla.sla_name), bindings))
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_command(
    suite_path: &Path,
    sla_filter: Option<&str>,
    timeout_secs: Option<u64>,
    no_fail_exit: bool,
    json: bool,
    config: &AppConfig,
    engines: &HashMap<String, Arc<dyn Engine>>,
    store: Option<Arc<dyn ResultStore>>,
    metrics: Arc<ValidexMetrics>,
    cancellation: Arc<AtomicBool>,
) -> anyhow::Result<bool> {
    let yaml = tokio::fs::read_to_string(suite_path)
        .await
        .with_context(|| format!("reading suite file {}", suite_path.display()))?;

    let loader = match &store {
        Some(store) => SuiteLoader::with_store(engines, store.clone()),
        None => SuiteLoader::new(engines),
    };

    let (suite_name, sla_name, bindings) = load_run_bindings(&loader, &yaml, sla_filter).await?;

    let mut run = RunMetadata::start(suite_name, sla_name.clone());
    let registry = MetricSet::new();
    let runner = Runner::new(engines, &registry);

    let timeout = timeout_secs.or(config.default_timeout_secs).map(Duration::from_secs);
    let options = RunOptions { cancellation: Some(cancellation), per_binding_timeout: timeout };

    let report = runner.run(run.run_id, &bindings, &options).await;

    run.finish(match report.outcome {
        RunOutcome::Complete => RunStatus::Complete,
        RunOutcome::Aborted => RunStatus::Aborted,
    });

    for result in &report.results {
        metrics.record_binding(&result.status.to_string());
    }
    metrics.record_run(&run.status.to_string());

    if let Some(store) = &store {
        store.persist_run(&run, &report.results, sla_name.as_deref()).await.context("persisting run results")?;
        collect_run_stats(engines, &bindings, &registry, &run, store.as_ref()).await;
    }

    if json {
        println!("{}", presentation::render_json(&run, &report.results)?);
    } else {
        print!("{}", presentation::render_console(&run, &report.results));
    }

    if report.outcome == RunOutcome::Aborted {
        return Err(ValidationError::Cancelled.into());
    }

    Ok(no_fail_exit || presentation::all_fail_severity_passed(&report.results))
}

/// Derives a single-column `(column, metric_key)` statistics spec per
/// metric-backed validator bound in this run, grouped by `(engine, table)`,
/// and hands each group to the stats pass. Composite-key requests (e.g.
/// `PrimaryKeyUniqueness`'s `distinct_cnt` over several columns) have no
/// single column to key a `StatRow` on, so they're skipped here; history for
/// those stays scoped to `MetricDrift` validators declared against a single
/// column directly. Failures are logged and otherwise swallowed — a missed
/// statistics sample never fails the run that produced it.
async fn collect_run_stats(
    engines: &HashMap<String, Arc<dyn Engine>>,
    bindings: &[Binding],
    registry: &MetricSet,
    run: &RunMetadata,
    store: &dyn ResultStore,
) {
    let mut by_table: HashMap<(String, String), Vec<StatSpec>> = HashMap::new();
    for binding in bindings {
        let ValidatorKind::MetricBacked(validator) = &binding.validator else { continue };
        for request in validator.metric_requests() {
            if request.columns.len() != 1 {
                continue;
            }
            let key = (binding.engine_name.clone(), binding.table.clone());
            by_table.entry(key).or_default().push(StatSpec::new(request.columns[0].clone(), request.metric_key.clone()));
        }
    }

    for ((engine_name, table), specs) in by_table {
        let Some(engine) = engines.get(&engine_name) else { continue };
        if let Err(err) = stats::collect_and_persist(engine.as_ref(), &table, &specs, registry, run, store).await {
            tracing::warn!(%engine_name, %table, error = %err, "failed to collect table statistics");
        }
    }
}

async fn validate_command(suite_path: &Path, engines: &HashMap<String, Arc<dyn Engine>>) -> anyhow::Result<bool> {
    let yaml = tokio::fs::read_to_string(suite_path)
        .await
        .with_context(|| format!("reading suite file {}", suite_path.display()))?;

    let loader = SuiteLoader::new(engines);
    let (suite_name, _, bindings) = load_run_bindings(&loader, &yaml, None).await?;
    println!("suite '{suite_name}' is valid: {} binding(s) resolved", bindings.len());
    Ok(true)
}

fn suite_file_engine_tables(file: &SuiteFile) -> Vec<(String, String)> {
    match file {
        SuiteFile::Suite(suite) => vec![(suite.engine.clone(), suite.table.clone())],
        SuiteFile::Sla(sla) => sla.suites.iter().map(|s| (s.engine.clone(), s.table.clone())).collect(),
    }
}

async fn engines_command(suite_path: &Path, engines: &HashMap<String, Arc<dyn Engine>>) -> anyhow::Result<bool> {
    let yaml = tokio::fs::read_to_string(suite_path)
        .await
        .with_context(|| format!("reading suite file {}", suite_path.display()))?;

    let file = parse_suite_file(&yaml)?;
    let mut all_reachable = true;

    for (engine_name, table) in suite_file_engine_tables(&file) {
        match engines.get(&engine_name) {
            None => {
                println!("{engine_name}\t{table}\tNOT CONFIGURED");
                all_reachable = false;
            }
            Some(engine) => match engine.list_columns(&table).await {
                Ok(columns) => println!("{engine_name}\t{table}\tOK ({} columns)", columns.len()),
                Err(err) => {
                    println!("{engine_name}\t{table}\tUNREACHABLE: {err}");
                    all_reachable = false;
                }
            },
        }
    }

    Ok(all_reachable)
}
