// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Renders a run's results to the console or as JSON, and decides whether
//! the run, taken as a whole, passed.
//!
//! This is the only layer that formats for a human or a downstream tool;
//! everything upstream of it deals in `ValidationResult`/`RunReport` values.

use serde::Serialize;
use validex_domain::result::{Status, ValidationResult};
use validex_domain::run::RunMetadata;
use validex_domain::validator::Severity;

/// A Fail-severity result that didn't pass stops the run from being
/// considered successful (spec.md's exit-code contract); Warn/Info results
/// never do, regardless of status.
pub fn all_fail_severity_passed(results: &[ValidationResult]) -> bool {
    !results.iter().any(|r| r.severity == Severity::Fail && !r.is_pass())
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    run: &'a RunMetadata,
    results: &'a [ValidationResult],
}

/// Serializes `run` and `results` as a single JSON document.
pub fn render_json(run: &RunMetadata, results: &[ValidationResult]) -> validex_domain::error::Result<String> {
    let report = JsonReport { run, results };
    serde_json::to_string_pretty(&report).map_err(Into::into)
}

/// Renders a fixed-width console table, one row per binding, followed by a
/// pass/fail/error tally.
pub fn render_console(run: &RunMetadata, results: &[ValidationResult]) -> String {
    let mut out = String::new();
    out.push_str(&format!("run {}  suite {}\n", run.run_id, run.suite_name));
    if let Some(sla) = &run.sla_name {
        out.push_str(&format!("sla {sla}\n"));
    }

    let widths = column_widths(results);
    out.push_str(&header_line(&widths));
    out.push_str(&separator_line(&widths));
    for result in results {
        out.push_str(&row_line(result, &widths));
    }

    let (pass, fail, error) = tally(results);
    out.push_str(&format!("\n{pass} passed, {fail} failed, {error} errored\n"));
    out
}

struct Widths {
    status: usize,
    severity: usize,
    validator_type: usize,
    engine_name: usize,
    table: usize,
}

fn column_widths(results: &[ValidationResult]) -> Widths {
    let mut widths = Widths { status: 6, severity: 8, validator_type: 14, engine_name: 6, table: 5 };
    for r in results {
        widths.validator_type = widths.validator_type.max(r.validator_type.len());
        widths.engine_name = widths.engine_name.max(r.engine_name.len());
        widths.table = widths.table.max(r.table.len());
    }
    widths
}

fn header_line(w: &Widths) -> String {
    format!(
        "{:<sw$}  {:<vw$}  {:<tw$}  {:<ew$}  {:<sevw$}  MESSAGE\n",
        "STATUS",
        "VALIDATOR",
        "TABLE",
        "ENGINE",
        "SEVERITY",
        sw = w.status,
        vw = w.validator_type,
        tw = w.table,
        ew = w.engine_name,
        sevw = w.severity,
    )
}

fn separator_line(w: &Widths) -> String {
    let total = w.status + w.validator_type + w.table + w.engine_name + w.severity + 8;
    format!("{}\n", "-".repeat(total))
}

fn row_line(r: &ValidationResult, w: &Widths) -> String {
    let message = r.error_message.as_deref().unwrap_or("");
    format!(
        "{:<sw$}  {:<vw$}  {:<tw$}  {:<ew$}  {:<sevw$}  {message}\n",
        r.status.to_string(),
        r.validator_type,
        r.table,
        r.engine_name,
        r.severity.to_string(),
        sw = w.status,
        vw = w.validator_type,
        tw = w.table,
        ew = w.engine_name,
        sevw = w.severity,
    )
}

fn tally(results: &[ValidationResult]) -> (usize, usize, usize) {
    let mut pass = 0;
    let mut fail = 0;
    let mut error = 0;
    for r in results {
        match r.status {
            Status::Pass => pass += 1,
            Status::Fail => fail += 1,
            Status::Error => error += 1,
        }
    }
    (pass, fail, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::time::Duration;
    use validex_domain::run::RunId;

    fn result(status: Status, severity: Severity) -> ValidationResult {
        ValidationResult {
            run_id: RunId::new(),
            binding_ix: 0,
            validator_type: "ColumnNotNull".into(),
            engine_name: "main".into(),
            table: "users".into(),
            status,
            severity,
            metric_values: IndexMap::new(),
            error_sample: None,
            error_message: None,
            started_at: chrono::Utc::now(),
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn fail_severity_failure_fails_the_run() {
        let results = vec![result(Status::Pass, Severity::Fail), result(Status::Fail, Severity::Fail)];
        assert!(!all_fail_severity_passed(&results));
    }

    #[test]
    fn warn_severity_failure_does_not_fail_the_run() {
        let results = vec![result(Status::Fail, Severity::Warn)];
        assert!(all_fail_severity_passed(&results));
    }

    #[test]
    fn all_passing_fail_severity_results_pass_the_run() {
        let results = vec![result(Status::Pass, Severity::Fail), result(Status::Pass, Severity::Info)];
        assert!(all_fail_severity_passed(&results));
    }

    #[test]
    fn console_render_includes_tally_and_run_id() {
        let run = RunMetadata::start("nightly", None);
        let results = vec![result(Status::Pass, Severity::Fail), result(Status::Fail, Severity::Fail)];
        let text = render_console(&run, &results);
        assert!(text.contains(&run.run_id.to_string()));
        assert!(text.contains("1 passed, 1 failed, 0 errored"));
    }

    #[test]
    fn json_render_round_trips_result_count() {
        let run = RunMetadata::start("nightly", None);
        let results = vec![result(Status::Pass, Severity::Fail)];
        let text = render_json(&run, &results).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["results"].as_array().unwrap().len(), 1);
    }
}
