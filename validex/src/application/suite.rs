// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Loads a YAML suite into `Vec<Binding>`, resolving `expectation_type`
//! strings against a name-keyed constructor table (spec.md §9's "dynamic
//! validator classes" note, resolved with an explicit registry rather than
//! reflection). Unknown types and columns absent from the target table are
//! rejected here, before any binding reaches the runner.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use validex_domain::engine::Engine;
use validex_domain::error::{Result, ValidationError};
use validex_domain::store::ResultStore;
use validex_domain::validator::kinds::{
    ColumnDistinctCount, ColumnGreaterEqual, ColumnMapping, ColumnMatchesRegex, ColumnMax, ColumnMin, ColumnNotNull,
    ColumnNullPct, ColumnRange, ColumnReconciliation, ColumnValueInSet, ColumnZScoreOutlierRows, CmpOp,
    DuplicateRowValidator, MetricDrift, PrimaryKeyUniqueness, RowCountValidator, SqlErrorRowsValidator,
    TableReconciliation,
};
use validex_domain::validator::{Envelope, Severity, ValidatorKind};
use validex_domain::Binding;

const DEFAULT_MAX_ERROR_ROWS: usize = 20;
const DEFAULT_Z_THRESH: f64 = 3.0;
const DEFAULT_DRIFT_WINDOW: usize = 20;

#[derive(Debug, Deserialize)]
pub struct RawSla {
    pub sla_name: String,
    pub suites: Vec<RawSuite>,
}

#[derive(Debug, Deserialize)]
pub struct RawSuite {
    pub suite_name: String,
    pub engine: String,
    pub table: String,
    pub expectations: Vec<RawExpectation>,
}

#[derive(Debug, Deserialize)]
pub struct RawExpectation {
    pub expectation_type: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(rename = "where")]
    #[serde(default)]
    pub where_sql: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub max_error_rows: Option<usize>,
    #[serde(flatten)]
    pub fields: HashMap<String, serde_yaml::Value>,
}

impl RawExpectation {
    fn envelope(&self) -> Result<Envelope> {
        let severity = match self.severity.as_deref() {
            None => Severity::Fail,
            Some("Fail") | Some("FAIL") => Severity::Fail,
            Some("Warn") | Some("WARN") => Severity::Warn,
            Some("Info") | Some("INFO") => Severity::Info,
            Some(other) => return Err(ValidationError::ConfigError(format!("unknown severity '{other}'"))),
        };
        let mut envelope = Envelope::new(severity).with_tags(self.tags.clone());
        if let Some(w) = &self.where_sql {
            envelope = envelope.with_where(w.clone());
        }
        Ok(envelope)
    }

    fn max_error_rows(&self) -> usize {
        self.max_error_rows.unwrap_or(DEFAULT_MAX_ERROR_ROWS)
    }

    fn field_str(&self, name: &str) -> Result<String> {
        self.fields
            .get(name)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ValidationError::ConfigError(format!("'{}' missing required field '{name}'", self.expectation_type)))
    }

    fn field_str_opt(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(|v| v.as_str()).map(str::to_string)
    }

    fn field_f64(&self, name: &str) -> Result<f64> {
        self.fields
            .get(name)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ValidationError::ConfigError(format!("'{}' missing required numeric field '{name}'", self.expectation_type)))
    }

    fn field_f64_opt(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(|v| v.as_f64())
    }

    fn field_usize_opt(&self, name: &str) -> Option<usize> {
        self.fields.get(name).and_then(|v| v.as_u64()).map(|v| v as usize)
    }

    fn field_i64_opt(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(|v| v.as_i64())
    }

    fn field_bool(&self, name: &str, default: bool) -> bool {
        self.fields.get(name).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    fn field_str_list(&self, name: &str) -> Result<Vec<String>> {
        let value = self
            .fields
            .get(name)
            .ok_or_else(|| ValidationError::ConfigError(format!("'{}' missing required field '{name}'", self.expectation_type)))?;
        value
            .as_sequence()
            .ok_or_else(|| ValidationError::ConfigError(format!("'{name}' must be a list")))?
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(|| ValidationError::ConfigError(format!("'{name}' entries must be strings"))))
            .collect()
    }
}

/// Resolves a parsed suite (plus, when needed, a second named engine for
/// reconciliation validators) into runner-ready bindings.
pub struct SuiteLoader<'a> {
    engines: &'a HashMap<String, Arc<dyn Engine>>,
    store: Option<Arc<dyn ResultStore>>,
}

impl<'a> SuiteLoader<'a> {
    pub fn new(engines: &'a HashMap<String, Arc<dyn Engine>>) -> Self {
        SuiteLoader { engines, store: None }
    }

    /// Enables `MetricDrift` bindings, which read history through `store`.
    /// A suite that declares `MetricDrift` without a store configured is
    /// rejected at load time (`ConfigError`), not silently skipped.
    pub fn with_store(engines: &'a HashMap<String, Arc<dyn Engine>>, store: Arc<dyn ResultStore>) -> Self {
        SuiteLoader { engines, store: Some(store) }
    }

    pub async fn load_str(&self, yaml: &str) -> Result<Vec<Binding>> {
        let suite: RawSuite =
            serde_yaml::from_str(yaml).map_err(|e| ValidationError::ConfigError(format!("invalid suite YAML: {e}")))?;
        self.load_suite(&suite).await
    }

    pub async fn load_sla_str(&self, yaml: &str) -> Result<Vec<(String, Vec<Binding>)>> {
        let sla: RawSla =
            serde_yaml::from_str(yaml).map_err(|e| ValidationError::ConfigError(format!("invalid SLA YAML: {e}")))?;
        let mut out = Vec::with_capacity(sla.suites.len());
        for suite in &sla.suites {
            out.push((suite.suite_name.clone(), self.load_suite(suite).await?));
        }
        Ok(out)
    }

    pub async fn load_suite(&self, suite: &RawSuite) -> Result<Vec<Binding>> {
        let engine = self.engine(&suite.engine)?;
        let columns = engine.list_columns(&suite.table).await?;

        let mut bindings = Vec::with_capacity(suite.expectations.len());
        for expectation in &suite.expectations {
            let kind = self.build_validator(expectation, &columns).await?;
            bindings.push(Binding::new(suite.engine.clone(), suite.table.clone(), kind));
        }
        Ok(bindings)
    }

    fn engine(&self, name: &str) -> Result<Arc<dyn Engine>> {
        self.engines
            .get(name)
            .cloned()
            .ok_or_else(|| ValidationError::ConfigError(format!("suite references unknown engine '{name}'")))
    }

    fn require_column(&self, columns: &[String], column: &str, expectation_type: &str) -> Result<()> {
        if columns.iter().any(|c| c == column) {
            Ok(())
        } else {
            Err(ValidationError::ConfigError(format!(
                "'{expectation_type}' references column '{column}' which does not exist on the target table"
            )))
        }
    }

    async fn build_validator(&self, exp: &RawExpectation, columns: &[String]) -> Result<ValidatorKind> {
        let envelope = exp.envelope()?;
        match exp.expectation_type.as_str() {
            "ColumnNotNull" => {
                let column = exp.field_str("column")?;
                self.require_column(columns, &column, &exp.expectation_type)?;
                Ok(ValidatorKind::MetricBacked(Arc::new(ColumnNotNull { column, envelope })))
            }
            "ColumnNullPct" => {
                let column = exp.field_str("column")?;
                self.require_column(columns, &column, &exp.expectation_type)?;
                let max = exp.field_f64("max")?;
                Ok(ValidatorKind::MetricBacked(Arc::new(ColumnNullPct { column, max, envelope })))
            }
            "ColumnDistinctCount" => {
                let column = exp.field_str("column")?;
                self.require_column(columns, &column, &exp.expectation_type)?;
                let expected = exp
                    .field_i64_opt("expected")
                    .ok_or_else(|| ValidationError::ConfigError("'ColumnDistinctCount' missing 'expected'".into()))?;
                let op = match exp.field_str_opt("op").as_deref() {
                    None | Some("==") | Some("eq") => CmpOp::Eq,
                    Some(">=") | Some("ge") => CmpOp::Ge,
                    Some("<=") | Some("le") => CmpOp::Le,
                    Some(other) => return Err(ValidationError::ConfigError(format!("unknown comparison op '{other}'"))),
                };
                Ok(ValidatorKind::MetricBacked(Arc::new(ColumnDistinctCount { column, expected, op, envelope })))
            }
            "ColumnMin" => {
                let column = exp.field_str("column")?;
                self.require_column(columns, &column, &exp.expectation_type)?;
                let bound = exp.field_f64("value")?;
                let strict = exp.field_bool("strict", false);
                Ok(ValidatorKind::MetricBacked(Arc::new(ColumnMin { column, bound, strict, envelope })))
            }
            "ColumnMax" => {
                let column = exp.field_str("column")?;
                self.require_column(columns, &column, &exp.expectation_type)?;
                let bound = exp.field_f64("value")?;
                let strict = exp.field_bool("strict", false);
                Ok(ValidatorKind::MetricBacked(Arc::new(ColumnMax { column, bound, strict, envelope })))
            }
            "ColumnRange" => {
                let column = exp.field_str("column")?;
                self.require_column(columns, &column, &exp.expectation_type)?;
                let lo = exp.field_f64("lo")?;
                let hi = exp.field_f64("hi")?;
                Ok(ValidatorKind::MetricBacked(Arc::new(ColumnRange { column, lo, hi, envelope })))
            }
            "RowCountValidator" => {
                let min = exp.field_i64_opt("min");
                let max = exp.field_i64_opt("max");
                Ok(ValidatorKind::MetricBacked(Arc::new(RowCountValidator { min, max, envelope })))
            }
            "PrimaryKeyUniqueness" => {
                let keys = exp.field_str_list("keys")?;
                for key in &keys {
                    self.require_column(columns, key, &exp.expectation_type)?;
                }
                Ok(ValidatorKind::MetricBacked(Arc::new(PrimaryKeyUniqueness { keys, envelope })))
            }
            "ColumnValueInSet" => {
                let column = exp.field_str("column")?;
                self.require_column(columns, &column, &exp.expectation_type)?;
                let set = exp.field_str_list("set")?;
                let allow_null = exp.field_bool("allow_null", false);
                Ok(ValidatorKind::Custom(Arc::new(ColumnValueInSet {
                    column,
                    set,
                    allow_null,
                    max_error_rows: exp.max_error_rows(),
                    envelope,
                })))
            }
            "ColumnMatchesRegex" => {
                let column = exp.field_str("column")?;
                self.require_column(columns, &column, &exp.expectation_type)?;
                let pattern = exp.field_str("pattern")?;
                regex::Regex::new(&pattern).map_err(|e| ValidationError::ConfigError(format!("invalid regex '{pattern}': {e}")))?;
                Ok(ValidatorKind::Custom(Arc::new(ColumnMatchesRegex {
                    column,
                    pattern,
                    max_error_rows: exp.max_error_rows(),
                    envelope,
                })))
            }
            "ColumnGreaterEqual" => {
                let left = exp.field_str("left")?;
                let right = exp.field_str("right")?;
                self.require_column(columns, &left, &exp.expectation_type)?;
                self.require_column(columns, &right, &exp.expectation_type)?;
                Ok(ValidatorKind::Custom(Arc::new(ColumnGreaterEqual {
                    left,
                    right,
                    max_error_rows: exp.max_error_rows(),
                    envelope,
                })))
            }
            "DuplicateRowValidator" => {
                let keys = exp.field_str_list("keys")?;
                for key in &keys {
                    self.require_column(columns, key, &exp.expectation_type)?;
                }
                Ok(ValidatorKind::Custom(Arc::new(DuplicateRowValidator { keys, max_error_rows: exp.max_error_rows(), envelope })))
            }
            "SqlErrorRowsValidator" => {
                let sql = exp.field_str("sql")?;
                Ok(ValidatorKind::Custom(Arc::new(SqlErrorRowsValidator { sql, max_error_rows: exp.max_error_rows(), envelope })))
            }
            "TableReconciliation" => {
                let other_engine_name = exp.field_str("other_engine")?;
                let other_table = exp.field_str("other_table")?;
                let other_engine = self.engine(&other_engine_name)?;
                Ok(ValidatorKind::Custom(Arc::new(TableReconciliation { other_engine, other_table, envelope })))
            }
            "ColumnReconciliation" => {
                let other_engine_name = exp.field_str("other_engine")?;
                let other_table = exp.field_str("other_table")?;
                let other_engine = self.engine(&other_engine_name)?;
                let mappings = self.parse_mappings(exp)?;
                Ok(ValidatorKind::Custom(Arc::new(ColumnReconciliation { other_engine, other_table, mappings, envelope })))
            }
            "ColumnZScoreOutlierRows" => {
                let column = exp.field_str("column")?;
                self.require_column(columns, &column, &exp.expectation_type)?;
                let z_thresh = exp.field_f64_opt("z_thresh").unwrap_or(DEFAULT_Z_THRESH);
                Ok(ValidatorKind::Custom(Arc::new(ColumnZScoreOutlierRows {
                    column,
                    z_thresh,
                    max_error_rows: exp.max_error_rows(),
                    envelope,
                })))
            }
            "MetricDrift" => {
                let metric_key = exp.field_str("metric_key")?;
                let column = exp.field_str_opt("column");
                if let Some(column) = &column {
                    self.require_column(columns, column, &exp.expectation_type)?;
                }
                let window = exp.field_usize_opt("window").unwrap_or(DEFAULT_DRIFT_WINDOW);
                let max_pct_change = exp.field_f64("max_pct_change")?;
                let store = self.store.clone().ok_or_else(|| {
                    ValidationError::ConfigError("'MetricDrift' requires a result store, but none is configured".into())
                })?;
                Ok(ValidatorKind::Custom(Arc::new(MetricDrift { metric_key, column, window, max_pct_change, store, envelope })))
            }
            other => Err(ValidationError::ConfigError(format!("unknown expectation type '{other}'"))),
        }
    }

    fn parse_mappings(&self, exp: &RawExpectation) -> Result<Vec<ColumnMapping>> {
        let raw = exp
            .fields
            .get("mappings")
            .and_then(|v| v.as_sequence())
            .ok_or_else(|| ValidationError::ConfigError("'ColumnReconciliation' missing 'mappings'".into()))?;
        raw.iter()
            .map(|entry| {
                let map = entry.as_mapping().ok_or_else(|| ValidationError::ConfigError("mapping entry must be an object".into()))?;
                let get_str = |key: &str| -> Result<String> {
                    map.get(serde_yaml::Value::String(key.to_string()))
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                        .ok_or_else(|| ValidationError::ConfigError(format!("mapping entry missing '{key}'")))
                };
                let tolerance = map.get(serde_yaml::Value::String("tolerance".to_string())).and_then(|v| v.as_f64());
                Ok(ColumnMapping {
                    metric_key: get_str("metric_key")?,
                    left_column: get_str("left_column")?,
                    right_column: get_str("right_column")?,
                    tolerance,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use validex_domain::engine::Rows;
    use validex_domain::sql::Dialect;

    struct StubEngine {
        columns: Vec<String>,
    }

    #[async_trait]
    impl Engine for StubEngine {
        async fn run_sql(&self, _sql: &str) -> Result<Rows> {
            Ok(Rows::empty())
        }
        async fn list_columns(&self, _table: &str) -> Result<Vec<String>> {
            Ok(self.columns.clone())
        }
        fn dialect(&self) -> Dialect {
            Dialect::DuckDb
        }
        fn name(&self) -> &str {
            "stub"
        }
        async fn close(&self) {}
    }

    fn engines() -> HashMap<String, Arc<dyn Engine>> {
        let mut map: HashMap<String, Arc<dyn Engine>> = HashMap::new();
        map.insert("main".to_string(), Arc::new(StubEngine { columns: vec!["id".to_string(), "email".to_string()] }));
        map
    }

    #[tokio::test]
    async fn loads_a_minimal_suite() {
        let yaml = r#"
suite_name: users_nightly
engine: main
table: users
expectations:
  - expectation_type: ColumnNotNull
    column: email
  - expectation_type: RowCountValidator
    min: 1
"#;
        let engines = engines();
        let loader = SuiteLoader::new(&engines);
        let bindings = loader.load_str(yaml).await.unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].validator.type_name(), "ColumnNotNull");
        assert_eq!(bindings[1].validator.type_name(), "RowCountValidator");
    }

    #[tokio::test]
    async fn z_score_outlier_rows_applies_default_threshold() {
        let yaml = r#"
suite_name: s
engine: main
table: users
expectations:
  - expectation_type: ColumnZScoreOutlierRows
    column: email
"#;
        let engines = engines();
        let loader = SuiteLoader::new(&engines);
        let bindings = loader.load_str(yaml).await.unwrap();
        assert_eq!(bindings[0].validator.type_name(), "ColumnZScoreOutlierRows");
    }

    #[tokio::test]
    async fn metric_drift_without_store_is_config_error() {
        let yaml = r#"
suite_name: s
engine: main
table: users
expectations:
  - expectation_type: MetricDrift
    metric_key: row_cnt
    max_pct_change: 0.2
"#;
        let engines = engines();
        let loader = SuiteLoader::new(&engines);
        let err = loader.load_str(yaml).await.unwrap_err();
        assert!(matches!(err, ValidationError::ConfigError(_)));
    }

    struct NullStore;

    #[async_trait]
    impl validex_domain::store::ResultStore for NullStore {
        async fn persist_run(
            &self,
            _run: &validex_domain::run::RunMetadata,
            _results: &[validex_domain::result::ValidationResult],
            _sla: Option<&str>,
        ) -> Result<()> {
            Ok(())
        }
        async fn persist_stats(&self, _run: &validex_domain::run::RunMetadata, _stats: &[validex_domain::store::StatRow]) -> Result<()> {
            Ok(())
        }
        async fn load_recent_stats(
            &self,
            _table: &str,
            _column: &str,
            _metric_key: &str,
            _limit: usize,
        ) -> Result<Vec<validex_domain::scalar::Scalar>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn metric_drift_with_store_loads() {
        let yaml = r#"
suite_name: s
engine: main
table: users
expectations:
  - expectation_type: MetricDrift
    metric_key: row_cnt
    max_pct_change: 0.2
"#;
        let engines = engines();
        let loader = SuiteLoader::with_store(&engines, Arc::new(NullStore));
        let bindings = loader.load_str(yaml).await.unwrap();
        assert_eq!(bindings[0].validator.type_name(), "MetricDrift");
    }

    #[tokio::test]
    async fn unknown_expectation_type_is_config_error() {
        let yaml = r#"
suite_name: s
engine: main
table: users
expectations:
  - expectation_type: Bogus
"#;
        let engines = engines();
        let loader = SuiteLoader::new(&engines);
        let err = loader.load_str(yaml).await.unwrap_err();
        assert!(matches!(err, ValidationError::ConfigError(_)));
    }

    #[tokio::test]
    async fn missing_column_is_config_error() {
        let yaml = r#"
suite_name: s
engine: main
table: users
expectations:
  - expectation_type: ColumnNotNull
    column: nonexistent
"#;
        let engines = engines();
        let loader = SuiteLoader::new(&engines);
        let err = loader.load_str(yaml).await.unwrap_err();
        assert!(matches!(err, ValidationError::ConfigError(_)));
    }

    #[tokio::test]
    async fn unknown_engine_is_config_error() {
        let yaml = r#"
suite_name: s
engine: nope
table: users
expectations: []
"#;
        let engines = engines();
        let loader = SuiteLoader::new(&engines);
        let err = loader.load_str(yaml).await.unwrap_err();
        assert!(matches!(err, ValidationError::ConfigError(_)));
    }
}
