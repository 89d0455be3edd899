// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A flat-file [`ResultStore`] writing the layout spec.md §6 describes for
//! deployments with no warehouse to write into: one JSON document per run
//! under `runs/`, one append-only JSONL file of results per run under
//! `results/`, and the same for per-run statistics. There is no cross-run
//! index file — `load_recent_stats` lists `statistics/` and reads each file,
//! which is adequate for the append-then-archive pattern this store targets
//! but not for a deployment accumulating thousands of runs (see
//! `DuckDbResultStore` for that case).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use validex_domain::error::Result;
use validex_domain::result::ValidationResult;
use validex_domain::run::RunMetadata;
use validex_domain::scalar::Scalar;
use validex_domain::store::{ResultStore, StatRow};

pub struct FileArtifactResultStore {
    root: PathBuf,
}

impl FileArtifactResultStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in ["runs", "results", "slas", "statistics"] {
            fs::create_dir_all(root.join(dir)).await?;
        }
        Ok(FileArtifactResultStore { root })
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    fn statistics_dir(&self) -> PathBuf {
        self.root.join("statistics")
    }
}

#[derive(Debug, serde::Serialize)]
struct StatRecord<'a> {
    table: &'a str,
    column: &'a str,
    metric_key: &'a str,
    value: &'a Scalar,
}

#[async_trait]
impl ResultStore for FileArtifactResultStore {
    async fn persist_run(&self, run: &RunMetadata, results: &[ValidationResult], sla: Option<&str>) -> Result<()> {
        let _ = sla;
        let run_path = self.runs_dir().join(format!("{}.json", run.run_id));
        fs::write(run_path, serde_json::to_vec_pretty(run)?).await?;

        let results_path = self.results_dir().join(format!("{}.jsonl", run.run_id));
        let mut file = fs::File::create(results_path).await?;
        for result in results {
            let mut line = serde_json::to_vec(result)?;
            line.push(b'\n');
            file.write_all(&line).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn persist_stats(&self, run: &RunMetadata, stats: &[StatRow]) -> Result<()> {
        if stats.is_empty() {
            return Ok(());
        }
        let path = self.statistics_dir().join(format!("{}.jsonl", run.run_id));
        let mut file = fs::File::create(path).await?;
        for stat in stats {
            let mut line = serde_json::to_vec(stat)?;
            line.push(b'\n');
            file.write_all(&line).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn load_recent_stats(&self, table: &str, column: &str, metric_key: &str, limit: usize) -> Result<Vec<Scalar>> {
        let mut dated = list_stat_files_newest_first(&self.statistics_dir()).await?;
        let mut out = Vec::new();

        for path in dated.drain(..) {
            let text = fs::read_to_string(&path).await?;
            for line in text.lines().rev() {
                if line.trim().is_empty() {
                    continue;
                }
                let row: StatRow = serde_json::from_str(line)?;
                if row.table == table && row.column == column && row.metric_key == metric_key {
                    out.push(row.value);
                    if out.len() >= limit {
                        return Ok(out);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Newest-first by file modification time — the store has no run index, so
/// history recency is approximated from the filesystem rather than tracked.
async fn list_stat_files_newest_first(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut dated = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let modified = entry.metadata().await?.modified()?;
        dated.push((modified, path));
    }
    dated.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(dated.into_iter().map(|(_, path)| path).collect())
}
