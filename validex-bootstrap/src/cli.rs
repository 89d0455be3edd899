// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling with security-first design.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. Cli::parse()                    │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validate_cli()                  │  Security validation
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(name = "validex", version, about = "A data-quality validation engine", long_about = None)]
pub struct Cli {
    /// Emit debug-level logs in addition to info.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Layered application configuration file (TOML/YAML/JSON; see
    /// `infrastructure::config`). Overrides defaults, overridden by env vars.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Render results as JSON instead of the console table.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run every expectation suite bound in the given suite file against its
    /// configured engines and tables.
    Run {
        /// Path to a YAML suite file (spec.md §7.1).
        suite: PathBuf,

        /// Run only the named SLA group; runs every SLA when omitted.
        #[arg(long)]
        sla: Option<String>,

        /// Per-binding timeout in seconds; no timeout when omitted.
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Exit non-zero if any Fail-severity result fails (the default);
        /// pass to report results without affecting the process exit code.
        #[arg(long)]
        no_fail_exit: bool,
    },

    /// Parse and statically validate a suite file (unknown expectation
    /// types, missing columns against a live engine) without running it.
    Validate {
        /// Path to a YAML suite file.
        suite: PathBuf,
    },

    /// List the engines a suite file declares and confirm each is reachable.
    Engines {
        /// Path to a YAML suite file.
        suite: PathBuf,
    },
}

/// Validated CLI configuration: every path checked for traversal and
/// existence (where applicable) before the application layer ever sees it.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub verbose: bool,
    pub config: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Run { suite: PathBuf, sla: Option<String>, timeout_secs: Option<u64>, no_fail_exit: bool },
    Validate { suite: PathBuf },
    Engines { suite: PathBuf },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid value for --{arg}: {reason}")]
    InvalidValue { arg: String, reason: String },

    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("path contains a disallowed traversal component: {0}")]
    PathTraversal(PathBuf),
}

/// Minimal path hardening: rejects `..` components so a suite file can't be
/// used to smuggle reads of arbitrary filesystem paths relative to a web- or
/// service-triggered invocation of the CLI, then confirms the file exists.
pub struct SecureArgParser;

impl SecureArgParser {
    pub fn validate_path(raw: &str) -> Result<PathBuf, ParseError> {
        let path = Self::validate_argument(raw)?;
        if !path.exists() {
            return Err(ParseError::PathNotFound(path));
        }
        Ok(path)
    }

    pub fn validate_argument(raw: &str) -> Result<PathBuf, ParseError> {
        let path = PathBuf::from(raw);
        if path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Err(ParseError::PathTraversal(path));
        }
        Ok(path)
    }
}

fn validate_suite_path(path: &Path) -> Result<PathBuf, ParseError> {
    SecureArgParser::validate_path(&path.to_string_lossy())
}

/// Parses `argv` and applies security validation, combining both steps the
/// way the bootstrap layer is expected to before handing control to the
/// application layer.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let cli = Cli::parse();
    validate_cli(cli)
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let config = match &cli.config {
        Some(path) => Some(SecureArgParser::validate_path(&path.to_string_lossy())?),
        None => None,
    };

    let command = match cli.command {
        Commands::Run { suite, sla, timeout_secs, no_fail_exit } => {
            let suite = validate_suite_path(&suite)?;
            ValidatedCommand::Run { suite, sla, timeout_secs, no_fail_exit }
        }
        Commands::Validate { suite } => ValidatedCommand::Validate { suite: validate_suite_path(&suite)? },
        Commands::Engines { suite } => ValidatedCommand::Engines { suite: validate_suite_path(&suite)? },
    };

    Ok(ValidatedCli { command, verbose: cli.verbose, config, json: cli.json })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_dir_traversal() {
        let err = SecureArgParser::validate_argument("../../etc/passwd").unwrap_err();
        assert!(matches!(err, ParseError::PathTraversal(_)));
    }

    #[test]
    fn accepts_plain_relative_path() {
        let path = SecureArgParser::validate_argument("suites/nightly.yaml").unwrap();
        assert_eq!(path, PathBuf::from("suites/nightly.yaml"));
    }

    #[test]
    fn missing_file_is_rejected() {
        let err = SecureArgParser::validate_path("/definitely/not/a/real/path.yaml").unwrap_err();
        assert!(matches!(err, ParseError::PathNotFound(_)));
    }
}
