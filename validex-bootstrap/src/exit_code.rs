// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Codes
//!
//! Maps application outcomes to Unix-style exit codes following the BSD
//! `sysexits.h` convention, so scripts invoking `validex` in a CI pipeline
//! can distinguish "suite failed" from "validex itself couldn't run" without
//! parsing stderr.

use std::process::ExitCode as StdExitCode;

/// A `sysexits.h`-flavored process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Everything ran and every Fail-severity expectation passed.
    Ok = 0,
    /// At least one Fail-severity expectation did not pass.
    ExpectationsFailed = 1,
    /// Command-line usage error.
    Usage = 64,
    /// Input data (suite file) was incorrect.
    DataErr = 65,
    /// Input file did not exist or was not readable.
    NoInput = 66,
    /// A required service (engine, result store) was unreachable.
    Unavailable = 69,
    /// Internal software error (a bug, not a configuration problem).
    Software = 70,
    /// Operation timed out or was cancelled.
    Temporary = 75,
}

impl From<ExitCode> for StdExitCode {
    fn from(code: ExitCode) -> Self {
        StdExitCode::from(code as u8)
    }
}

/// Maps an application error to an exit code by inspecting its message for
/// the category tags `validex-domain`'s `ValidationError::category()`
/// produces (`"config"`, `"engine"`, `"timeout"`, `"cancellation"`, ...).
/// Bootstrap has no dependency on the domain crate, so this is a best-effort
/// text match rather than a `match` over the concrete error type.
pub fn map_error_to_exit_code(err: &anyhow::Error) -> ExitCode {
    let chain: Vec<String> = err.chain().map(|e| e.to_string()).collect();
    let text = chain.join(": ");

    if text.contains("suite configuration error") {
        ExitCode::DataErr
    } else if text.contains("timed out") {
        ExitCode::Temporary
    } else if text.contains("cancelled") {
        ExitCode::Temporary
    } else if text.contains("engine error") {
        ExitCode::Unavailable
    } else if text.contains("No such file") || text.contains("path does not exist") {
        ExitCode::NoInput
    } else {
        ExitCode::Software
    }
}

/// Converts a top-level `Result` into a process exit code: `Ok(true)` (all
/// expectations passed) maps to [`ExitCode::Ok`], `Ok(false)` (at least one
/// Fail-severity expectation did not pass) to [`ExitCode::ExpectationsFailed`],
/// and `Err` through [`map_error_to_exit_code`].
pub fn result_to_exit_code(result: anyhow::Result<bool>) -> StdExitCode {
    match result {
        Ok(true) => ExitCode::Ok.into(),
        Ok(false) => ExitCode::ExpectationsFailed.into(),
        Err(err) => {
            tracing::error!("{err:?}");
            map_error_to_exit_code(&err).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_data_err() {
        let err = anyhow::anyhow!("suite configuration error: unknown expectation type 'Bogus'");
        assert_eq!(map_error_to_exit_code(&err), ExitCode::DataErr);
    }

    #[test]
    fn unrecognized_errors_map_to_software() {
        let err = anyhow::anyhow!("something unexpected happened");
        assert_eq!(map_error_to_exit_code(&err), ExitCode::Software);
    }

    #[test]
    fn all_pass_maps_to_ok() {
        let code: StdExitCode = result_to_exit_code(Ok(true));
        assert_eq!(format!("{code:?}"), format!("{:?}", StdExitCode::from(ExitCode::Ok)));
    }
}
