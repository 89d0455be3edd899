// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Run identity and metadata.
//!
//! A [`RunId`] is assigned once, at the start of [`crate::runner`]-equivalent
//! dispatch, and flows unchanged into every [`crate::result::ValidationResult`]
//! produced by that call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Ulid);

impl RunId {
    pub fn new() -> Self {
        RunId(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        RunId(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Complete,
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Complete => "COMPLETE",
            RunStatus::Aborted => "ABORTED",
        };
        write!(f, "{s}")
    }
}

/// Metadata for one run of a suite. `run_id` flows into every
/// [`crate::result::ValidationResult`] produced while the run is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: RunId,
    pub suite_name: String,
    pub sla_name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
}

impl RunMetadata {
    pub fn start(suite_name: impl Into<String>, sla_name: Option<String>) -> Self {
        RunMetadata {
            run_id: RunId::new(),
            suite_name: suite_name.into(),
            sla_name,
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
        }
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.finished_at = Some(Utc::now());
        self.status = status;
    }
}
