// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! DDL for the reference DuckDB-backed result store (spec.md §6's
//! "Persisted result schema (reference store)").

pub const CREATE_SLAS: &str = "\
CREATE TABLE IF NOT EXISTS slas (
    sla_name VARCHAR PRIMARY KEY,
    config VARCHAR
)";

pub const CREATE_RUNS: &str = "\
CREATE TABLE IF NOT EXISTS runs (
    run_id VARCHAR PRIMARY KEY,
    suite_name VARCHAR NOT NULL,
    sla_name VARCHAR,
    started_at TIMESTAMP NOT NULL,
    finished_at TIMESTAMP,
    status VARCHAR NOT NULL
)";

pub const CREATE_RESULTS: &str = "\
CREATE TABLE IF NOT EXISTS results (
    run_id VARCHAR NOT NULL,
    binding_ix BIGINT NOT NULL,
    validator_type VARCHAR NOT NULL,
    engine VARCHAR NOT NULL,
    \"table\" VARCHAR NOT NULL,
    status VARCHAR NOT NULL,
    severity VARCHAR NOT NULL,
    metric_values VARCHAR NOT NULL,
    error_sample VARCHAR,
    error_message VARCHAR,
    started_at TIMESTAMP NOT NULL,
    duration_ms BIGINT NOT NULL
)";

pub const CREATE_STATISTICS: &str = "\
CREATE TABLE IF NOT EXISTS statistics (
    run_id VARCHAR NOT NULL,
    engine VARCHAR,
    schema VARCHAR,
    \"table\" VARCHAR NOT NULL,
    column_name VARCHAR NOT NULL,
    metric_key VARCHAR NOT NULL,
    value VARCHAR NOT NULL
)";

pub const ALL: &[&str] = &[CREATE_SLAS, CREATE_RUNS, CREATE_RESULTS, CREATE_STATISTICS];
