// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Infrastructure layer: concrete adapters for the domain's `Engine` and
//! `ResultStore` ports, plus the process-wide concerns (configuration,
//! logging, metrics, pooling) those adapters and `main` depend on.

pub mod adapters;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod repositories;
