// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Prometheus-based metrics for run and binding outcomes.

pub mod endpoint;

use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use validex_domain::error::{Result, ValidationError};

/// A namespaced Prometheus registry tracking run/binding throughput.
#[derive(Clone)]
pub struct ValidexMetrics {
    registry: Registry,
    runs_total: IntCounterVec,
    bindings_total: IntCounterVec,
    batch_fusion_size: Histogram,
}

impl ValidexMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let runs_total = IntCounterVec::new(
            Opts::new("runs_total", "Total validation runs by outcome").namespace("validex"),
            &["status"],
        )
        .map_err(metrics_err)?;

        let bindings_total = IntCounterVec::new(
            Opts::new("bindings_total", "Total validator bindings evaluated by status").namespace("validex"),
            &["status"],
        )
        .map_err(metrics_err)?;

        let batch_fusion_size = Histogram::with_opts(
            HistogramOpts::new("batch_fusion_size", "Number of metric requests fused into one scan")
                .namespace("validex")
                .buckets(vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0]),
        )
        .map_err(metrics_err)?;

        registry.register(Box::new(runs_total.clone())).map_err(metrics_err)?;
        registry.register(Box::new(bindings_total.clone())).map_err(metrics_err)?;
        registry.register(Box::new(batch_fusion_size.clone())).map_err(metrics_err)?;

        Ok(ValidexMetrics { registry, runs_total, bindings_total, batch_fusion_size })
    }

    pub fn record_run(&self, status: &str) {
        self.runs_total.with_label_values(&[status]).inc();
    }

    pub fn record_binding(&self, status: &str) {
        self.bindings_total.with_label_values(&[status]).inc();
    }

    pub fn observe_batch_fusion_size(&self, request_count: usize) {
        self.batch_fusion_size.observe(request_count as f64);
    }

    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        encoder.encode_to_string(&families).map_err(metrics_err)
    }
}

fn metrics_err(e: impl std::fmt::Display) -> ValidationError {
    ValidationError::Internal(format!("metrics error: {e}"))
}
