// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for executed statements.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application chooses the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `paradedb_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `kind`: search, facets, indexes, index_segments, verify_index, verify_all_indexes
//! - `status`: success, error

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Record an executed statement
pub fn record_statement(kind: &str, status: &str) {
    counter!(
        "paradedb_statements_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record statement latency
pub fn record_latency(kind: &str, duration: Duration) {
    histogram!(
        "paradedb_statement_seconds",
        "kind" => kind.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record how many rows came back alongside a facet aggregate
pub fn record_facet_rows(count: usize) {
    histogram!("paradedb_facet_rows").record(count as f64);
}

/// RAII timer that records statement latency on drop
pub struct LatencyTimer {
    kind: &'static str,
    start: Instant,
}

impl LatencyTimer {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.kind, self.start.elapsed());
    }
}
