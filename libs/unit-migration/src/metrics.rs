// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Prometheus metrics for migration runs
//!
//! Exports:
//! - Items transferred by outcome (completed, already_present, failed)
//! - Total bytes written to the target store
//! - Transfer errors by kind
//! - Notification failures
//! - Units finished by outcome and unit processing time

use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

// Metric definitions are constant; a failure here is a programming error.
#[allow(clippy::expect_used)]
mod metrics_impl {
    use super::*;
    use lazy_static::lazy_static;

    lazy_static! {
        /// Registry for all migration metrics
        pub static ref REGISTRY: Registry = Registry::new();

        /// Items finished by outcome
        pub static ref ITEMS_TOTAL: CounterVec = CounterVec::new(
            Opts::new("unit_migration_items_total", "Items finished by outcome"),
            &["outcome"]
        ).expect("valid metric name and labels");

        /// Bytes written to the target store
        pub static ref BYTES_TOTAL: Counter = Counter::with_opts(
            Opts::new("unit_migration_bytes_total", "Total bytes written to the target")
        ).expect("valid metric name");

        /// Transfer errors by kind
        pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
            Opts::new("unit_migration_errors_total", "Transfer errors by kind"),
            &["kind"]
        ).expect("valid metric name and labels");

        /// Notifications that could not be delivered
        pub static ref NOTIFY_FAILURES: Counter = Counter::with_opts(
            Opts::new(
                "unit_migration_notify_failures_total",
                "Notifications that failed after all retries"
            )
        ).expect("valid metric name");

        /// Units finished by outcome
        pub static ref UNITS_TOTAL: CounterVec = CounterVec::new(
            Opts::new("unit_migration_units_total", "Units finished by outcome"),
            &["outcome"]
        ).expect("valid metric name and labels");

        /// Time spent processing one unit
        pub static ref UNIT_DURATION: Histogram = Histogram::with_opts(
            HistogramOpts::new(
                "unit_migration_unit_duration_seconds",
                "Unit processing time in seconds"
            )
            // Buckets: 100ms, 500ms, 1s, 5s, 10s, 30s, 1m, 5m, 10m, 30m
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0])
        ).expect("valid histogram opts");
    }
}

pub use metrics_impl::{
    BYTES_TOTAL, ERRORS_TOTAL, ITEMS_TOTAL, NOTIFY_FAILURES, REGISTRY, UNIT_DURATION, UNITS_TOTAL,
};

/// Register all metrics with the registry.
///
/// Safe to call more than once; metrics already registered are left alone.
pub fn register_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ITEMS_TOTAL.clone()),
        Box::new(BYTES_TOTAL.clone()),
        Box::new(ERRORS_TOTAL.clone()),
        Box::new(NOTIFY_FAILURES.clone()),
        Box::new(UNITS_TOTAL.clone()),
        Box::new(UNIT_DURATION.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

/// Record an item written to the target
pub fn record_item_completed(bytes: u64) {
    BYTES_TOTAL.inc_by(bytes as f64);
    ITEMS_TOTAL.with_label_values(&["completed"]).inc();
}

/// Record an item whose target object was already present
pub fn record_item_already_present() {
    ITEMS_TOTAL.with_label_values(&["already_present"]).inc();
}

/// Record a failed item
pub fn record_item_failed(kind: &str) {
    ITEMS_TOTAL.with_label_values(&["failed"]).inc();
    ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_notify_failure() {
    NOTIFY_FAILURES.inc();
}

/// Record a finished unit and how long it took
pub fn record_unit(outcome: &str, duration_secs: f64) {
    UNITS_TOTAL.with_label_values(&[outcome]).inc();
    UNIT_DURATION.observe(duration_secs);
}
