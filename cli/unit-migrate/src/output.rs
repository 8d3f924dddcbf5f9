// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Table output formatting

use comfy_table::{Table, presets::NOTHING};
use unit_migration::RunSummary;
use unit_migration::state::StoreAggregate;

/// Create a new table with headers
pub fn create_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(headers);
    table
}

pub fn print_table(table: Table) {
    println!("{table}");
}

/// Unit and item counts by status
pub fn aggregate_table(aggregate: &StoreAggregate) -> Table {
    let mut table = create_table(&["KIND", "PENDING", "IN_PROGRESS", "COMPLETED", "FAILED", "TOTAL"]);
    let units = &aggregate.units;
    table.add_row(vec![
        "units".to_string(),
        units.pending.to_string(),
        units.in_progress.to_string(),
        units.completed.to_string(),
        units.failed.to_string(),
        units.total().to_string(),
    ]);
    let items = &aggregate.items;
    table.add_row(vec![
        "items".to_string(),
        items.pending.to_string(),
        "-".to_string(),
        items.completed.to_string(),
        items.failed.to_string(),
        items.total().to_string(),
    ]);
    table
}

/// Per-run counters, one per row
pub fn summary_table(summary: &RunSummary) -> Table {
    let mut table = create_table(&["RUN", "COUNT"]);
    let rows: [(&str, u64); 15] = [
        ("input units", summary.input_units as u64),
        ("duplicates", summary.duplicates as u64),
        ("other partitions", summary.partition_excluded as u64),
        ("already completed", summary.resume_excluded as u64),
        ("dispatched", summary.dispatched as u64),
        ("completed", summary.completed as u64),
        ("failed", summary.failed as u64),
        ("skipped", summary.skipped as u64),
        ("interrupted", summary.interrupted as u64),
        ("not started", summary.not_started as u64),
        ("items transferred", summary.items_transferred),
        ("items already present", summary.items_already_present),
        ("items previously completed", summary.items_previously_completed),
        ("items failed", summary.items_failed),
        ("bytes written", summary.bytes),
    ];
    for (name, count) in rows {
        table.add_row(vec![name.to_string(), count.to_string()]);
    }
    table
}
