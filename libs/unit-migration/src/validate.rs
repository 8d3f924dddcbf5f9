// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Post-run validation
//!
//! Checks that every item the store records as completed has its object in
//! the target store. Read-only with respect to both stores.

use std::sync::Arc;

use futures_util::StreamExt;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::state::{ItemFilter, ItemRecord, ItemStatus, StateError, StateStore};
use crate::stores::TargetStore;

/// A completed item whose target object could not be found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingObject {
    pub group_id: String,
    pub unit_id: String,
    pub filename: String,
    pub target_name: String,
}

impl From<ItemRecord> for MissingObject {
    fn from(item: ItemRecord) -> Self {
        Self {
            group_id: item.group_id,
            unit_id: item.unit_id,
            filename: item.filename,
            target_name: item.target_name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub checked: usize,
    pub found: usize,
    /// Existence probes that errored; those objects are also listed as missing
    pub probe_errors: usize,
    pub missing: Vec<MissingObject>,
}

/// Probe the target for every completed item, or a random `sample` of them,
/// with up to `workers` probes in flight.
pub async fn validate_completed(
    store: &dyn StateStore,
    target: Arc<dyn TargetStore>,
    sample: Option<usize>,
    workers: usize,
) -> Result<ValidationReport, StateError> {
    let mut items = store
        .query_items(&ItemFilter {
            unit_id: None,
            status: Some(ItemStatus::Completed),
        })
        .await?;

    if let Some(n) = sample {
        if n < items.len() {
            items.shuffle(&mut rand::rng());
            items.truncate(n);
        }
    }

    tracing::info!(items = items.len(), workers, "Validating completed items");

    let probes = futures_util::stream::iter(items)
        .map(|item| {
            let target = Arc::clone(&target);
            async move {
                let result = target.exists(&item.target_name).await;
                (item, result)
            }
        })
        .buffer_unordered(workers.max(1));
    tokio::pin!(probes);

    let mut report = ValidationReport::default();
    while let Some((item, result)) = probes.next().await {
        report.checked += 1;
        match result {
            Ok(true) => report.found += 1,
            Ok(false) => report.missing.push(item.into()),
            Err(e) => {
                tracing::warn!(
                    target_name = %item.target_name,
                    error = %e,
                    "Error checking target object"
                );
                report.probe_errors += 1;
                report.missing.push(item.into());
            }
        }
    }
    report
        .missing
        .sort_by(|a, b| (&a.unit_id, &a.filename).cmp(&(&b.unit_id, &b.filename)));

    Ok(report)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render missing objects as CSV with a header row.
pub fn render_missing(missing: &[MissingObject]) -> String {
    let mut out = String::from("group_id,unit_id,filename,target_name\n");
    for m in missing {
        let row = [&m.group_id, &m.unit_id, &m.filename, &m.target_name]
            .map(|v| csv_field(v))
            .join(",");
        out.push_str(&row);
        out.push('\n');
    }
    out
}
