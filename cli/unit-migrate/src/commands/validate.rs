// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! `validate`: confirm completed items exist in the target directory

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use unit_migration::fs_target::FsTargetStore;
use unit_migration::validate::{render_missing, validate_completed};

use super::Outcome;
use crate::output::{create_table, print_table};

/// Missing objects listed on the terminal before truncating
const MISSING_SHOWN: usize = 20;

pub async fn run(
    state_db: &Path,
    target_dir: &Path,
    sample: Option<usize>,
    workers: usize,
    export_missing: Option<&Path>,
) -> Result<Outcome> {
    if !target_dir.is_dir() {
        bail!("target directory {} does not exist", target_dir.display());
    }
    let store = super::open_existing_store(state_db)?;
    let target = FsTargetStore::new(target_dir).await?;

    let report = validate_completed(&store, Arc::new(target), sample, workers).await?;

    let mut table = create_table(&["CHECKED", "FOUND", "MISSING", "PROBE_ERRORS"]);
    table.add_row(vec![
        report.checked.to_string(),
        report.found.to_string(),
        report.missing.len().to_string(),
        report.probe_errors.to_string(),
    ]);
    print_table(table);

    if report.missing.is_empty() {
        return Ok(Outcome::Success);
    }

    println!();
    let mut table = create_table(&["UNIT_ID", "FILENAME", "TARGET_NAME"]);
    for m in report.missing.iter().take(MISSING_SHOWN) {
        table.add_row(vec![&m.unit_id, &m.filename, &m.target_name]);
    }
    print_table(table);
    if report.missing.len() > MISSING_SHOWN {
        println!("... and {} more", report.missing.len() - MISSING_SHOWN);
    }

    if let Some(path) = export_missing {
        tokio::fs::write(path, render_missing(&report.missing))
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Missing items written to {}", path.display());
    }

    Ok(Outcome::Failures)
}
