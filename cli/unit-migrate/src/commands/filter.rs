// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! `filter-completed`: drop completed units from a unit list

use std::path::Path;

use anyhow::Result;
use unit_migration::{input, resume};

pub async fn run(state_db: &Path, input_path: &Path, output_path: &Path) -> Result<()> {
    let store = super::open_existing_store(state_db)?;
    let units = input::load_units(input_path).await?;
    let total = units.len();

    let (remaining, completed) = resume::exclude_completed(&store, units).await?;
    input::write_units(output_path, &remaining).await?;

    println!(
        "Kept {} of {} units ({} already completed), written to {}",
        remaining.len(),
        total,
        completed,
        output_path.display()
    );
    Ok(())
}
