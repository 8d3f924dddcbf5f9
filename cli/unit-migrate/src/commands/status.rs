// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! `status`: counts by status, optionally the failures themselves

use std::path::Path;

use anyhow::Result;
use unit_migration::StateStore;
use unit_migration::state::{ItemFilter, ItemStatus, UnitFilter, UnitStatus};

use crate::output::{aggregate_table, create_table, print_table};

pub async fn run(state_db: &Path, failed: bool) -> Result<()> {
    let store = super::open_existing_store(state_db)?;

    let aggregate = store.aggregate().await?;
    print_table(aggregate_table(&aggregate));

    if !failed {
        return Ok(());
    }

    let units = store
        .query_units(&UnitFilter::with_status(UnitStatus::Failed))
        .await?;
    println!();
    if units.is_empty() {
        println!("No failed units.");
    } else {
        let mut table = create_table(&["GROUP_ID", "UNIT_ID", "ERROR"]);
        for unit in units {
            table.add_row(vec![
                unit.group_id,
                unit.unit_id,
                unit.error_message.unwrap_or_default(),
            ]);
        }
        print_table(table);
    }

    let items = store
        .query_items(&ItemFilter {
            unit_id: None,
            status: Some(ItemStatus::Failed),
        })
        .await?;
    println!();
    if items.is_empty() {
        println!("No failed items.");
    } else {
        let mut table = create_table(&["UNIT_ID", "FILENAME", "ERROR"]);
        for item in items {
            table.add_row(vec![
                item.unit_id,
                item.filename,
                item.error_message.unwrap_or_default(),
            ]);
        }
        print_table(table);
    }

    Ok(())
}
