// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Subcommand implementations

use std::path::Path;

use anyhow::{Context, Result, bail};
use unit_migration::SqliteStateStore;

pub mod filter;
pub mod run;
pub mod status;
pub mod validate;

/// How a command that ran to the end went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Finished, but some units failed or objects are missing
    Failures,
}

/// Open a state database that a previous run created.
pub fn open_existing_store(path: &Path) -> Result<SqliteStateStore> {
    if !path.exists() {
        bail!("state database {} does not exist", path.display());
    }
    SqliteStateStore::open(path)
        .with_context(|| format!("failed to open state database {}", path.display()))
}
