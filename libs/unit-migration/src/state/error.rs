// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

use thiserror::Error;

/// State store failures. Every variant is fatal to the run.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to open state store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("state store {op} failed: {source}")]
    Query {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("state store still locked after {attempts} attempts during {op}")]
    Contended { op: &'static str, attempts: u32 },

    #[error("unit not found: {0}")]
    UnitNotFound(String),
}
