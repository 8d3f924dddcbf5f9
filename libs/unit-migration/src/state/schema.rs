// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

use rusqlite::Connection;

pub(crate) const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS units (
        unit_id TEXT PRIMARY KEY,
        group_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'in_progress', 'completed', 'failed')),
        items_total INTEGER,
        items_processed INTEGER NOT NULL DEFAULT 0,
        error_message TEXT,
        started_at TEXT,
        completed_at TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS items (
        unit_id TEXT NOT NULL,
        group_id TEXT NOT NULL,
        filename TEXT NOT NULL,
        source_locator TEXT NOT NULL,
        target_name TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'completed', 'failed')),
        error_message TEXT,
        bytes INTEGER,
        content_md5 TEXT,
        completed_at TEXT,
        PRIMARY KEY (unit_id, filename),
        FOREIGN KEY (unit_id) REFERENCES units(unit_id)
    );

    CREATE INDEX IF NOT EXISTS idx_units_status ON units(status);
    CREATE INDEX IF NOT EXISTS idx_items_status ON items(unit_id, status);
"#;

/// Create tables and indexes if they do not exist.
pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}
