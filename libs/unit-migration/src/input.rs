// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Unit list files
//!
//! A unit list is a comma-separated file with a header row naming a unit
//! column and a group column; other columns are ignored. Quoted fields are
//! not supported, and identifiers may not contain commas.

use std::path::Path;

use thiserror::Error;

use crate::stores::UnitRef;

/// Header names accepted for the unit identifier column
pub const UNIT_COLUMNS: [&str; 4] = ["unit_id", "UnitId", "WorkItemId", "workitem_id"];

/// Header names accepted for the group identifier column
pub const GROUP_COLUMNS: [&str; 4] = ["group_id", "GroupId", "JobId", "job_id"];

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {reason}")]
    Malformed {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("identifier {0:?} cannot be written to a unit list")]
    Unrepresentable(String),
}

fn column(header: &[&str], names: &[&str]) -> Option<usize> {
    header.iter().position(|h| names.contains(h))
}

/// Parse unit list `content`. `origin` names the source in error messages.
pub fn parse_units(content: &str, origin: &str) -> Result<Vec<UnitRef>, InputError> {
    let malformed = |line: usize, reason: String| InputError::Malformed {
        path: origin.to_string(),
        line,
        reason,
    };

    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((header_line, header)) = lines.next() else {
        return Err(malformed(1, "missing header row".to_string()));
    };
    let header: Vec<&str> = header
        .trim_start_matches('\u{feff}')
        .split(',')
        .map(str::trim)
        .collect();
    let unit_idx = column(&header, &UNIT_COLUMNS).ok_or_else(|| {
        malformed(
            header_line,
            format!("no unit column (expected one of {})", UNIT_COLUMNS.join(", ")),
        )
    })?;
    let group_idx = column(&header, &GROUP_COLUMNS).ok_or_else(|| {
        malformed(
            header_line,
            format!("no group column (expected one of {})", GROUP_COLUMNS.join(", ")),
        )
    })?;
    let needed = unit_idx.max(group_idx) + 1;

    let mut units = Vec::new();
    for (line, row) in lines {
        if row.contains('"') {
            return Err(malformed(line, "quoted fields are not supported".to_string()));
        }
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        if fields.len() < needed {
            return Err(malformed(
                line,
                format!("expected at least {needed} fields, found {}", fields.len()),
            ));
        }
        let (unit_id, group_id) = (fields[unit_idx], fields[group_idx]);
        if unit_id.is_empty() || group_id.is_empty() {
            return Err(malformed(line, "empty unit or group identifier".to_string()));
        }
        units.push(UnitRef::new(group_id, unit_id));
    }

    Ok(units)
}

/// Load the unit list at `path`.
pub async fn load_units(path: &Path) -> Result<Vec<UnitRef>, InputError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| InputError::Io {
            path: path.display().to_string(),
            source,
        })?;
    parse_units(&content, &path.display().to_string())
}

/// Render `units` in the unit list format.
pub fn render_units(units: &[UnitRef]) -> Result<String, InputError> {
    let mut out = String::from("group_id,unit_id\n");
    for unit in units {
        for id in [&unit.group_id, &unit.unit_id] {
            if id.contains([',', '"', '\n', '\r']) {
                return Err(InputError::Unrepresentable(id.clone()));
            }
        }
        out.push_str(&unit.group_id);
        out.push(',');
        out.push_str(&unit.unit_id);
        out.push('\n');
    }
    Ok(out)
}

/// Write `units` to `path` in the unit list format.
pub async fn write_units(path: &Path, units: &[UnitRef]) -> Result<(), InputError> {
    let content = render_units(units)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|source| InputError::Io {
            path: path.display().to_string(),
            source,
        })
}
