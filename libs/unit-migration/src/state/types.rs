// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Records stored in and returned by the state store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Unit lifecycle status
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl UnitStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Item lifecycle status
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// A persisted unit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub unit_id: String,
    pub group_id: String,
    pub status: UnitStatus,
    /// Unknown until the item lookup has completed
    pub items_total: Option<u64>,
    pub items_processed: u64,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A persisted item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub unit_id: String,
    pub group_id: String,
    pub filename: String,
    pub source_locator: String,
    pub target_name: String,
    pub status: ItemStatus,
    pub error_message: Option<String>,
    pub bytes: Option<u64>,
    /// Base64 MD5 of the written content
    pub content_md5: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One item to transfer, as seeded into the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemDescriptor {
    pub unit_id: String,
    pub group_id: String,
    pub filename: String,
    pub source_locator: String,
    pub target_name: String,
}

/// Auxiliary fields written alongside a unit transition
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionFields {
    /// Replaces the stored message; `None` clears it
    pub error_message: Option<String>,
}

impl TransitionFields {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
        }
    }
}

/// Terminal result recorded for an item
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    Completed {
        bytes: Option<u64>,
        content_md5: Option<String>,
    },
    Failed {
        error: String,
    },
}

impl ItemOutcome {
    pub fn status(&self) -> ItemStatus {
        match self {
            Self::Completed { .. } => ItemStatus::Completed,
            Self::Failed { .. } => ItemStatus::Failed,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitFilter {
    pub status: Option<UnitStatus>,
    pub group_id: Option<String>,
}

impl UnitFilter {
    pub fn with_status(status: UnitStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub unit_id: Option<String>,
    pub status: Option<ItemStatus>,
}

/// Units per status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub failed: u64,
}

impl UnitCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.in_progress + self.completed + self.failed
    }

    pub(crate) fn add(&mut self, status: UnitStatus, n: u64) {
        match status {
            UnitStatus::Pending => self.pending += n,
            UnitStatus::InProgress => self.in_progress += n,
            UnitStatus::Completed => self.completed += n,
            UnitStatus::Failed => self.failed += n,
        }
    }
}

/// Items per status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCounts {
    pub pending: u64,
    pub completed: u64,
    pub failed: u64,
}

impl ItemCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.completed + self.failed
    }

    pub(crate) fn add(&mut self, status: ItemStatus, n: u64) {
        match status {
            ItemStatus::Pending => self.pending += n,
            ItemStatus::Completed => self.completed += n,
            ItemStatus::Failed => self.failed += n,
        }
    }
}

/// Store-wide counts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreAggregate {
    pub units: UnitCounts,
    pub items: ItemCounts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_strings_are_snake_case() {
        assert_eq!(UnitStatus::InProgress.to_string(), "in_progress");
        assert_eq!(UnitStatus::InProgress.as_str(), "in_progress");
        assert_eq!(
            UnitStatus::from_str("completed").unwrap(),
            UnitStatus::Completed
        );
        assert!(UnitStatus::from_str("done").is_err());
        assert_eq!(ItemStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn terminal_statuses() {
        assert!(UnitStatus::Completed.is_terminal());
        assert!(UnitStatus::Failed.is_terminal());
        assert!(!UnitStatus::Pending.is_terminal());
        assert!(!UnitStatus::InProgress.is_terminal());
    }
}
