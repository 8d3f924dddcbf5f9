// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Durable progress tracking
//!
//! The state store is the single source of truth for unit and item
//! progress. All mutation goes through conditional operations:
//! [`StateStore::transition_unit`] only applies when the current status is
//! in an allowed set, and [`StateStore::mark_item`] never overwrites a
//! completed item. Seeding is idempotent so a run can be repeated against
//! the same store without resetting progress.

mod error;
mod schema;
mod sqlite;
mod types;

use async_trait::async_trait;

use crate::stores::UnitRef;

pub use error::StateError;
pub use sqlite::{SqliteStateStore, StoreOptions};
pub use types::{
    ItemCounts, ItemDescriptor, ItemFilter, ItemOutcome, ItemRecord, ItemStatus, StoreAggregate,
    TransitionFields, UnitCounts, UnitFilter, UnitRecord, UnitStatus,
};

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Insert `unit` as pending unless it already exists. Returns whether a
    /// row was inserted.
    async fn upsert_unit(&self, unit: &UnitRef) -> Result<bool, StateError> {
        Ok(self.upsert_units(std::slice::from_ref(unit)).await? > 0)
    }

    /// Batch form of [`StateStore::upsert_unit`]; returns the number inserted.
    async fn upsert_units(&self, units: &[UnitRef]) -> Result<usize, StateError>;

    async fn get_unit(&self, unit_id: &str) -> Result<Option<UnitRecord>, StateError>;

    /// Move a unit to `to` if its current status is one of `from`.
    ///
    /// Entering `in_progress` stamps `started_at`; entering a terminal
    /// status stamps `completed_at`. Returns whether the transition applied.
    async fn transition_unit(
        &self,
        unit_id: &str,
        from: &[UnitStatus],
        to: UnitStatus,
        fields: TransitionFields,
    ) -> Result<bool, StateError>;

    async fn upsert_item(&self, item: &ItemDescriptor) -> Result<bool, StateError> {
        Ok(self.upsert_items(std::slice::from_ref(item)).await? > 0)
    }

    async fn upsert_items(&self, items: &[ItemDescriptor]) -> Result<usize, StateError>;

    /// Set `items_total` to the number of item rows recorded for the unit.
    async fn record_items_total(&self, unit_id: &str) -> Result<u64, StateError>;

    /// Record an item's terminal outcome and refresh the unit's
    /// `items_processed`. Completed items are never overwritten.
    async fn mark_item(
        &self,
        unit_id: &str,
        filename: &str,
        outcome: &ItemOutcome,
    ) -> Result<bool, StateError>;

    async fn get_items(&self, unit_id: &str) -> Result<Vec<ItemRecord>, StateError>;

    async fn query_units(&self, filter: &UnitFilter) -> Result<Vec<UnitRecord>, StateError>;

    async fn query_items(&self, filter: &ItemFilter) -> Result<Vec<ItemRecord>, StateError>;

    async fn aggregate(&self) -> Result<StoreAggregate, StateError>;
}
