// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Pre-flight resume filtering
//!
//! Only `completed` units are excluded. `failed` units are retried and
//! `in_progress` units are re-dispatched because after a crash their true
//! state is unknown.

use std::collections::HashSet;

use crate::state::{StateError, StateStore, UnitFilter, UnitStatus};
use crate::stores::UnitRef;

/// Identifiers of every unit the store records as completed.
pub async fn completed_unit_ids(store: &dyn StateStore) -> Result<HashSet<String>, StateError> {
    let completed = store
        .query_units(&UnitFilter::with_status(UnitStatus::Completed))
        .await?;
    Ok(completed.into_iter().map(|u| u.unit_id).collect())
}

/// Drop units already completed in `store`, preserving input order.
///
/// Returns the remaining units and how many were dropped.
pub async fn exclude_completed(
    store: &dyn StateStore,
    units: Vec<UnitRef>,
) -> Result<(Vec<UnitRef>, usize), StateError> {
    let completed = completed_unit_ids(store).await?;
    let before = units.len();
    let remaining: Vec<UnitRef> = units
        .into_iter()
        .filter(|u| !completed.contains(&u.unit_id))
        .collect();
    let excluded = before - remaining.len();
    Ok((remaining, excluded))
}

/// Rebuild a dispatch list from the store alone: every unit not completed.
pub async fn units_from_store(store: &dyn StateStore) -> Result<Vec<UnitRef>, StateError> {
    let units = store.query_units(&UnitFilter::default()).await?;
    Ok(units
        .into_iter()
        .filter(|u| u.status != UnitStatus::Completed)
        .map(|u| UnitRef {
            group_id: u.group_id,
            unit_id: u.unit_id,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SqliteStateStore, TransitionFields};

    async fn store_with_abc() -> SqliteStateStore {
        let store = SqliteStateStore::open_in_memory().unwrap();
        store
            .upsert_units(&[
                UnitRef::new("G1", "A"),
                UnitRef::new("G1", "B"),
                UnitRef::new("G2", "C"),
            ])
            .await
            .unwrap();
        for (id, status) in [
            ("A", UnitStatus::Completed),
            ("B", UnitStatus::Failed),
            ("C", UnitStatus::InProgress),
        ] {
            store
                .transition_unit(id, &[UnitStatus::Pending], status, TransitionFields::default())
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_exclude_completed_keeps_failed_and_in_progress() {
        let store = store_with_abc().await;
        let input = vec![
            UnitRef::new("G1", "A"),
            UnitRef::new("G1", "B"),
            UnitRef::new("G2", "C"),
            UnitRef::new("G3", "D"),
        ];
        let (remaining, excluded) = exclude_completed(&store, input).await.unwrap();
        let ids: Vec<&str> = remaining.iter().map(|u| u.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C", "D"]);
        assert_eq!(excluded, 1);
    }

    #[tokio::test]
    async fn test_units_from_store() {
        let store = store_with_abc().await;
        let units = units_from_store(&store).await.unwrap();
        assert_eq!(
            units,
            vec![UnitRef::new("G1", "B"), UnitRef::new("G2", "C")]
        );
    }
}
