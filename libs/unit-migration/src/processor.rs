// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Unit processing logic
//!
//! Claims a unit, resolves its items through the lookup collaborator and
//! transfers them through a bounded pool of item executors. A unit ends
//! `failed` only when its lookup fails; individual item failures are kept
//! on the item records and summarized on the unit, which still completes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};

use crate::context::RunContext;
use crate::executor::{ItemReport, ItemTransferExecutor};
use crate::metrics;
use crate::naming;
use crate::retry::{RetryAction, retry_with_backoff};
use crate::state::{
    ItemDescriptor, ItemOutcome, ItemStatus, StateError, TransitionFields, UnitStatus,
};
use crate::stores::{ItemEntry, LookupError, UnitRef};

/// Failed item names listed in a unit's error summary
const SUMMARY_NAMES: usize = 5;

/// Statuses a unit may be claimed from. `in_progress` is included because a
/// unit left in that state was interrupted by a crash or shutdown.
const CLAIMABLE: [UnitStatus; 3] = [
    UnitStatus::Pending,
    UnitStatus::Failed,
    UnitStatus::InProgress,
];

/// Item counters for one processed unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitStats {
    pub items_total: u64,
    /// Written during this run
    pub transferred: u64,
    /// Found already present in the target during this run
    pub already_present: u64,
    /// Recorded completed by an earlier run and not dispatched again
    pub previously_completed: u64,
    pub failed: u64,
    pub bytes: u64,
}

/// How processing a unit ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Every item reached a terminal state; some may have failed
    Completed(UnitStats),
    /// The item lookup failed
    Failed { error: String },
    /// The store already had the unit completed
    Skipped,
    /// Shutdown was requested before all items were dispatched
    Interrupted,
}

impl UnitOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Failed { .. } => "failed",
            Self::Skipped => "skipped",
            Self::Interrupted => "interrupted",
        }
    }
}

#[derive(Default)]
struct ItemTally {
    transferred: u64,
    already_present: u64,
    bytes: u64,
    failed: Vec<String>,
}

impl ItemTally {
    fn record(&mut self, filename: String, report: &ItemReport) {
        match report {
            ItemReport::Transferred { bytes, .. } => {
                self.transferred += 1;
                self.bytes += bytes;
            }
            ItemReport::AlreadyPresent => self.already_present += 1,
            ItemReport::Failed { .. } => self.failed.push(filename),
        }
    }
}

type ItemResult = (String, Result<ItemReport, StateError>);

/// Build the unit-level error summary from the names of failed items.
pub fn failure_summary(failed: &[String]) -> Option<String> {
    if failed.is_empty() {
        return None;
    }
    let mut names: Vec<&str> = failed.iter().map(String::as_str).collect();
    names.sort_unstable();
    let shown = names[..names.len().min(SUMMARY_NAMES)].join(", ");
    let more = names.len().saturating_sub(SUMMARY_NAMES);
    Some(if more > 0 {
        format!("{} items failed: {} and {} more", names.len(), shown, more)
    } else {
        format!("{} items failed: {}", names.len(), shown)
    })
}

/// Turn lookup results into item descriptors with target names of at most
/// `max_name_len` bytes, dropping entries whose target name collides with an
/// earlier one. Returns the number dropped.
pub fn descriptors(
    unit: &UnitRef,
    entries: Vec<ItemEntry>,
    max_name_len: usize,
) -> (Vec<ItemDescriptor>, usize) {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut items = Vec::with_capacity(entries.len());
    let mut duplicates = 0;

    for entry in entries {
        let target_name = naming::target_name(&unit.unit_id, &entry.filename, max_name_len);
        if !seen.insert(target_name.clone()) {
            duplicates += 1;
            continue;
        }
        items.push(ItemDescriptor {
            unit_id: unit.unit_id.clone(),
            group_id: unit.group_id.clone(),
            filename: entry.filename,
            source_locator: entry.source_locator,
            target_name,
        });
    }

    (items, duplicates)
}

/// Runs the per-unit protocol against a [`RunContext`]
pub struct UnitProcessor {
    ctx: RunContext,
    executor: Arc<ItemTransferExecutor>,
}

impl UnitProcessor {
    pub fn new(ctx: RunContext) -> Self {
        let executor = Arc::new(ItemTransferExecutor::new(ctx.clone()));
        Self { ctx, executor }
    }

    /// Process one unit to a terminal status.
    ///
    /// Returns an error only for state store failures, which are fatal to
    /// the whole run.
    pub async fn process(&self, unit: &UnitRef) -> Result<UnitOutcome, StateError> {
        let started = Instant::now();
        let outcome = self.run_unit(unit).await?;
        metrics::record_unit(outcome.label(), started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    async fn run_unit(&self, unit: &UnitRef) -> Result<UnitOutcome, StateError> {
        let store = &self.ctx.store;
        let unit_id = unit.unit_id.as_str();

        let claimed = store
            .transition_unit(
                unit_id,
                &CLAIMABLE,
                UnitStatus::InProgress,
                TransitionFields::default(),
            )
            .await?;
        if !claimed {
            tracing::info!(unit_id = %unit_id, "Unit already completed, skipping");
            return Ok(UnitOutcome::Skipped);
        }

        if self.ctx.cancel.is_cancelled() {
            return Ok(UnitOutcome::Interrupted);
        }

        let entries = match self.lookup(unit).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    unit_id = %unit_id,
                    group_id = %unit.group_id,
                    error = %e,
                    "Item lookup failed, marking unit failed"
                );
                let error = e.to_string();
                store
                    .transition_unit(
                        unit_id,
                        &[UnitStatus::InProgress],
                        UnitStatus::Failed,
                        TransitionFields::error(error.clone()),
                    )
                    .await?;
                return Ok(UnitOutcome::Failed { error });
            }
        };

        let (items, duplicates) = descriptors(unit, entries, self.ctx.target.max_name_len());
        if duplicates > 0 {
            tracing::warn!(
                unit_id = %unit_id,
                duplicates,
                "Lookup returned items with colliding target names, keeping the first"
            );
        }
        store.upsert_items(&items).await?;
        let items_total = store.record_items_total(unit_id).await?;

        let records = store.get_items(unit_id).await?;
        let previously_completed = records
            .iter()
            .filter(|r| r.status == ItemStatus::Completed)
            .count() as u64;
        let pending: Vec<ItemDescriptor> = records
            .into_iter()
            .filter(|r| r.status != ItemStatus::Completed)
            .map(|r| ItemDescriptor {
                unit_id: r.unit_id,
                group_id: r.group_id,
                filename: r.filename,
                source_locator: r.source_locator,
                target_name: r.target_name,
            })
            .collect();

        tracing::info!(
            unit_id = %unit_id,
            items_total,
            to_transfer = pending.len(),
            previously_completed,
            "Starting to process unit"
        );

        let (tally, interrupted) = self.transfer_all(pending).await?;

        if interrupted {
            tracing::info!(
                unit_id = %unit_id,
                "Shutdown requested, leaving unit in progress"
            );
            return Ok(UnitOutcome::Interrupted);
        }

        let summary = failure_summary(&tally.failed);
        let applied = store
            .transition_unit(
                unit_id,
                &[UnitStatus::InProgress],
                UnitStatus::Completed,
                TransitionFields {
                    error_message: summary.clone(),
                },
            )
            .await?;
        if !applied {
            tracing::warn!(
                unit_id = %unit_id,
                "Unit changed state while processing; completion not recorded"
            );
        }

        let stats = UnitStats {
            items_total,
            transferred: tally.transferred,
            already_present: tally.already_present,
            previously_completed,
            failed: tally.failed.len() as u64,
            bytes: tally.bytes,
        };
        tracing::info!(
            unit_id = %unit_id,
            items_total,
            transferred = stats.transferred,
            already_present = stats.already_present,
            failed = stats.failed,
            "Unit processing complete"
        );

        Ok(UnitOutcome::Completed(stats))
    }

    async fn lookup(&self, unit: &UnitRef) -> Result<Vec<ItemEntry>, LookupError> {
        let lookup = &self.ctx.lookup;
        retry_with_backoff(
            &self.ctx.retry,
            "lookup",
            |e: &LookupError| {
                if e.is_transient() {
                    RetryAction::Retry
                } else {
                    RetryAction::Abort
                }
            },
            move || lookup.items(unit),
        )
        .await
    }

    /// Transfer `items` with at most `item_concurrency` in flight.
    ///
    /// Returns the tally and whether dispatch stopped early on shutdown.
    async fn transfer_all(
        &self,
        items: Vec<ItemDescriptor>,
    ) -> Result<(ItemTally, bool), StateError> {
        let semaphore = Arc::new(Semaphore::new(self.ctx.item_concurrency));
        let mut tasks: JoinSet<ItemResult> = JoinSet::new();
        let mut in_flight: HashMap<Id, (String, String)> = HashMap::new();
        let mut tally = ItemTally::default();
        let mut fatal: Option<StateError> = None;
        let mut interrupted = false;

        for item in items {
            let permit = loop {
                tokio::select! {
                    biased;

                    _ = self.ctx.cancel.cancelled() => {
                        interrupted = true;
                        break None;
                    }

                    // Reap finished transfers while waiting for a free slot
                    Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                        self.reap(joined, &mut in_flight, &mut tally, &mut fatal).await;
                        if fatal.is_some() {
                            break None;
                        }
                    }

                    permit = Arc::clone(&semaphore).acquire_owned() => break permit.ok(),
                }
            };
            let Some(permit) = permit else {
                break;
            };

            let executor = Arc::clone(&self.executor);
            let key = (item.unit_id.clone(), item.filename.clone());
            let handle = tasks.spawn(async move {
                let _permit = permit;
                let result = executor.transfer(&item).await;
                (item.filename, result)
            });
            in_flight.insert(handle.id(), key);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            self.reap(joined, &mut in_flight, &mut tally, &mut fatal).await;
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok((tally, interrupted)),
        }
    }

    async fn reap(
        &self,
        joined: Result<(Id, ItemResult), JoinError>,
        in_flight: &mut HashMap<Id, (String, String)>,
        tally: &mut ItemTally,
        fatal: &mut Option<StateError>,
    ) {
        match joined {
            Ok((id, (filename, result))) => {
                in_flight.remove(&id);
                match result {
                    Ok(report) => tally.record(filename, &report),
                    Err(e) => {
                        tracing::error!(filename = %filename, error = %e, "State store failure");
                        fatal.get_or_insert(e);
                    }
                }
            }
            Err(e) => {
                let Some((unit_id, filename)) = in_flight.remove(&e.id()) else {
                    tracing::error!(error = %e, "Untracked transfer task failed");
                    return;
                };
                tracing::error!(
                    unit_id = %unit_id,
                    filename = %filename,
                    error = %e,
                    "Transfer task panicked"
                );
                metrics::record_item_failed("panic");
                let outcome = ItemOutcome::Failed {
                    error: format!("transfer task failed: {e}"),
                };
                if let Err(store_err) = self
                    .ctx
                    .store
                    .mark_item(&unit_id, &filename, &outcome)
                    .await
                {
                    fatal.get_or_insert(store_err);
                }
                tally.failed.push(filename);
            }
        }
    }
}
