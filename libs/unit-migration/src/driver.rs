// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Pipeline driver
//!
//! Loads the unit list, keeps the units owned by this partition, seeds the
//! state store, drops units already completed when resuming, and runs the
//! rest through a bounded pool of unit processors. Every spawned task has
//! finished by the time [`Pipeline::run`] returns.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ConfigError, MigrationConfig};
use crate::context::{Collaborators, RunContext};
use crate::processor::{UnitOutcome, UnitProcessor};
use crate::resume;
use crate::state::{StateError, StateStore, StoreAggregate};
use crate::stores::UnitRef;

/// Finished units between progress log lines
const PROGRESS_INTERVAL: usize = 10;

/// Errors that abort a run. Unit and item failures never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// What a run did, plus the store-wide counts at the end of it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Units in the input list, before any filtering
    pub input_units: usize,
    /// Repeated unit ids dropped from the input
    pub duplicates: usize,
    /// Units owned by other partitions
    pub partition_excluded: usize,
    /// Units dropped because the store already had them completed
    pub resume_excluded: usize,
    /// Units handed to a processor
    pub dispatched: usize,
    pub completed: usize,
    pub failed: usize,
    /// Units a processor found already completed
    pub skipped: usize,
    /// Units left in progress by a shutdown
    pub interrupted: usize,
    /// Units never dispatched because of a shutdown
    pub not_started: usize,
    pub items_transferred: u64,
    pub items_already_present: u64,
    pub items_previously_completed: u64,
    pub items_failed: u64,
    pub bytes: u64,
    pub store: StoreAggregate,
}

impl RunSummary {
    /// Whether any unit failed during this run.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn finished(&self) -> usize {
        self.completed + self.failed + self.skipped + self.interrupted
    }

    fn record(&mut self, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::Completed(stats) => {
                self.completed += 1;
                self.items_transferred += stats.transferred;
                self.items_already_present += stats.already_present;
                self.items_previously_completed += stats.previously_completed;
                self.items_failed += stats.failed;
                self.bytes += stats.bytes;
            }
            UnitOutcome::Failed { .. } => self.failed += 1,
            UnitOutcome::Skipped => self.skipped += 1,
            UnitOutcome::Interrupted => self.interrupted += 1,
        }
    }
}

type UnitResult = (String, Result<UnitOutcome, StateError>);

/// Top-level driver owning the unit pool and, through the processors, the
/// item pools
pub struct Pipeline {
    config: MigrationConfig,
    ctx: RunContext,
}

impl Pipeline {
    /// Validate `config` and wire the run context. Nothing is dispatched
    /// until [`Pipeline::run`].
    pub fn new(
        config: MigrationConfig,
        collaborators: Collaborators,
        store: Arc<dyn StateStore>,
        cancel: CancellationToken,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let ctx = RunContext::new(&config, collaborators, store, cancel);
        Ok(Self { config, ctx })
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Resume from the store alone, re-dispatching every unit not completed.
    pub async fn resume_from_store(&self) -> Result<RunSummary, PipelineError> {
        let units = resume::units_from_store(self.ctx.store.as_ref()).await?;
        info!(units = units.len(), "Rebuilt unit list from state store");
        self.run(units).await
    }

    /// Run the pipeline over `units`.
    pub async fn run(&self, units: Vec<UnitRef>) -> Result<RunSummary, PipelineError> {
        let store = self.ctx.store.as_ref();
        let mut summary = RunSummary {
            input_units: units.len(),
            ..Default::default()
        };

        let mut seen = HashSet::with_capacity(units.len());
        let mut units: Vec<UnitRef> = units
            .into_iter()
            .filter(|u| seen.insert(u.unit_id.clone()))
            .collect();
        summary.duplicates = summary.input_units - units.len();
        if summary.duplicates > 0 {
            warn!(
                duplicates = summary.duplicates,
                "Duplicate unit ids in input, keeping first occurrence"
            );
        }

        if let Some(partition) = &self.config.partition {
            let before = units.len();
            units.retain(|u| partition.contains(&u.unit_id));
            summary.partition_excluded = before - units.len();
            info!(
                partition = %partition,
                owned = units.len(),
                excluded = summary.partition_excluded,
                "Applied partition filter"
            );
        }

        let seeded = store.upsert_units(&units).await?;
        info!(units = units.len(), newly_seeded = seeded, "Seeded state store");

        if self.config.resume {
            let (remaining, excluded) = resume::exclude_completed(store, units).await?;
            units = remaining;
            summary.resume_excluded = excluded;
            info!(
                remaining = units.len(),
                already_completed = excluded,
                "Resume: skipping completed units"
            );
        }

        info!(
            units = units.len(),
            unit_workers = self.config.unit_concurrency,
            item_workers = self.config.item_concurrency,
            notify = self.ctx.notifier.is_some(),
            "Starting migration"
        );

        let fatal = self.dispatch(units, &mut summary).await;

        summary.store = store.aggregate().await?;
        if let Some(e) = fatal {
            error!(error = %e, "Run aborted by state store failure");
            return Err(PipelineError::State(e));
        }

        info!(
            dispatched = summary.dispatched,
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            interrupted = summary.interrupted,
            not_started = summary.not_started,
            "Migration finished"
        );
        Ok(summary)
    }

    /// Run units through the outer pool. Returns the first fatal state error.
    async fn dispatch(
        &self,
        units: Vec<UnitRef>,
        summary: &mut RunSummary,
    ) -> Option<StateError> {
        // A child token lets a fatal error stop this run's processors
        // without cancelling the caller's token.
        let run_cancel = self.ctx.cancel.child_token();
        let mut ctx = self.ctx.clone();
        ctx.cancel = run_cancel.clone();
        let processor = Arc::new(UnitProcessor::new(ctx));

        let total = units.len();
        let semaphore = Arc::new(Semaphore::new(self.config.unit_concurrency));
        let mut tasks: JoinSet<UnitResult> = JoinSet::new();
        let mut in_flight: HashMap<Id, String> = HashMap::new();
        let mut fatal: Option<StateError> = None;

        let mut queue = units.into_iter();
        while let Some(unit) = queue.next() {
            let permit = loop {
                tokio::select! {
                    biased;

                    _ = run_cancel.cancelled() => break None,

                    Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                        Self::reap(joined, &mut in_flight, summary, &mut fatal, total);
                        if fatal.is_some() {
                            run_cancel.cancel();
                        }
                    }

                    permit = Arc::clone(&semaphore).acquire_owned() => break permit.ok(),
                }
            };
            let Some(permit) = permit else {
                summary.not_started = 1 + queue.len();
                info!(
                    not_started = summary.not_started,
                    "Stopping dispatch, waiting for in-flight units"
                );
                break;
            };

            summary.dispatched += 1;
            let processor = Arc::clone(&processor);
            let unit_id = unit.unit_id.clone();
            let handle = tasks.spawn(async move {
                let _permit = permit;
                let result = processor.process(&unit).await;
                (unit.unit_id, result)
            });
            in_flight.insert(handle.id(), unit_id);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            Self::reap(joined, &mut in_flight, summary, &mut fatal, total);
            if fatal.is_some() {
                run_cancel.cancel();
            }
        }

        fatal
    }

    fn reap(
        joined: Result<(Id, UnitResult), JoinError>,
        in_flight: &mut HashMap<Id, String>,
        summary: &mut RunSummary,
        fatal: &mut Option<StateError>,
        total: usize,
    ) {
        match joined {
            Ok((id, (unit_id, result))) => {
                in_flight.remove(&id);
                match result {
                    Ok(outcome) => {
                        summary.record(&outcome);
                        let done = summary.finished();
                        if done % PROGRESS_INTERVAL == 0 || done == total {
                            info!(
                                done,
                                total,
                                completed = summary.completed,
                                failed = summary.failed,
                                skipped = summary.skipped,
                                "Progress"
                            );
                        }
                    }
                    Err(e) => {
                        error!(unit_id = %unit_id, error = %e, "State store failure");
                        fatal.get_or_insert(e);
                    }
                }
            }
            Err(e) => {
                // The unit stays in_progress in the store and is picked up
                // by the next resumed run.
                let unit_id = in_flight.remove(&e.id()).unwrap_or_default();
                error!(unit_id = %unit_id, error = %e, "Unit processor task panicked");
                summary.interrupted += 1;
            }
        }
    }
}
