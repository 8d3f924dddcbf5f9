// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Run context shared by unit processors and item executors

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::MigrationConfig;
use crate::retry::RetryPolicy;
use crate::state::StateStore;
use crate::stores::{ItemLookup, Notifier, SourceStore, TargetStore};

/// External collaborators a run is wired to
#[derive(Clone)]
pub struct Collaborators {
    pub lookup: Arc<dyn ItemLookup>,
    pub source: Arc<dyn SourceStore>,
    pub target: Arc<dyn TargetStore>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

/// Everything a unit processor or item executor needs, built once per run
#[derive(Clone)]
pub struct RunContext {
    pub store: Arc<dyn StateStore>,
    pub lookup: Arc<dyn ItemLookup>,
    pub source: Arc<dyn SourceStore>,
    pub target: Arc<dyn TargetStore>,
    /// `None` when notifications are disabled
    pub notifier: Option<Arc<dyn Notifier>>,
    pub retry: RetryPolicy,
    pub item_concurrency: usize,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        config: &MigrationConfig,
        collaborators: Collaborators,
        store: Arc<dyn StateStore>,
        cancel: CancellationToken,
    ) -> Self {
        let notifier = if config.skip_notify {
            None
        } else {
            collaborators.notifier
        };

        Self {
            store,
            lookup: collaborators.lookup,
            source: collaborators.source,
            target: collaborators.target,
            notifier,
            retry: config.retry.clone(),
            item_concurrency: config.item_concurrency.max(1),
            cancel,
        }
    }
}
