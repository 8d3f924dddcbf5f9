// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Item transfer logic
//!
//! Reads one object from the source store, writes it to the target store
//! under its deterministic name and records the outcome. A target object
//! that already exists counts as success and is never rewritten.

use crate::context::RunContext;
use crate::metrics;
use crate::retry::{RetryAction, retry_with_backoff};
use crate::state::{ItemDescriptor, ItemOutcome, StateError};
use crate::stores::{TransferError, WriteOutcome};

/// How a single item transfer ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemReport {
    /// Content was written to the target
    Transferred { bytes: u64, md5: String },
    /// The target object already existed; nothing was written
    AlreadyPresent,
    /// The transfer failed permanently or ran out of attempts
    Failed { error: TransferError },
}

impl ItemReport {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

fn classify(e: &TransferError) -> RetryAction {
    if e.is_transient() {
        RetryAction::Retry
    } else {
        RetryAction::Abort
    }
}

/// Transfers single items using the collaborators of a [`RunContext`]
pub struct ItemTransferExecutor {
    ctx: RunContext,
}

impl ItemTransferExecutor {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    /// Transfer one item and record its outcome.
    ///
    /// Only a state store failure is returned as an error; every transfer
    /// problem ends up in the returned report and in the item record.
    pub async fn transfer(&self, item: &ItemDescriptor) -> Result<ItemReport, StateError> {
        tracing::debug!(
            unit_id = %item.unit_id,
            filename = %item.filename,
            target_name = %item.target_name,
            "Processing item"
        );

        let report = match self.copy(item).await {
            Ok(WriteOutcome::Written { bytes, md5 }) => {
                metrics::record_item_completed(bytes);
                self.notify(item).await;
                ItemReport::Transferred { bytes, md5 }
            }
            Ok(WriteOutcome::AlreadyExists) => {
                metrics::record_item_already_present();
                tracing::debug!(
                    unit_id = %item.unit_id,
                    target_name = %item.target_name,
                    "Target already exists, skipping write"
                );
                // A previous run may have written the object and died before
                // notifying, so notify again.
                self.notify(item).await;
                ItemReport::AlreadyPresent
            }
            Err(error) => {
                metrics::record_item_failed(error.kind());
                tracing::warn!(
                    unit_id = %item.unit_id,
                    filename = %item.filename,
                    kind = error.kind(),
                    error = %error,
                    "Item failed"
                );
                ItemReport::Failed { error }
            }
        };

        let outcome = match &report {
            ItemReport::Transferred { bytes, md5 } => ItemOutcome::Completed {
                bytes: Some(*bytes),
                content_md5: Some(md5.clone()),
            },
            ItemReport::AlreadyPresent => ItemOutcome::Completed {
                bytes: None,
                content_md5: None,
            },
            ItemReport::Failed { error } => ItemOutcome::Failed {
                error: error.to_string(),
            },
        };
        self.ctx
            .store
            .mark_item(&item.unit_id, &item.filename, &outcome)
            .await?;

        Ok(report)
    }

    /// Existence probe, then read and write with retries.
    async fn copy(&self, item: &ItemDescriptor) -> Result<WriteOutcome, TransferError> {
        match self.ctx.target.exists(&item.target_name).await {
            Ok(true) => return Ok(WriteOutcome::AlreadyExists),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    target_name = %item.target_name,
                    error = %e,
                    "Existence check failed, attempting transfer"
                );
            }
        }

        let ctx = &self.ctx;
        retry_with_backoff(&ctx.retry, "transfer", classify, || async move {
            let body = ctx.source.open(&item.source_locator).await?;
            ctx.target.write(&item.target_name, body).await
        })
        .await
    }

    /// Best-effort notification. Failures are logged and counted only.
    async fn notify(&self, item: &ItemDescriptor) {
        let Some(notifier) = &self.ctx.notifier else {
            return;
        };

        let result = retry_with_backoff(
            &self.ctx.retry,
            "notify",
            |_| RetryAction::Retry,
            move || notifier.notify(&item.target_name),
        )
        .await;

        if let Err(e) = result {
            metrics::record_notify_failure();
            tracing::warn!(
                unit_id = %item.unit_id,
                target_name = %item.target_name,
                error = %e,
                "Notification failed, item still recorded as completed"
            );
        }
    }
}
