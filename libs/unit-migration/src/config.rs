// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Run configuration
//!
//! Every knob the pipeline honors lives here. The configuration is built
//! once (by the CLI or a test), validated once by [`MigrationConfig::validate`],
//! and then handed to the [`crate::driver::Pipeline`] which never re-reads it.

use thiserror::Error;

use crate::partition::PartitionSpec;
use crate::retry::RetryPolicy;

/// Default number of units processed concurrently
pub const DEFAULT_UNIT_CONCURRENCY: usize = 20;

/// Default number of items transferred concurrently within one unit
pub const DEFAULT_ITEM_CONCURRENCY: usize = 10;

/// Configuration errors. All of these abort the run before dispatch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be at least 1")]
    ZeroConcurrency { name: &'static str },

    #[error("total partitions must be at least 1")]
    ZeroPartitions,

    #[error("partition index {index} is out of range [0, {total})")]
    PartitionOutOfRange { index: u32, total: u32 },

    #[error("--partition and --total-partitions must be used together")]
    IncompletePartition,

    #[error("retry policy must allow at least one attempt")]
    ZeroAttempts,
}

/// Pipeline configuration
#[derive(Clone, Debug)]
pub struct MigrationConfig {
    /// Number of units processed at the same time (outer pool width)
    pub unit_concurrency: usize,
    /// Number of items transferred at the same time per unit (inner pool width)
    pub item_concurrency: usize,
    /// Exclude units already completed in the state store before dispatch
    pub resume: bool,
    /// The slice of the input list this process owns, if partitioned
    pub partition: Option<PartitionSpec>,
    /// Do not send notifications after target writes
    pub skip_notify: bool,
    /// Retry policy for lookups, transfers and notifications
    pub retry: RetryPolicy,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            unit_concurrency: DEFAULT_UNIT_CONCURRENCY,
            item_concurrency: DEFAULT_ITEM_CONCURRENCY,
            resume: false,
            partition: None,
            skip_notify: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl MigrationConfig {
    /// Check the configuration for values that would make the run invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unit_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency {
                name: "unit concurrency",
            });
        }
        if self.item_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency {
                name: "item concurrency",
            });
        }
        if let Some(partition) = &self.partition {
            partition.validate()?;
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }

    /// Upper bound on simultaneous in-flight transfers (`W x F`).
    pub fn max_in_flight(&self) -> usize {
        self.unit_concurrency.saturating_mul(self.item_concurrency)
    }

    /// Build a partition spec from the optional pair of CLI values.
    ///
    /// Both values must be given together or not at all.
    pub fn partition_from_args(
        index: Option<u32>,
        total: Option<u32>,
    ) -> Result<Option<PartitionSpec>, ConfigError> {
        match (index, total) {
            (None, None) => Ok(None),
            (Some(index), Some(total)) => PartitionSpec::new(index, total).map(Some),
            _ => Err(ConfigError::IncompletePartition),
        }
    }
}
