// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Unit Migration Library
//!
//! A resumable, partitionable bulk transfer pipeline. The input is an ordered
//! list of units (each identified by a `unit_id` and grouped by a `group_id`);
//! every unit fans out, through an external lookup, into many items that are
//! copied from a source store to a target store exactly once.
//!
//! Progress is persisted in a [`state::StateStore`] so that a run killed at
//! any point can be resumed, and a deterministic [`partition`] function lets
//! several machines split one input list without talking to each other.
//!
//! # Modules
//!
//! - [`config`] - Typed run configuration, validated once at startup
//! - [`context`] - Explicit run context handed to processors and executors
//! - [`driver`] - Top-level pipeline driver and run summary
//! - [`executor`] - Single item transfer (read, write, notify, record)
//! - [`fs_target`] - Filesystem-backed target store
//! - [`http`] - HTTP lookup, source and notify collaborators
//! - [`input`] - CSV unit list loading and writing
//! - [`metrics`] - Prometheus metrics
//! - [`naming`] - Deterministic target object names
//! - [`partition`] - Stable unit-to-partition assignment
//! - [`processor`] - Per-unit processing protocol
//! - [`resume`] - Pre-flight resume filtering
//! - [`retry`] - Retry policy with exponential backoff
//! - [`state`] - Persistent unit/item state
//! - [`stores`] - Collaborator traits and their error types
//! - [`validate`] - Post-run check of completed items against the target

pub mod config;
pub mod context;
pub mod driver;
pub mod executor;
pub mod fs_target;
pub mod http;
pub mod input;
pub mod metrics;
pub mod naming;
pub mod partition;
pub mod processor;
pub mod resume;
pub mod retry;
pub mod state;
pub mod stores;
pub mod validate;

pub use config::{ConfigError, MigrationConfig};
pub use context::{Collaborators, RunContext};
pub use driver::{Pipeline, PipelineError, RunSummary};
pub use partition::PartitionSpec;
pub use state::{SqliteStateStore, StateStore};
pub use stores::UnitRef;
