// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! `run`: migrate units

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;
use unit_migration::fs_target::FsTargetStore;
use unit_migration::http::{self, HttpItemLookup, HttpNotifier, HttpSource};
use unit_migration::retry::RetryPolicy;
use unit_migration::stores::Notifier;
use unit_migration::{
    Collaborators, MigrationConfig, Pipeline, SqliteStateStore, StateStore, input, metrics,
};

use super::Outcome;
use crate::RunArgs;
use crate::output::{aggregate_table, print_table, summary_table};
use crate::shutdown;

fn build_config(args: &RunArgs) -> Result<MigrationConfig> {
    let partition = MigrationConfig::partition_from_args(args.partition, args.total_partitions)?;
    let config = MigrationConfig {
        unit_concurrency: args.unit_workers,
        item_concurrency: args.item_workers,
        resume: args.resume,
        partition,
        skip_notify: args.no_notify,
        retry: RetryPolicy {
            max_attempts: args.max_attempts,
            ..Default::default()
        },
    };
    config.validate()?;
    Ok(config)
}

async fn build_collaborators(args: &RunArgs) -> Result<Collaborators> {
    let client = http::build_client(Duration::from_secs(args.request_timeout_secs))
        .context("failed to build HTTP client")?;
    let source_client = http::build_source_client(
        http::DEFAULT_CONNECT_TIMEOUT,
        Duration::from_secs(args.download_timeout_secs),
    )
    .context("failed to build download client")?;

    let lookup = HttpItemLookup::new(client.clone(), &args.lookup_url)
        .with_context(|| format!("invalid lookup URL {:?}", args.lookup_url))?;
    let target = FsTargetStore::new(&args.target_dir)
        .await
        .with_context(|| format!("failed to create target directory {}", args.target_dir.display()))?;

    let notifier: Option<Arc<dyn Notifier>> = match &args.notify_url {
        Some(url) if !args.no_notify => Some(Arc::new(
            HttpNotifier::new(client.clone(), url, args.container.clone())
                .with_context(|| format!("invalid notify URL {url:?}"))?,
        )),
        None if !args.no_notify => {
            info!("No notify URL configured, notifications disabled");
            None
        }
        _ => None,
    };

    Ok(Collaborators {
        lookup: Arc::new(lookup),
        source: Arc::new(HttpSource::new(source_client)),
        target: Arc::new(target),
        notifier,
    })
}

pub async fn run(args: RunArgs, state_db: &Path) -> Result<Outcome> {
    // Configuration and input are checked before the store is touched.
    let config = build_config(&args)?;
    let units = match &args.input {
        Some(path) => Some(input::load_units(path).await?),
        None if config.resume => None,
        None => bail!("--input is required unless --resume is given"),
    };

    let store: Arc<dyn StateStore> = Arc::new(
        SqliteStateStore::open(state_db)
            .with_context(|| format!("failed to open state database {}", state_db.display()))?,
    );
    metrics::register_metrics().context("failed to register metrics")?;
    let collaborators = build_collaborators(&args).await?;

    let cancel = shutdown::install_signal_handler();
    let pipeline = Pipeline::new(config, collaborators, store, cancel)?;
    let result = match units {
        Some(units) => pipeline.run(units).await,
        None => pipeline.resume_from_store().await,
    };

    if let Some(path) = &args.metrics_out {
        tokio::fs::write(path, metrics::gather_metrics())
            .await
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
    }

    let summary = result?;
    print_table(summary_table(&summary));
    println!();
    print_table(aggregate_table(&summary.store));

    if summary.has_failures() {
        Ok(Outcome::Failures)
    } else {
        Ok(Outcome::Success)
    }
}
