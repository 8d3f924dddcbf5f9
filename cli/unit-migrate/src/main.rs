// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Unit migration CLI
//!
//! Runs the migration pipeline over a unit list and inspects the state
//! database it leaves behind.
//!
//! Exit status: 0 on success, 1 when any unit failed, 2 on configuration,
//! input or state store errors, 130 when a second signal forces shutdown.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

mod commands;
mod output;
mod shutdown;

/// Exit status when a run finished but some units failed
const EXIT_UNIT_FAILURES: u8 = 1;

/// Exit status for errors that stopped the command
const EXIT_FATAL: u8 = 2;

#[derive(Parser)]
#[command(name = "unit-migrate")]
#[command(about = "Resumable bulk migration of unit/item files", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the SQLite state database
    #[arg(
        long,
        global = true,
        default_value = "migration_state.db",
        env = "UNIT_MIGRATE_STATE_DB"
    )]
    state_db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the units of an input list
    Run(RunArgs),

    /// Show unit and item counts by status
    Status {
        /// Also list failed units and items with their errors
        #[arg(long)]
        failed: bool,
    },

    /// Write a unit list without the units already completed
    FilterCompleted {
        /// Unit list to filter
        #[arg(long)]
        input: PathBuf,

        /// Where to write the remaining units
        #[arg(long)]
        output: PathBuf,
    },

    /// Check that every completed item exists in the target store
    Validate {
        /// Target directory to check
        #[arg(long, env = "UNIT_MIGRATE_TARGET_DIR")]
        target_dir: PathBuf,

        /// Check a random sample of this many items instead of all of them
        #[arg(long)]
        sample: Option<usize>,

        /// Number of concurrent existence checks
        #[arg(long, default_value_t = 20)]
        workers: usize,

        /// Write missing items to this CSV file
        #[arg(long)]
        export_missing: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Unit list (CSV). With --resume and no input, every unit not yet
    /// completed in the state database is re-run.
    #[arg(long, env = "UNIT_MIGRATE_INPUT")]
    input: Option<PathBuf>,

    /// Units processed concurrently
    #[arg(long, default_value_t = unit_migration::config::DEFAULT_UNIT_CONCURRENCY, env = "UNIT_MIGRATE_UNIT_WORKERS")]
    unit_workers: usize,

    /// Items transferred concurrently within each unit
    #[arg(long, default_value_t = unit_migration::config::DEFAULT_ITEM_CONCURRENCY, env = "UNIT_MIGRATE_ITEM_WORKERS")]
    item_workers: usize,

    /// Skip units already completed in the state database
    #[arg(long)]
    resume: bool,

    /// Partition index owned by this process
    #[arg(long, env = "UNIT_MIGRATE_PARTITION")]
    partition: Option<u32>,

    /// Number of cooperating partitions
    #[arg(long, env = "UNIT_MIGRATE_TOTAL_PARTITIONS")]
    total_partitions: Option<u32>,

    /// Do not send notifications for written objects
    #[arg(long)]
    no_notify: bool,

    /// Base URL of the item lookup service
    #[arg(long, env = "UNIT_MIGRATE_LOOKUP_URL")]
    lookup_url: String,

    /// Directory objects are written to
    #[arg(long, env = "UNIT_MIGRATE_TARGET_DIR")]
    target_dir: PathBuf,

    /// URL notifications are posted to
    #[arg(long, env = "UNIT_MIGRATE_NOTIFY_URL")]
    notify_url: Option<String>,

    /// Container name sent with each notification
    #[arg(long, default_value = "migrated", env = "UNIT_MIGRATE_CONTAINER")]
    container: String,

    /// Attempts per lookup, transfer and notification
    #[arg(long, default_value_t = 3, env = "UNIT_MIGRATE_MAX_ATTEMPTS")]
    max_attempts: u32,

    /// Timeout in seconds for each lookup or notify request
    #[arg(
        long,
        default_value_t = unit_migration::http::DEFAULT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..),
        env = "UNIT_MIGRATE_REQUEST_TIMEOUT_SECS"
    )]
    request_timeout_secs: u64,

    /// Longest stall, in seconds, allowed while downloading a source object.
    /// Total download time is not limited.
    #[arg(
        long,
        default_value_t = unit_migration::http::DEFAULT_READ_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..),
        env = "UNIT_MIGRATE_DOWNLOAD_TIMEOUT_SECS"
    )]
    download_timeout_secs: u64,

    /// Write Prometheus metrics to this file when the run ends
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "unit_migrate=info,unit_migration=info".to_string()),
        ))
        .init();

    // reqwest is built without a default rustls provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args, &cli.state_db).await,
        Commands::Status { failed } => commands::status::run(&cli.state_db, failed)
            .await
            .map(|()| commands::Outcome::Success),
        Commands::FilterCompleted { input, output } => {
            commands::filter::run(&cli.state_db, &input, &output)
                .await
                .map(|()| commands::Outcome::Success)
        }
        Commands::Validate {
            target_dir,
            sample,
            workers,
            export_missing,
        } => {
            commands::validate::run(
                &cli.state_db,
                &target_dir,
                sample,
                workers,
                export_missing.as_deref(),
            )
            .await
        }
    };

    match result {
        Ok(commands::Outcome::Success) => ExitCode::SUCCESS,
        Ok(commands::Outcome::Failures) => ExitCode::from(EXIT_UNIT_FAILURES),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
