//! objsweep: bulk deletion of object-storage keys by prefix.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use common::cli::{CommonArgs, Commands, utils};
use common::config::Configuration;
use common::storage::create_object_store;
use sweeper::{
    DeletionScheduler, KeyEnumerator, KeyStore, ObjectStoreAdapter, SweepConfig, SweepError,
};

#[derive(Parser, Debug)]
#[command(name = "objsweep", about = "Bulk object-storage deletion", version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Key prefix to sweep; repeat for several. Overrides the configured set.
    #[arg(long = "prefix", value_name = "PREFIX")]
    prefixes: Vec<String>,

    /// Enumerate and classify without deleting anything.
    #[arg(long)]
    dry_run: bool,

    /// Override the configured worker count.
    #[arg(long, value_name = "N")]
    max_workers: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        tracing::info!("Received Ctrl+C");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logging(&cli.common);

    let mut config = utils::load_config(cli.common.config.as_ref())?;

    // Handle commands that don't start a sweep
    let command = cli.command.unwrap_or_default();
    if utils::handle_common_command(&command, &config)? {
        return Ok(());
    }

    // Command-line overrides beat file and environment settings.
    if !cli.prefixes.is_empty() {
        config.sweep.prefixes = cli.prefixes;
    }
    if cli.dry_run {
        config.sweep.dry_run = true;
    }
    if let Some(max_workers) = cli.max_workers {
        config.sweep.max_workers = max_workers;
    }

    run(config).await
}

async fn run(config: Configuration) -> Result<()> {
    tracing::info!(dsn = %config.storage.dsn, "Connecting to object store");
    let store = create_object_store(&config.storage).context("Failed to create object store")?;
    let adapter: Arc<dyn KeyStore> = Arc::new(ObjectStoreAdapter::new(store));

    let sweep_config: SweepConfig = config.sweep.into();
    if sweep_config.dry_run {
        tracing::info!("[DRY-RUN] No objects will be deleted");
    }
    let prefixes = sweep_config.prefixes.clone();

    let scheduler = DeletionScheduler::new(Arc::clone(&adapter), sweep_config)
        .context("Invalid sweep configuration")?;

    // The first signal requests a graceful stop: in-flight deletes finish,
    // queued keys are reported as skipped.
    let cancellation = scheduler.cancellation();
    let signal_task = tokio::spawn(async move {
        if wait_for_shutdown_signal().await.is_ok() {
            cancellation.cancel().await;
        }
    });

    let enumerator = KeyEnumerator::new(adapter, prefixes);
    let outcome = scheduler.run(enumerator.into_stream()).await;
    signal_task.abort();

    match outcome {
        Ok(summary) => {
            summary.log();
            if !summary.permanent_failures.is_empty() {
                anyhow::bail!(
                    "{} keys could not be deleted",
                    summary.permanent_failures.len()
                );
            }
            Ok(())
        }
        Err(SweepError::Timeout { timeout, summary }) => {
            summary.log();
            anyhow::bail!("run exceeded {timeout:?} and was aborted")
        }
        Err(e) => Err(e.into()),
    }
}
