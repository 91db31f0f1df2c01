use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments for the objsweep binary
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging (per-key delete lines)")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (warnings and failures only)")]
    pub quiet: bool,
}

/// Subcommands of the objsweep binary
#[derive(Subcommand, Debug, Clone, Default)]
pub enum Commands {
    /// Run a deletion sweep (default behavior)
    #[default]
    Run,
    /// Show the effective configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};

    /// Initialize logging based on CLI arguments
    pub fn init_logging(args: &CommonArgs) {
        let level = if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        };

        // SAFETY: Setting RUST_LOG environment variable is safe for logging configuration
        unsafe {
            std::env::set_var("RUST_LOG", level);
        }
        tracing_subscriber::fmt::init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("objsweep Configuration:");
            println!("=======================");
            println!("Storage DSN: {}", config.storage.dsn);

            if config.sweep.prefixes.is_empty() {
                println!("Prefixes: (all keys)");
            } else {
                println!("Prefixes: {:?}", config.sweep.prefixes);
            }

            println!("Max workers: {}", config.sweep.max_workers);
            println!("Max attempts per key: {}", config.sweep.max_attempts);
            println!(
                "Backoff: {}ms base, {}ms cap",
                config.sweep.backoff_base_millis, config.sweep.backoff_cap_millis
            );
            println!("Queue max depth: {}", config.sweep.queue_max_depth);

            match config.sweep.delete_timeout {
                Some(timeout) => println!("Delete timeout: {timeout:?}"),
                None => println!("Delete timeout: none"),
            }
            match config.sweep.run_timeout {
                Some(timeout) => println!("Run timeout: {timeout:?}"),
                None => println!("Run timeout: none"),
            }

            println!("Dry run: {}", config.sweep.dry_run);
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        tracing::info!("Validating configuration...");

        if config.storage.dsn.is_empty() {
            anyhow::bail!("Storage DSN cannot be empty");
        }

        url::Url::parse(&config.storage.dsn)
            .map_err(|e| anyhow::anyhow!("Invalid storage DSN '{}': {}", config.storage.dsn, e))?;

        if config.sweep.max_workers == 0 {
            anyhow::bail!("max_workers must be positive");
        }

        if config.sweep.max_attempts == 0 {
            anyhow::bail!("max_attempts must be positive");
        }

        if config.sweep.queue_max_depth == 0 {
            anyhow::bail!("queue_max_depth must be positive");
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Handle CLI commands that don't start a sweep
    pub fn handle_common_command(command: &Commands, config: &Configuration) -> Result<bool> {
        match command {
            Commands::Config { json } => {
                display_config(config, *json)?;
                Ok(true) // Command handled, don't run a sweep
            }
            Commands::Validate => {
                validate_config(config)?;
                Ok(true) // Command handled, don't run a sweep
            }
            Commands::Run => {
                Ok(false) // Don't handle, let the sweep run
            }
        }
    }
}
