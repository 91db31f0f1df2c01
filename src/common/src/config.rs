use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Object storage connection configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage DSN selecting and configuring the provider
    /// (file:///path, memory://, s3://host/bucket, az://container, gs://bucket)
    pub dsn: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("memory://"),
        }
    }
}

/// Deletion run configuration.
///
/// Controls enumeration scope, worker-pool sizing, retry policy, and the
/// queue bound that throttles enumeration against slow deletes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Key prefixes to enumerate. An empty list (the default) means every
    /// key in the store.
    ///
    /// Env: OBJSWEEP__SWEEP__PREFIXES
    #[serde(default)]
    pub prefixes: Vec<String>,

    /// Number of concurrent delete workers.
    ///
    /// Default: 32
    ///
    /// Env: OBJSWEEP__SWEEP__MAX_WORKERS
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Maximum delete attempts per key before it is reported as a permanent
    /// failure.
    ///
    /// Default: 3
    ///
    /// Env: OBJSWEEP__SWEEP__MAX_ATTEMPTS
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential retry backoff, in milliseconds. The delay
    /// after attempt N is `base * 2^N`, bounded by `backoff_cap_millis`.
    ///
    /// Default: 100
    ///
    /// Env: OBJSWEEP__SWEEP__BACKOFF_BASE_MILLIS
    #[serde(default = "default_backoff_base_millis")]
    pub backoff_base_millis: u64,

    /// Upper bound on a single backoff delay, in milliseconds.
    ///
    /// Default: 5000
    ///
    /// Env: OBJSWEEP__SWEEP__BACKOFF_CAP_MILLIS
    #[serde(default = "default_backoff_cap_millis")]
    pub backoff_cap_millis: u64,

    /// Maximum number of keys buffered between enumeration and the workers.
    /// Enumeration blocks once the queue is full, so memory stays bounded
    /// regardless of how many keys the store holds.
    ///
    /// Default: 1000
    ///
    /// Env: OBJSWEEP__SWEEP__QUEUE_MAX_DEPTH
    #[serde(default = "default_queue_max_depth")]
    pub queue_max_depth: usize,

    /// Timeout applied to each individual delete call. A call exceeding it
    /// counts as a transient failure and is retried.
    ///
    /// Default: 30s
    ///
    /// Env: OBJSWEEP__SWEEP__DELETE_TIMEOUT
    #[serde(default = "default_delete_timeout", with = "humantime_serde")]
    pub delete_timeout: Option<Duration>,

    /// Overall run timeout. Unset by default. When exceeded, the run aborts
    /// and reports whatever it accomplished up to that point.
    ///
    /// Env: OBJSWEEP__SWEEP__RUN_TIMEOUT
    #[serde(default, with = "humantime_serde")]
    pub run_timeout: Option<Duration>,

    /// Dry-run mode: enumerate and schedule normally, but record deletions
    /// without issuing provider calls.
    ///
    /// Default: false
    ///
    /// Env: OBJSWEEP__SWEEP__DRY_RUN
    #[serde(default)]
    pub dry_run: bool,
}

// Default value functions for serde
fn default_max_workers() -> usize {
    32
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_millis() -> u64 {
    100
}

fn default_backoff_cap_millis() -> u64 {
    5000
}

fn default_queue_max_depth() -> usize {
    1000
}

fn default_delete_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            prefixes: Vec::new(),
            max_workers: default_max_workers(),
            max_attempts: default_max_attempts(),
            backoff_base_millis: default_backoff_base_millis(),
            backoff_cap_millis: default_backoff_cap_millis(),
            queue_max_depth: default_queue_max_depth(),
            delete_timeout: default_delete_timeout(),
            run_timeout: None,
            dry_run: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// Object storage connection
    pub storage: StorageConfig,
    /// Deletion run behavior
    pub sweep: SweepConfig,
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file("objsweep.toml"))
            .merge(Env::prefixed("OBJSWEEP__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("OBJSWEEP__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = Configuration::default();

        assert_eq!(config.storage.dsn, "memory://");
        assert!(config.sweep.prefixes.is_empty());
        assert_eq!(config.sweep.max_workers, 32);
        assert_eq!(config.sweep.max_attempts, 3);
        assert_eq!(config.sweep.backoff_base_millis, 100);
        assert_eq!(config.sweep.backoff_cap_millis, 5000);
        assert_eq!(config.sweep.queue_max_depth, 1000);
        assert_eq!(config.sweep.delete_timeout, Some(Duration::from_secs(30)));
        assert!(config.sweep.run_timeout.is_none());
        assert!(!config.sweep.dry_run);
    }

    #[test]
    fn test_configless_operation() {
        // Loading defaults without any config file must work
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .extract::<Configuration>()
            .unwrap();

        assert_eq!(config.storage.dsn, "memory://");
        assert_eq!(config.sweep.max_workers, 32);
    }

    #[test]
    fn test_env_var_override() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("OBJSWEEP__STORAGE__DSN", "file:///tmp/objsweep-test");
            jail.set_env("OBJSWEEP__SWEEP__MAX_WORKERS", "8");
            jail.set_env("OBJSWEEP__SWEEP__DRY_RUN", "true");

            let config = Figment::from(Serialized::defaults(Configuration::default()))
                .merge(Env::prefixed("OBJSWEEP__").split("__"))
                .extract::<Configuration>()?;

            assert_eq!(config.storage.dsn, "file:///tmp/objsweep-test");
            assert_eq!(config.sweep.max_workers, 8);
            assert!(config.sweep.dry_run);

            Ok(())
        });
    }

    #[test]
    fn test_toml_file_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "objsweep.toml",
                r#"
                [storage]
                dsn = "memory://"

                [sweep]
                prefixes = ["logs/2024/", "tmp/"]
                max_attempts = 5
                run_timeout = "2m"
                "#,
            )?;

            let config = Figment::from(Serialized::defaults(Configuration::default()))
                .merge(Toml::file("objsweep.toml"))
                .extract::<Configuration>()?;

            assert_eq!(config.sweep.prefixes, vec!["logs/2024/", "tmp/"]);
            assert_eq!(config.sweep.max_attempts, 5);
            assert_eq!(config.sweep.run_timeout, Some(Duration::from_secs(120)));
            // Untouched fields keep their defaults
            assert_eq!(config.sweep.max_workers, 32);

            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "objsweep.toml",
                r#"
                [sweep]
                max_workers = 4
                "#,
            )?;
            jail.set_env("OBJSWEEP__SWEEP__MAX_WORKERS", "64");

            let config = Figment::from(Serialized::defaults(Configuration::default()))
                .merge(Toml::file("objsweep.toml"))
                .merge(Env::prefixed("OBJSWEEP__").split("__"))
                .extract::<Configuration>()?;

            assert_eq!(config.sweep.max_workers, 64);

            Ok(())
        });
    }

    #[test]
    fn test_humantime_durations() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "objsweep.toml",
                r#"
                [sweep]
                delete_timeout = "45s"
                run_timeout = "1h"
                "#,
            )?;

            let config = Figment::from(Serialized::defaults(Configuration::default()))
                .merge(Toml::file("objsweep.toml"))
                .extract::<Configuration>()?;

            assert_eq!(config.sweep.delete_timeout, Some(Duration::from_secs(45)));
            assert_eq!(config.sweep.run_timeout, Some(Duration::from_secs(3600)));

            Ok(())
        });
    }
}
