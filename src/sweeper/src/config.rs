//! Engine-side run configuration.

use std::time::Duration;

/// Validated settings for one deletion run.
///
/// The serde-facing twin lives in `common::config::SweepConfig`; this one
/// carries real durations for the scheduler.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Key prefixes to sweep. Empty means every key in the store.
    pub prefixes: Vec<String>,
    /// Number of concurrent delete workers.
    pub max_workers: usize,
    /// Attempts per key before a transient failure becomes permanent.
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt.
    pub backoff_base: Duration,
    /// Upper bound on any single retry delay.
    pub backoff_cap: Duration,
    /// Seeded-queue depth at which enumeration blocks.
    pub queue_max_depth: usize,
    /// Deadline for one delete call; overruns classify as timeouts.
    pub delete_timeout: Option<Duration>,
    /// Deadline for the whole run.
    pub run_timeout: Option<Duration>,
    /// Enumerate and classify, but never call delete.
    pub dry_run: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        common::config::SweepConfig::default().into()
    }
}

impl From<common::config::SweepConfig> for SweepConfig {
    fn from(config: common::config::SweepConfig) -> Self {
        Self {
            prefixes: config.prefixes,
            max_workers: config.max_workers,
            max_attempts: config.max_attempts,
            backoff_base: Duration::from_millis(config.backoff_base_millis),
            backoff_cap: Duration::from_millis(config.backoff_cap_millis),
            queue_max_depth: config.queue_max_depth,
            delete_timeout: config.delete_timeout,
            run_timeout: config.run_timeout,
            dry_run: config.dry_run,
        }
    }
}

impl SweepConfig {
    /// Validate the run configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_workers == 0 {
            anyhow::bail!("max_workers must be positive");
        }
        if self.max_attempts == 0 {
            anyhow::bail!("max_attempts must be positive");
        }
        if self.queue_max_depth == 0 {
            anyhow::bail!("queue_max_depth must be positive");
        }
        if self.backoff_cap < self.backoff_base {
            anyhow::bail!(
                "backoff cap ({:?}) must not be below the backoff base ({:?})",
                self.backoff_cap,
                self.backoff_base
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SweepConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_workers, 32);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff_base, Duration::from_millis(100));
        assert_eq!(config.backoff_cap, Duration::from_secs(5));
        assert!(!config.dry_run);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = SweepConfig {
            max_workers: 0,
            ..SweepConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = SweepConfig {
            max_attempts: 0,
            ..SweepConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cap_below_base_rejected() {
        let config = SweepConfig {
            backoff_base: Duration::from_secs(10),
            backoff_cap: Duration::from_secs(1),
            ..SweepConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backoff cap"));
    }

    #[test]
    fn test_conversion_from_file_config() {
        let file_config = common::config::SweepConfig {
            prefixes: vec!["logs/".to_string()],
            max_workers: 4,
            max_attempts: 5,
            backoff_base_millis: 50,
            backoff_cap_millis: 2_000,
            queue_max_depth: 100,
            delete_timeout: Some(Duration::from_secs(10)),
            run_timeout: Some(Duration::from_secs(600)),
            dry_run: true,
        };

        let config: SweepConfig = file_config.into();
        assert_eq!(config.prefixes, vec!["logs/".to_string()]);
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.backoff_base, Duration::from_millis(50));
        assert_eq!(config.backoff_cap, Duration::from_secs(2));
        assert_eq!(config.run_timeout, Some(Duration::from_secs(600)));
        assert!(config.dry_run);
    }
}
