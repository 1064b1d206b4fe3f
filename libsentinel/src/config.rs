use crate::error::{Error, Result};
use std::env;

/// Runtime configuration for a single watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Quiet period, in milliseconds, after which a batch is flushed.
    pub debounce_ms: u64,
    /// Capacity of the raw signal channel between the native source and
    /// the pump. Overflowing it is fatal.
    pub max_queue_size: usize,
    /// Glob patterns for paths that are never descended into or reported.
    pub exclusions: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            max_queue_size: 100_000,
            exclusions: Vec::new(),
        }
    }
}

impl WatcherConfig {
    /// Resolve configuration from the environment on top of the defaults.
    ///
    /// Recognised variables:
    /// 1. `SENTINEL_DEBOUNCE_MS`  debounce window in milliseconds
    /// 2. `SENTINEL_MAX_QUEUE`    raw signal queue capacity
    /// 3. `SENTINEL_EXCLUDE`      exclusion patterns, separated like `PATH`
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(val) = env::var_os("SENTINEL_DEBOUNCE_MS") {
            cfg.debounce_ms = parse_number("SENTINEL_DEBOUNCE_MS", &val.to_string_lossy())?;
        }

        if let Some(val) = env::var_os("SENTINEL_MAX_QUEUE") {
            cfg.max_queue_size = parse_number("SENTINEL_MAX_QUEUE", &val.to_string_lossy())?;
        }

        if let Some(val) = env::var_os("SENTINEL_EXCLUDE") {
            cfg.exclusions = env::split_paths(&val)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the watcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            return Err(Error::Config("max_queue_size must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} must be a non-negative integer, got `{raw}`")))
}
