//! Engine configuration.

use std::time::Duration;

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub const FETCH_BATCH_SIZE_ENV: &str = "EVALRUN_FETCH_BATCH_SIZE";
pub const CHECKPOINT_INTERVAL_ENV: &str = "EVALRUN_CHECKPOINT_INTERVAL";
pub const CACHE_TTL_ENV: &str = "EVALRUN_CACHE_TTL_SECS";
pub const STALL_THRESHOLD_ENV: &str = "EVALRUN_STALL_THRESHOLD_SECS";
pub const ENGINE_NAME_ENV: &str = "EVALRUN_ENGINE_NAME";

/// Orchestrator and worker loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Used as a prefix for worker thread names and in logs
    pub name: String,
    /// Items fetched per page from the item source
    pub fetch_batch_size: usize,
    /// The checkpoint pointer is persisted every this many processed items
    /// (counters and progress are persisted on every item)
    pub checkpoint_interval: u32,
    /// Expiry of status cache entries
    pub cache_ttl: Duration,
    /// Default inactivity window after which an active job counts as stalled
    pub stall_threshold: Duration,
    /// Prefix of status cache keys
    pub cache_key_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "evalrun".to_string(),
            fetch_batch_size: 50,
            checkpoint_interval: 1,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            stall_threshold: Duration::from_secs(60 * 60),
            cache_key_prefix: "evalrun:job".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `EVALRUN_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`EngineConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup(ENGINE_NAME_ENV) {
            let name = name.trim();
            if name.is_empty() {
                return Err(invalid(ENGINE_NAME_ENV, name, "must not be empty"));
            }
            config.name = name.to_string();
        }
        if let Some(raw) = lookup(FETCH_BATCH_SIZE_ENV) {
            config.fetch_batch_size = parse_positive(FETCH_BATCH_SIZE_ENV, &raw)? as usize;
        }
        if let Some(raw) = lookup(CHECKPOINT_INTERVAL_ENV) {
            let interval = parse_positive(CHECKPOINT_INTERVAL_ENV, &raw)?;
            config.checkpoint_interval = u32::try_from(interval)
                .map_err(|_| invalid(CHECKPOINT_INTERVAL_ENV, &raw, "too large"))?;
        }
        if let Some(raw) = lookup(CACHE_TTL_ENV) {
            config.cache_ttl = Duration::from_secs(parse_positive(CACHE_TTL_ENV, &raw)?);
        }
        if let Some(raw) = lookup(STALL_THRESHOLD_ENV) {
            config.stall_threshold = Duration::from_secs(parse_positive(STALL_THRESHOLD_ENV, &raw)?);
        }

        Ok(config)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Values below 1 are raised to 1.
    pub fn with_fetch_batch_size(mut self, size: usize) -> Self {
        self.fetch_batch_size = size.max(1);
        self
    }

    /// Values below 1 are raised to 1.
    pub fn with_checkpoint_interval(mut self, every: u32) -> Self {
        self.checkpoint_interval = every.max(1);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_stall_threshold(mut self, threshold: Duration) -> Self {
        self.stall_threshold = threshold;
        self
    }

    pub fn with_cache_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_key_prefix = prefix.into();
        self
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(key, raw, &e.to_string()))?;
    if value == 0 {
        return Err(invalid(key, raw, "must be at least 1"));
    }
    Ok(value)
}
