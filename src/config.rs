//! Runtime configuration
//!
//! Read from environment variables, falling back to defaults.

use std::time::Duration;

/// Default capacity of the task event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default cadence for status polling
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Task subsystem configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskConfig {
    /// Capacity of the broadcast channel carrying task events
    pub event_capacity: usize,
    /// How often pollers should ask for task status
    pub poll_interval_ms: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl TaskConfig {
    /// Load from `TASK_EVENT_CAPACITY` and `TASK_POLL_INTERVAL_MS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("TASK_EVENT_CAPACITY") {
            config.event_capacity = parse("TASK_EVENT_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("TASK_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse("TASK_POLL_INTERVAL_MS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the values are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        // broadcast::channel panics on a zero capacity
        if self.event_capacity == 0 {
            return Err(ConfigError::Zero("event_capacity"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll_interval_ms"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

impl From<ConfigError> for String {
    fn from(err: ConfigError) -> String {
        err.to_string()
    }
}
