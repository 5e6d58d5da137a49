use crate::timeouts::{
    DEFAULT_CACHE_MAX_AGE, DEFAULT_DETECTION_WINDOW, DEFAULT_DROP_THRESHOLD, DEFAULT_MAX_RETRIES,
    DEFAULT_OSCILLATION_THRESHOLD, DEFAULT_RETRY_BASE_DELAY,
};
use crate::util::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Tunables for one protected record stream. Immutable once handed to a
/// [`ProtectedFetcher`](crate::ProtectedFetcher).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtectionConfig {
    max_retries: u32,
    retry_base_delay: Duration,
    cache_max_age: Duration,
    detection_window: Duration,
    oscillation_threshold: usize,
    drop_threshold: f64,
}

impl ProtectionConfig {
    pub fn new(
        max_retries: u32,
        retry_base_delay: Duration,
        cache_max_age: Duration,
        detection_window: Duration,
        oscillation_threshold: usize,
        drop_threshold: f64,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            max_retries,
            retry_base_delay,
            cache_max_age,
            detection_window,
            oscillation_threshold,
            drop_threshold,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age = max_age;
        self
    }

    pub fn with_detection_window(mut self, window: Duration) -> Self {
        self.detection_window = window;
        self
    }

    pub fn with_oscillation_threshold(mut self, threshold: usize) -> Self {
        self.oscillation_threshold = threshold;
        self
    }

    pub fn with_drop_threshold(mut self, threshold: f64) -> Self {
        self.drop_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.drop_threshold.is_finite()
            || self.drop_threshold <= 0.0
            || self.drop_threshold > 1.0
        {
            return Err(ConfigError::DropThreshold(self.drop_threshold));
        }
        if self.oscillation_threshold == 0 {
            return Err(ConfigError::OscillationThreshold);
        }
        if self.detection_window.is_zero() {
            return Err(ConfigError::ZeroDuration("detection_window"));
        }
        if self.cache_max_age.is_zero() {
            return Err(ConfigError::ZeroDuration("cache_max_age"));
        }
        Ok(())
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ProtectionConfigFile = serde_yaml::from_str(raw)?;
        Self::try_from(file)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_base_delay(&self) -> Duration {
        self.retry_base_delay
    }

    pub fn cache_max_age(&self) -> Duration {
        self.cache_max_age
    }

    pub fn detection_window(&self) -> Duration {
        self.detection_window
    }

    pub fn oscillation_threshold(&self) -> usize {
        self.oscillation_threshold
    }

    pub fn drop_threshold(&self) -> f64 {
        self.drop_threshold
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_retries(self.max_retries, self.retry_base_delay)
    }
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            detection_window: DEFAULT_DETECTION_WINDOW,
            oscillation_threshold: DEFAULT_OSCILLATION_THRESHOLD,
            drop_threshold: DEFAULT_DROP_THRESHOLD,
        }
    }
}

/// On-disk shape of [`ProtectionConfig`]. Durations are milliseconds and
/// every field falls back to the built-in default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtectionConfigFile {
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub cache_max_age_ms: u64,
    pub detection_window_ms: u64,
    pub oscillation_threshold: usize,
    pub drop_threshold: f64,
}

impl Default for ProtectionConfigFile {
    fn default() -> Self {
        ProtectionConfig::default().into()
    }
}

impl TryFrom<ProtectionConfigFile> for ProtectionConfig {
    type Error = ConfigError;

    fn try_from(file: ProtectionConfigFile) -> Result<Self, Self::Error> {
        ProtectionConfig::new(
            file.max_retries,
            Duration::from_millis(file.retry_base_delay_ms),
            Duration::from_millis(file.cache_max_age_ms),
            Duration::from_millis(file.detection_window_ms),
            file.oscillation_threshold,
            file.drop_threshold,
        )
    }
}

impl From<ProtectionConfig> for ProtectionConfigFile {
    fn from(config: ProtectionConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_base_delay_ms: duration_ms(config.retry_base_delay),
            cache_max_age_ms: duration_ms(config.cache_max_age),
            detection_window_ms: duration_ms(config.detection_window),
            oscillation_threshold: config.oscillation_threshold,
            drop_threshold: config.drop_threshold,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("drop_threshold must be within (0, 1], got {0}")]
    DropThreshold(f64),
    #[error("oscillation_threshold must be at least 1")]
    OscillationThreshold,
    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
}
