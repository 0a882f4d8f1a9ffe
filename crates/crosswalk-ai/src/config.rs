//! Engine tuning knobs.

use std::time::Duration;

use crosswalk_core::FingerprintStyle;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("top_k must be at least 1")]
    ZeroTopK,
    #[error("max_workers must be at least 1")]
    ZeroWorkers,
    #[error("verify_timeout must be greater than zero")]
    ZeroTimeout,
}

/// Settings for one crosswalk run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Candidates verified per source item.
    pub top_k: usize,
    /// Concurrent verification requests.
    pub max_workers: usize,
    /// Budget for a single verification call; exceeding it yields a fallback.
    pub verify_timeout: Duration,
    pub fingerprint_style: FingerprintStyle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_workers: 16,
            verify_timeout: Duration::from_secs(120),
            fingerprint_style: FingerprintStyle::Plain,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::ZeroTopK);
        }
        if self.max_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.verify_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
