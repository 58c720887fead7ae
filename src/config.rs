//! Configuration loading.
//!
//! Each component takes its own config struct at construction time. A
//! service that wants all three from one file uses [`ResilienceConfig`]:
//!
//! ```toml
//! [cache]
//! name = "products"
//! default_ttl_ms = 60000
//! sweep_interval_ms = 30000
//!
//! [retry]
//! max_attempts = 4
//! initial_delay_ms = 50
//! retry_on = { kinds = ["timeout"] }
//!
//! [circuit_breaker]
//! failure_threshold = 3
//! reset_timeout_ms = 10000
//! ```
//!
//! Every section and key is optional; missing values take the defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::cache::CacheConfig;
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::{Result, StockadeError};

/// Deserialize a duration given as whole milliseconds.
pub(crate) fn millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// Combined configuration for one guarded service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl ResilienceConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StockadeError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject values the components cannot run with sensibly.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(StockadeError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(StockadeError::Configuration(format!(
                "retry.backoff_multiplier must be a finite number >= 1, got {}",
                self.retry.backoff_multiplier
            )));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(StockadeError::Configuration(
                "circuit_breaker.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.circuit_breaker.success_threshold == 0 {
            return Err(StockadeError::Configuration(
                "circuit_breaker.success_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
