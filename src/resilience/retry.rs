//! Retry configuration, delay calculation, and the retry decorator.
//!
//! Provides [`RetryConfig`] for controlling retry behaviour,
//! [`retry_with_backoff`] for one-off calls and [`Retrying`] (built with
//! [`with_retry`]) for wrapping an operation once and calling it many times.
//!
//! All entry points delegate to [`retry_with_backoff_if`], keeping retry
//! logic in a single place.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::millis;
use crate::error::{Classify, FailureKind};
use crate::telemetry;

/// Which failures are worth another attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOn {
    /// Connection-refused and timeout failures only.
    #[default]
    Transient,
    /// Every failure.
    Always,
    /// Exactly the listed kinds.
    Kinds(Vec<FailureKind>),
}

impl RetryOn {
    /// Whether a failure of `kind` should be retried.
    pub fn allows(&self, kind: FailureKind) -> bool {
        match self {
            RetryOn::Transient => kind.is_transient(),
            RetryOn::Always => true,
            RetryOn::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff capped at `max_delay`:
///
/// ```rust
/// # use stockade::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200))
///     .backoff_multiplier(3.0);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Delay before the first retry. Default: 100ms.
    #[serde(rename = "initial_delay_ms", deserialize_with = "millis")]
    pub initial_delay: Duration,
    /// Maximum delay between attempts (caps exponential growth). Default: 5s.
    #[serde(rename = "max_delay_ms", deserialize_with = "millis")]
    pub max_delay: Duration,
    /// Growth factor applied to the delay after each retry. Default: 2.
    pub backoff_multiplier: f64,
    /// Retry classification used by [`retry_with_backoff`]. Default: transient only.
    pub retry_on: RetryOn,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            retry_on: RetryOn::Transient,
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the first).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between attempts.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff growth factor.
    pub fn backoff_multiplier(mut self, factor: f64) -> Self {
        self.backoff_multiplier = factor;
        self
    }

    /// Set which failure kinds are retried.
    pub fn retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Calculate the delay after a failed attempt (0-indexed).
    ///
    /// `initial_delay * backoff_multiplier^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

// ============================================================================
// Retry helpers
// ============================================================================

/// Execute an async operation, retrying failures that `config.retry_on` allows.
///
/// The error returned is the one from the last attempt made, unchanged.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
{
    retry_with_backoff_if(
        config,
        |err: &E| config.retry_on.allows(err.failure_kind()),
        operation,
    )
    .await
}

/// Execute an async operation, retrying failures for which `should_retry` holds.
///
/// Stops at the first success, at the first failure `should_retry` rejects,
/// or after `config.max_attempts` attempts (at least one is always made).
/// No delay follows the final attempt.
pub async fn retry_with_backoff_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };
        attempt += 1;
        if attempt >= max_attempts || !should_retry(&err) {
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt - 1);
        metrics::counter!(telemetry::RETRIES_TOTAL).increment(1);
        debug!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "retrying after failed attempt"
        );
        tokio::time::sleep(delay).await;
    }
}

// ============================================================================
// Retrying
// ============================================================================

/// Wrap `operation` so every call goes through [`retry_with_backoff`].
pub fn with_retry<F>(operation: F, config: RetryConfig) -> Retrying<F> {
    Retrying { operation, config }
}

/// Decorator that retries its wrapped operation on each call.
///
/// ```rust
/// # use stockade::{with_retry, RetryConfig, StockadeError};
/// # async fn demo() -> stockade::Result<()> {
/// let lookup = with_retry(
///     |id: u64| async move { Ok::<_, StockadeError>(id * 2) },
///     RetryConfig::new(),
/// );
/// assert_eq!(lookup.call_with(21).await?, 42);
/// # Ok(())
/// # }
/// ```
pub struct Retrying<F> {
    operation: F,
    config: RetryConfig,
}

impl<F> Retrying<F> {
    /// The retry configuration in use.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Call a zero-argument operation with retry.
    pub async fn call<Fut, T, E>(&self) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        retry_with_backoff(&self.config, &self.operation).await
    }

    /// Call an operation taking `input` with retry. Each attempt gets a clone.
    pub async fn call_with<A, Fut, T, E>(&self, input: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        A: Clone,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        retry_with_backoff(&self.config, || (self.operation)(input.clone())).await
    }
}
