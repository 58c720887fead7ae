//! # Circuit Breaker
//!
//! Fault isolation for calls into a backend that may be down. Three states:
//! Closed (normal operation), Open (failing fast) and Half-Open (probing
//! recovery).
//!
//! - Closed: calls run. A success resets the failure count; reaching
//!   `failure_threshold` consecutive failures opens the circuit.
//! - Open: calls are rejected with [`CircuitError::Open`] without running,
//!   until `reset_timeout` has elapsed. The next call then moves the circuit
//!   to Half-Open and runs.
//! - Half-Open: any failure reopens the circuit with a fresh timeout;
//!   `success_threshold` consecutive successes close it.
//!
//! Time is read from [`tokio::time::Instant`], so a paused test clock
//! drives the reset timeout.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::millis;
use crate::error::{Classify, FailureKind};
use crate::telemetry;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - calls run as probes
    HalfOpen,
}

impl CircuitState {
    /// Stable lowercase name, used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker thresholds and cooldown.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in Closed before opening. Default: 5.
    pub failure_threshold: u32,
    /// Consecutive successes in Half-Open before closing. Default: 2.
    pub success_threshold: u32,
    /// How long the circuit stays open before probing. Default: 60s.
    #[serde(rename = "reset_timeout_ms", deserialize_with = "millis")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    pub fn success_threshold(mut self, n: u32) -> Self {
        self.success_threshold = n;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

/// Error returned by a guarded call.
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    /// The circuit is open; the operation was not run.
    #[error("circuit breaker '{name}' is open, next attempt in {retry_in:?}")]
    Open { name: String, retry_in: Duration },

    /// The operation ran and failed with its own error.
    #[error("{0}")]
    Inner(E),
}

impl<E> CircuitError<E> {
    /// Whether this is the synthetic open-circuit rejection.
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitError::Open { .. })
    }

    /// The operation's own error, if it ran.
    pub fn inner(&self) -> Option<&E> {
        match self {
            CircuitError::Inner(e) => Some(e),
            CircuitError::Open { .. } => None,
        }
    }

    /// Consume into the operation's own error, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitError::Inner(e) => Some(e),
            CircuitError::Open { .. } => None,
        }
    }
}

impl<E: Classify> Classify for CircuitError<E> {
    fn failure_kind(&self) -> FailureKind {
        match self {
            CircuitError::Open { .. } => FailureKind::Other,
            CircuitError::Inner(e) => e.failure_kind(),
        }
    }
}

/// Point-in-time view of a breaker's state and counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    /// Consecutive failures counted while Closed.
    pub failure_count: u32,
    /// Consecutive successes counted while Half-Open.
    pub success_count: u32,
    /// Calls that ran the operation.
    pub total_calls: u64,
    /// Calls rejected while Open.
    pub total_rejections: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    next_attempt: Option<Instant>,
    total_calls: u64,
    total_rejections: u64,
}

/// Three-state circuit breaker.
///
/// Counters live behind a mutex that is never held across an `.await`.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            breaker = %name,
            failure_threshold = config.failure_threshold,
            success_threshold = config.success_threshold,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            "circuit breaker initialized"
        );

        Self {
            name,
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                next_attempt: None,
                total_calls: 0,
                total_rejections: 0,
            }),
        }
    }

    /// Bind a probe operation to this breaker.
    pub fn guard<F>(self, operation: F) -> Guarded<F> {
        Guarded {
            breaker: self,
            operation,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state.
    ///
    /// An Open circuit whose timeout has elapsed still reports Open until
    /// the next call moves it to Half-Open.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            total_calls: inner.total_calls,
            total_rejections: inner.total_rejections,
        }
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// The operation's error is passed through as [`CircuitError::Inner`].
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit()?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(CircuitError::Inner(err))
            }
        }
    }

    /// Force the circuit closed with zeroed counters.
    pub fn reset(&self) {
        let mut inner = self.lock();
        warn!(breaker = %self.name, from = %inner.state, "circuit breaker reset");
        self.transition(&mut inner, CircuitState::Closed);
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a call may run, moving Open to Half-Open once due.
    fn admit<E>(&self) -> Result<(), CircuitError<E>> {
        let mut inner = self.lock();
        if inner.state == CircuitState::Open {
            let now = Instant::now();
            let next_attempt = inner.next_attempt;
            match next_attempt {
                Some(at) if now < at => {
                    inner.total_rejections += 1;
                    metrics::counter!(
                        telemetry::CIRCUIT_REJECTIONS_TOTAL,
                        "breaker" => self.name.clone()
                    )
                    .increment(1);
                    debug!(breaker = %self.name, "call rejected, circuit open");
                    return Err(CircuitError::Open {
                        name: self.name.clone(),
                        retry_in: at - now,
                    });
                }
                _ => self.transition(&mut inner, CircuitState::HalfOpen),
            }
        }
        inner.total_calls += 1;
        Ok(())
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            // A concurrent call opened the circuit while this one ran.
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open),
            CircuitState::Open => {}
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        match to {
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.next_attempt = None;
                info!(breaker = %self.name, %from, "circuit breaker closed");
            }
            CircuitState::Open => {
                inner.success_count = 0;
                inner.next_attempt = Some(Instant::now() + self.config.reset_timeout);
                warn!(
                    breaker = %self.name,
                    %from,
                    failure_count = inner.failure_count,
                    reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
                    "circuit breaker opened, failing fast"
                );
            }
            CircuitState::HalfOpen => {
                inner.success_count = 0;
                info!(breaker = %self.name, "circuit breaker half-open, probing recovery");
            }
        }
        inner.state = to;
        metrics::counter!(
            telemetry::CIRCUIT_TRANSITIONS_TOTAL,
            "breaker" => self.name.clone(),
            "to" => to.as_str()
        )
        .increment(1);
    }
}

/// A [`CircuitBreaker`] bound to one probe operation.
///
/// ```rust
/// # use stockade::{CircuitBreaker, CircuitBreakerConfig, CircuitState, StockadeError};
/// # async fn demo() {
/// let health = CircuitBreaker::new("catalog-db", CircuitBreakerConfig::new())
///     .guard(|| async { Ok::<_, StockadeError>(()) });
/// health.execute().await.unwrap();
/// assert_eq!(health.state(), CircuitState::Closed);
/// # }
/// ```
#[derive(Debug)]
pub struct Guarded<F> {
    breaker: CircuitBreaker,
    operation: F,
}

impl<F> Guarded<F> {
    /// Run the bound operation through the breaker.
    pub async fn execute<Fut, T, E>(&self) -> Result<T, CircuitError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.breaker.call(&self.operation).await
    }

    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn reset(&self) {
        self.breaker.reset();
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}
