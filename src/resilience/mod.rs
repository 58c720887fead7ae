//! Resilience wrappers for outbound calls.
//!
//! - [`retry`]: exponential backoff around a single async operation.
//! - [`circuit_breaker`]: fast-fail guard for a backend known to be down.
//!
//! Both are thin: the wrapped operation's own error always reaches the
//! caller unchanged. The only error they add is [`CircuitError::Open`].

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitError, CircuitSnapshot, CircuitState, Guarded,
};
pub use retry::{
    RetryConfig, RetryOn, Retrying, retry_with_backoff, retry_with_backoff_if, with_retry,
};
