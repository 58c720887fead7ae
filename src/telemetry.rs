//! Telemetry metric name constants.
//!
//! Centralised metric names for stockade components. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `stockade_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `cache`: cache name (from [`CacheConfig::name`](crate::CacheConfig))
//! - `breaker`: circuit breaker name
//! - `to`: target state of a breaker transition

/// Total cache hits.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "stockade_cache_hits_total";

/// Total cache misses (absent or expired).
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "stockade_cache_misses_total";

/// Total entries removed by pattern invalidation.
///
/// Labels: `cache`.
pub const CACHE_INVALIDATIONS_TOTAL: &str = "stockade_cache_invalidations_total";

/// Total retry attempts (not counting the initial attempt).
pub const RETRIES_TOTAL: &str = "stockade_retries_total";

/// Total circuit breaker state transitions.
///
/// Labels: `breaker`, `to` ("closed" | "open" | "half_open").
pub const CIRCUIT_TRANSITIONS_TOTAL: &str = "stockade_circuit_transitions_total";

/// Total calls rejected by an open circuit.
///
/// Labels: `breaker`.
pub const CIRCUIT_REJECTIONS_TOTAL: &str = "stockade_circuit_rejections_total";
