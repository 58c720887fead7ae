//! Caching subsystem.
//!
//! - [`TtlCache`]: string-keyed store with per-entry TTL, background
//!   sweep and pattern invalidation. One instance per logical service
//!   (products, orders, reviews), injected where it is needed.
//!
//! - [`InvalidationPattern`]: literal or regex key selector used after
//!   writes, e.g. drop every `"products"` key once a product changes.

pub mod pattern;
pub mod ttl;

pub use pattern::InvalidationPattern;
pub use ttl::{CacheConfig, TtlCache};
