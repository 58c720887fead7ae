//! Stockade - caching and resilience toolkit for storefront services
//!
//! Small building blocks wrapped around calls into a persistence layer:
//!
//! - [`TtlCache`]: per-entry TTL cache with pattern invalidation
//! - [`retry_with_backoff`] / [`with_retry`]: exponential backoff retry
//! - [`CircuitBreaker`]: fast-fail guard for a failing backend
//! - [`chunk`], [`batch_get`], [`batch_fetch`], [`parallel_batch`]: batching
//!   helpers
//! - [`ServiceGuard`]: all of the above composed for one service
//!
//! # Example
//!
//! ```rust,no_run
//! use stockade::{ServiceGuard, StockadeError};
//!
//! # async fn find_product(id: u64) -> Result<String, StockadeError> {
//! #     Ok(format!("product {id}"))
//! # }
//! #[tokio::main]
//! async fn main() -> stockade::Result<()> {
//!     let products = ServiceGuard::<String>::builder("products").build();
//!
//!     let product = products
//!         .fetch("products:42", || find_product(42))
//!         .await
//!         .map_err(|e| StockadeError::Backend(e.to_string()))?;
//!     println!("{product}");
//!
//!     // after a write
//!     products.invalidate("products")?;
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod resilience;
pub mod telemetry;

// Re-export main types at crate root
pub use error::{Classify, FailureKind, Result, StockadeError};

pub use batch::{DEFAULT_CONCURRENCY, Keyed, batch_fetch, batch_get, chunk, parallel_batch};
pub use cache::{CacheConfig, InvalidationPattern, TtlCache};
pub use config::ResilienceConfig;
pub use guard::{ServiceGuard, ServiceGuardBuilder};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitError, CircuitSnapshot, CircuitState, Guarded,
    RetryConfig, RetryOn, Retrying, retry_with_backoff, retry_with_backoff_if, with_retry,
};
