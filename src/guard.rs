//! Per-service composition of cache, circuit breaker and retry.
//!
//! A product, order or review service owns one [`ServiceGuard`] and routes
//! its reads through [`fetch`](ServiceGuard::fetch):
//!
//! 1. cache hit → return it, the backend is not touched
//! 2. circuit open → fail fast with [`CircuitError::Open`]
//! 3. otherwise run the operation under [`retry_with_backoff`]; the whole
//!    retry sequence counts as one breaker outcome
//! 4. on success, store the value with the cache's default TTL
//!
//! Writes call [`invalidate`](ServiceGuard::invalidate) with the key prefix
//! they affect. Guards are constructed explicitly and passed to the code
//! that needs them; a breaker may be shared between guards that talk to the
//! same backend by handing each the same `Arc<CircuitBreaker>`.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::Result;
use crate::cache::{CacheConfig, InvalidationPattern, TtlCache};
use crate::config::ResilienceConfig;
use crate::error::Classify;
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitError, RetryConfig, retry_with_backoff,
};

/// Cache + circuit breaker + retry policy for one logical service.
pub struct ServiceGuard<V> {
    cache: TtlCache<V>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
}

impl<V> ServiceGuard<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Assemble a guard from already-built parts.
    pub fn new(cache: TtlCache<V>, breaker: Arc<CircuitBreaker>, retry: RetryConfig) -> Self {
        Self {
            cache,
            breaker,
            retry,
        }
    }

    /// Start building a guard named `name`.
    pub fn builder(name: impl Into<String>) -> ServiceGuardBuilder<V> {
        ServiceGuardBuilder::new(name)
    }

    /// Build a guard from a loaded [`ResilienceConfig`].
    ///
    /// `name` overrides the cache name and names the breaker.
    pub fn from_config(name: impl Into<String>, config: &ResilienceConfig) -> Self {
        Self::builder(name)
            .cache(config.cache.clone())
            .retry(config.retry.clone())
            .circuit_breaker(config.circuit_breaker.clone())
            .build()
    }

    /// Read through the cache, then breaker and retry on a miss.
    pub async fn fetch<F, Fut, E>(
        &self,
        key: &str,
        operation: F,
    ) -> std::result::Result<V, CircuitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Classify,
    {
        if let Some(value) = self.cache.get(key) {
            return Ok(value);
        }
        let value = self.load(operation).await?;
        self.cache.set(key, value.clone());
        Ok(value)
    }

    /// [`fetch`](Self::fetch) storing the result with an explicit TTL.
    pub async fn fetch_with_ttl<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        operation: F,
    ) -> std::result::Result<V, CircuitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Classify,
    {
        if let Some(value) = self.cache.get(key) {
            return Ok(value);
        }
        let value = self.load(operation).await?;
        self.cache.set_with_ttl(key, value.clone(), ttl);
        Ok(value)
    }

    async fn load<F, Fut, E>(&self, operation: F) -> std::result::Result<V, CircuitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Classify,
    {
        let retry = &self.retry;
        self.breaker
            .call(|| retry_with_backoff(retry, operation))
            .await
    }

    /// Drop cached entries after a write. Returns how many were removed.
    pub fn invalidate(&self, pattern: impl Into<InvalidationPattern>) -> Result<usize> {
        self.cache.invalidate(pattern)
    }

    /// Drop one cached entry.
    pub fn delete(&self, key: &str) {
        self.cache.delete(key);
    }

    pub fn cache(&self) -> &TtlCache<V> {
        &self.cache
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }
}

/// Builder for [`ServiceGuard`].
///
/// ```rust
/// # use stockade::{CircuitBreakerConfig, RetryConfig, ServiceGuard};
/// # use std::time::Duration;
/// let products = ServiceGuard::<String>::builder("products")
///     .default_ttl(Duration::from_secs(120))
///     .retry(RetryConfig::new().max_attempts(4))
///     .circuit_breaker(CircuitBreakerConfig::new().failure_threshold(3))
///     .build();
/// assert_eq!(products.cache().name(), "products");
/// ```
pub struct ServiceGuardBuilder<V> {
    name: String,
    cache: CacheConfig,
    retry: RetryConfig,
    breaker: BreakerSource,
    _value: PhantomData<fn() -> V>,
}

enum BreakerSource {
    Config(CircuitBreakerConfig),
    Shared(Arc<CircuitBreaker>),
}

impl<V> ServiceGuardBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            breaker: BreakerSource::Config(CircuitBreakerConfig::default()),
            _value: PhantomData,
        }
    }

    /// Replace the cache configuration. Its name is overridden at build time.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Set the cache's default TTL.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.cache.default_ttl = ttl;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Give the guard its own breaker with this configuration.
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = BreakerSource::Config(config);
        self
    }

    /// Use an existing breaker, shared with other guards.
    pub fn shared_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = BreakerSource::Shared(breaker);
        self
    }

    /// Build the guard. Starts the cache's background sweep when a tokio
    /// runtime is available.
    pub fn build(self) -> ServiceGuard<V> {
        let breaker = match self.breaker {
            BreakerSource::Config(config) => {
                Arc::new(CircuitBreaker::new(self.name.clone(), config))
            }
            BreakerSource::Shared(breaker) => breaker,
        };
        let cache = TtlCache::new(self.cache.name(self.name));
        ServiceGuard::new(cache, breaker, self.retry)
    }
}
