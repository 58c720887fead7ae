//! In-memory key/value cache with per-entry TTL.
//!
//! [`TtlCache`] stores computed results under caller-chosen string keys
//! (e.g. `"products:42"`, `"orders:list:page=2"`). Each entry carries its own
//! time-to-live; readers never observe an entry at or past its expiry.
//!
//! # Expiry
//!
//! Every entry stores the instant it expires. Expired entries are removed in
//! two ways: lazily, when a read finds one, and eagerly by a background sweep
//! that runs every [`sweep_interval`](CacheConfig::sweep_interval) and
//! deletes every entry past its expiry. The sweep task is owned by the cache
//! and aborted on [`destroy`](TtlCache::destroy) or drop.
//!
//! moka holds the entries and enforces the optional size bound; it does not
//! track expiry.
//!
//! # Concurrent misses
//!
//! [`get_or_compute`](TtlCache::get_or_compute) does not coalesce concurrent
//! misses: two tasks racing on a cold key both run their computation and the
//! last write wins.

use std::future::Future;
use std::time::{Duration, Instant};

use moka::sync::Cache;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::pattern::InvalidationPattern;
use crate::config::millis;
use crate::{Result, telemetry};

/// Configuration for a [`TtlCache`].
///
/// ```rust
/// # use stockade::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .name("products")
///     .default_ttl(Duration::from_secs(60))
///     .sweep_interval(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name used in logs and metric labels. Default: "default".
    pub name: String,
    /// TTL applied when a write does not specify one. Default: 5 minutes.
    #[serde(rename = "default_ttl_ms", deserialize_with = "millis")]
    pub default_ttl: Duration,
    /// Period of the background sweep. Zero disables it. Default: 60s.
    #[serde(rename = "sweep_interval_ms", deserialize_with = "millis")]
    pub sweep_interval: Duration,
    /// Optional size bound, enforced by moka's TinyLFU policy. Default: unbounded.
    pub max_entries: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            default_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            max_entries: None,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the TTL used by [`TtlCache::set`] and [`TtlCache::get_or_compute`].
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the background sweep period.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Bound the number of entries.
    ///
    /// Enforced by moka's TinyLFU policy: once full, a new entry may be
    /// rejected rather than an old one evicted.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = Some(n);
        self
    }
}

/// Stored value plus the instant it stops being visible.
#[derive(Clone)]
struct Stamped<V> {
    value: V,
    /// `None` when `now + ttl` is not representable; such entries never expire.
    expires_at: Option<Instant>,
}

impl<V> Stamped<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// String-keyed cache with per-entry TTL and pattern invalidation.
///
/// Cheap to share behind an `Arc`. Construct one per logical service and
/// hand it to the components that need it.
pub struct TtlCache<V> {
    name: String,
    default_ttl: Duration,
    entries: Cache<String, Stamped<V>>,
    sweeper: Option<JoinHandle<()>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache and start its background sweep.
    ///
    /// The sweep needs a tokio runtime. Outside one, the cache still works
    /// but relies on lazy expiry only.
    pub fn new(config: CacheConfig) -> Self {
        let mut builder = Cache::builder().name(&config.name);
        if let Some(max) = config.max_entries {
            builder = builder.max_capacity(max);
        }
        let entries = builder.build();
        let sweeper = spawn_sweeper(&config.name, entries.clone(), config.sweep_interval);

        Self {
            name: config.name,
            default_ttl: config.default_ttl,
            entries,
            sweeper,
        }
    }

    /// Cache name as configured.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store `value` under `key` with the default TTL, replacing any entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store `value` under `key`, visible for `ttl` from now.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.insert(key.into(), Stamped::new(value, ttl));
    }

    /// Look up an unexpired value. An expired entry found here is removed.
    pub fn get(&self, key: &str) -> Option<V> {
        match self.live(key) {
            Some(value) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => self.name.clone())
                    .increment(1);
                Some(value)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => self.name.clone())
                    .increment(1);
                None
            }
        }
    }

    /// Whether `get(key)` would return a value. Removes an expired entry.
    pub fn has(&self, key: &str) -> bool {
        self.live(key).is_some()
    }

    fn live(&self, key: &str) -> Option<V> {
        let stamped = self.entries.get(key)?;
        if stamped.is_expired(Instant::now()) {
            self.entries.invalidate(key);
            trace!(cache = %self.name, key, "expired entry removed on read");
            return None;
        }
        Some(stamped.value)
    }

    /// Remove `key` if present.
    pub fn delete(&self, key: &str) {
        self.entries.invalidate(key);
    }

    /// Remove every live key matching `pattern`. Returns how many were removed.
    ///
    /// ```rust
    /// # use stockade::{CacheConfig, TtlCache};
    /// let cache = TtlCache::new(CacheConfig::new());
    /// cache.set("products:1", 1);
    /// cache.set("orders:1", 2);
    /// assert_eq!(cache.invalidate("products").unwrap(), 1);
    /// assert!(cache.has("orders:1"));
    /// ```
    pub fn invalidate(&self, pattern: impl Into<InvalidationPattern>) -> Result<usize> {
        let pattern = pattern.into();
        let re = pattern.to_regex()?;

        let matched: Vec<_> = self
            .entries
            .iter()
            .filter(|(key, _)| re.is_match(key))
            .map(|(key, _)| key)
            .collect();
        for key in &matched {
            self.entries.invalidate(key.as_str());
        }

        debug!(
            cache = %self.name,
            pattern = re.as_str(),
            removed = matched.len(),
            "invalidated cache keys"
        );
        metrics::counter!(telemetry::CACHE_INVALIDATIONS_TOTAL, "cache" => self.name.clone())
            .increment(matched.len() as u64);
        Ok(matched.len())
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    /// Number of stored entries.
    ///
    /// Approximate: counts expired entries that no read or sweep has
    /// removed yet.
    pub fn size(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Alias for [`size`](Self::size).
    pub fn len(&self) -> u64 {
        self.size()
    }

    /// Whether [`size`](Self::size) is zero.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Remove every entry past its expiry now. Returns how many were removed.
    ///
    /// The background task runs the same pass on each tick.
    pub fn sweep(&self) -> usize {
        sweep_expired(&self.name, &self.entries)
    }

    /// Return the cached value for `key`, or compute, store and return it.
    ///
    /// Errors from `compute` are returned unchanged and nothing is stored.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        compute: F,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        self.get_or_compute_with_ttl(key, self.default_ttl, compute).await
    }

    /// [`get_or_compute`](Self::get_or_compute) with an explicit TTL.
    pub async fn get_or_compute_with_ttl<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = compute().await?;
        self.set_with_ttl(key, value.clone(), ttl);
        Ok(value)
    }

    /// Stop the background sweep and drop all entries.
    ///
    /// The cache stays usable afterwards, with lazy expiry only.
    pub fn destroy(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.abort();
        }
        self.clear();
        debug!(cache = %self.name, "cache destroyed");
    }
}

impl<V> Drop for TtlCache<V> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

/// Spawn the periodic sweep on the current runtime, if there is one.
fn spawn_sweeper<V>(
    name: &str,
    entries: Cache<String, Stamped<V>>,
    interval: Duration,
) -> Option<JoinHandle<()>>
where
    V: Clone + Send + Sync + 'static,
{
    if interval.is_zero() {
        return None;
    }
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        debug!(cache = name, "no tokio runtime, background sweep disabled");
        return None;
    };

    let name = name.to_owned();
    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_expired(&name, &entries);
        }
    }))
}

fn sweep_expired<V>(name: &str, entries: &Cache<String, Stamped<V>>) -> usize
where
    V: Clone + Send + Sync + 'static,
{
    let now = Instant::now();
    let expired: Vec<_> = entries
        .iter()
        .filter(|(_, stamped)| stamped.is_expired(now))
        .map(|(key, _)| key)
        .collect();
    for key in &expired {
        entries.invalidate(key.as_str());
    }
    entries.run_pending_tasks();

    trace!(
        cache = name,
        removed = expired.len(),
        remaining = entries.entry_count(),
        "cache swept"
    );
    expired.len()
}
