use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use stockade::{
    FailureKind, RetryConfig, RetryOn, StockadeError, retry_with_backoff, retry_with_backoff_if,
    with_retry,
};
use tokio::time::Instant;

/// Mock backend that fails N times then succeeds.
struct FailThenSucceed {
    fail_count: AtomicU32,
    fail_with: fn(u32) -> StockadeError,
    total_calls: AtomicU32,
}

impl FailThenSucceed {
    fn new(failures: u32, fail_with: fn(u32) -> StockadeError) -> Self {
        Self {
            fail_count: AtomicU32::new(failures),
            fail_with,
            total_calls: AtomicU32::new(0),
        }
    }

    async fn query(&self) -> Result<&'static str, StockadeError> {
        let call = self.total_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let remaining = self.fail_count.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_count.fetch_sub(1, Ordering::SeqCst);
            return Err((self.fail_with)(call));
        }
        Ok("ok")
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::SeqCst)
    }
}

fn refused(call: u32) -> StockadeError {
    StockadeError::ConnectionRefused(format!("attempt {call}"))
}

fn timed_out(call: u32) -> StockadeError {
    StockadeError::Timeout(format!("attempt {call}"))
}

fn not_found(call: u32) -> StockadeError {
    StockadeError::Backend(format!("row missing, attempt {call}"))
}

fn fast() -> RetryConfig {
    RetryConfig::new().initial_delay(Duration::from_millis(1))
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn retry_config_defaults() {
    let config = RetryConfig::default();
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.initial_delay, Duration::from_millis(100));
    assert_eq!(config.max_delay, Duration::from_secs(5));
    assert_eq!(config.backoff_multiplier, 2.0);
    assert_eq!(config.retry_on, RetryOn::Transient);
}

#[test]
fn retry_config_builder() {
    let config = RetryConfig::new()
        .max_attempts(5)
        .initial_delay(Duration::from_millis(10))
        .max_delay(Duration::from_secs(1))
        .backoff_multiplier(4.0)
        .retry_on(RetryOn::Always);

    assert_eq!(config.max_attempts, 5);
    assert_eq!(config.initial_delay, Duration::from_millis(10));
    assert_eq!(config.max_delay, Duration::from_secs(1));
    assert_eq!(config.backoff_multiplier, 4.0);
    assert_eq!(config.retry_on, RetryOn::Always);
}

#[test]
fn retry_config_disabled() {
    assert_eq!(RetryConfig::disabled().max_attempts, 1);
}

#[test]
fn retry_config_delay_calculation() {
    let config = RetryConfig::new()
        .initial_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(10));

    // Exponential backoff: 100ms, 200ms, 400ms, 800ms, ...
    assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
    assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
    assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
    assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
}

#[test]
fn retry_config_delay_capped_at_max() {
    let config = RetryConfig::new()
        .initial_delay(Duration::from_secs(1))
        .max_delay(Duration::from_secs(5));

    // attempt 3 = 1 * 2^3 = 8s, but capped at 5s
    assert_eq!(config.delay_for_attempt(3), Duration::from_secs(5));
}

// ============================================================================
// retry_with_backoff
// ============================================================================

#[tokio::test(start_paused = true)]
async fn retries_transient_error_then_succeeds() {
    let backend = FailThenSucceed::new(2, refused);

    let result = retry_with_backoff(&fast(), || backend.query()).await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(backend.call_count(), 3); // 2 failures + 1 success
}

#[tokio::test(start_paused = true)]
async fn exhaustion_returns_last_error() {
    let backend = FailThenSucceed::new(u32::MAX, timed_out);

    let result = retry_with_backoff(&fast().max_attempts(3), || backend.query()).await;

    assert_eq!(backend.call_count(), 3);
    match result {
        Err(StockadeError::Timeout(msg)) => assert_eq!(msg, "attempt 3"),
        other => panic!("expected timeout from third attempt, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn non_retryable_error_fails_immediately() {
    let backend = FailThenSucceed::new(1, not_found);
    let start = Instant::now();

    let result = retry_with_backoff(&RetryConfig::new().max_attempts(5), || backend.query()).await;

    assert!(matches!(result, Err(StockadeError::Backend(_))));
    assert_eq!(backend.call_count(), 1); // no retry
    assert_eq!(start.elapsed(), Duration::ZERO); // no delay
}

#[tokio::test(start_paused = true)]
async fn success_on_first_attempt_has_no_delay() {
    let backend = FailThenSucceed::new(0, refused);
    let start = Instant::now();

    let result = retry_with_backoff(&RetryConfig::new(), || backend.query()).await;

    assert!(result.is_ok());
    assert_eq!(backend.call_count(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn waits_exponential_delays_between_attempts() {
    let backend = FailThenSucceed::new(u32::MAX, refused);
    let config = RetryConfig::new()
        .max_attempts(4)
        .initial_delay(Duration::from_millis(100))
        .max_delay(Duration::from_millis(250));
    let start = Instant::now();

    let _ = retry_with_backoff(&config, || backend.query()).await;

    // 100 + 200 + min(400, 250); no delay after the final attempt
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(550), "waited {elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "waited {elapsed:?}");
    assert_eq!(backend.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn disabled_config_no_retry() {
    let backend = FailThenSucceed::new(1, refused);

    let result = retry_with_backoff(&RetryConfig::disabled(), || backend.query()).await;

    assert!(result.is_err());
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_max_attempts_still_runs_once() {
    let backend = FailThenSucceed::new(0, refused);

    let result = retry_with_backoff(&RetryConfig::new().max_attempts(0), || backend.query()).await;

    assert!(result.is_ok());
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_on_kinds_filters() {
    let backend = FailThenSucceed::new(1, refused);
    let config = fast().retry_on(RetryOn::Kinds(vec![FailureKind::Timeout]));

    let result = retry_with_backoff(&config, || backend.query()).await;

    assert!(matches!(result, Err(StockadeError::ConnectionRefused(_))));
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_on_always_retries_permanent_errors() {
    let backend = FailThenSucceed::new(2, not_found);

    let result = retry_with_backoff(&fast().retry_on(RetryOn::Always), || backend.query()).await;

    assert!(result.is_ok());
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn io_errors_are_classified() {
    let calls = AtomicU32::new(0);

    let result: Result<(), std::io::Error> = retry_with_backoff(&fast(), || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Err(std::io::Error::from(std::io::ErrorKind::TimedOut)))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

// ============================================================================
// retry_with_backoff_if
// ============================================================================

#[tokio::test(start_paused = true)]
async fn custom_predicate_overrides_classification() {
    let backend = FailThenSucceed::new(2, not_found);

    let result = retry_with_backoff_if(
        &fast(),
        |err: &StockadeError| err.to_string().contains("row missing"),
        || backend.query(),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(backend.call_count(), 3);
}

// ============================================================================
// with_retry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn with_retry_wraps_zero_arg_operation() {
    let backend = FailThenSucceed::new(1, timed_out);
    let query = with_retry(|| backend.query(), fast());

    assert_eq!(query.call().await.unwrap(), "ok");
    assert_eq!(query.call().await.unwrap(), "ok");
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn with_retry_passes_input_to_each_attempt() {
    let calls = AtomicU32::new(0);
    let calls = &calls;
    let lookup = with_retry(
        move |id: String| async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StockadeError::ConnectionRefused(id))
            } else {
                Ok(format!("product {id}"))
            }
        },
        fast(),
    );

    let product = lookup.call_with("42".to_string()).await.unwrap();

    assert_eq!(product, "product 42");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(lookup.config().max_attempts, 3);
}
