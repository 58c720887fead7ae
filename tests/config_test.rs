use std::io::Write;
use std::time::Duration;

use stockade::{ResilienceConfig, RetryOn, ServiceGuard, StockadeError};

const PRODUCTS_TOML: &str = r#"
[cache]
name = "products"
default_ttl_ms = 120000

[retry]
max_attempts = 5
initial_delay_ms = 25
retry_on = "always"

[circuit_breaker]
failure_threshold = 3
reset_timeout_ms = 15000
"#;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn load_from_file() {
    let file = write_config(PRODUCTS_TOML);

    let config = ResilienceConfig::load(file.path()).unwrap();

    assert_eq!(config.cache.name, "products");
    assert_eq!(config.cache.default_ttl, Duration::from_secs(120));
    // untouched keys keep their defaults
    assert_eq!(config.cache.sweep_interval, Duration::from_secs(60));
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.initial_delay, Duration::from_millis(25));
    assert_eq!(config.retry.max_delay, Duration::from_secs(5));
    assert_eq!(config.retry.retry_on, RetryOn::Always);
    assert_eq!(config.circuit_breaker.failure_threshold, 3);
    assert_eq!(config.circuit_breaker.success_threshold, 2);
    assert_eq!(config.circuit_breaker.reset_timeout, Duration::from_secs(15));
}

#[test]
fn load_missing_file_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = ResilienceConfig::load(&path).unwrap_err();

    assert!(matches!(err, StockadeError::Configuration(_)));
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn load_rejects_invalid_values() {
    let file = write_config("[circuit_breaker]\nsuccess_threshold = 0\n");

    let err = ResilienceConfig::load(file.path()).unwrap_err();

    assert!(err.to_string().contains("success_threshold"));
}

#[test]
fn unknown_duration_type_is_toml_error() {
    let file = write_config("[cache]\ndefault_ttl_ms = \"5m\"\n");

    let err = ResilienceConfig::load(file.path()).unwrap_err();

    assert!(matches!(err, StockadeError::Toml(_)));
}

#[tokio::test]
async fn loaded_config_builds_guard() {
    let file = write_config(PRODUCTS_TOML);
    let config = ResilienceConfig::load(file.path()).unwrap();

    let catalog: ServiceGuard<String> = ServiceGuard::from_config("catalog", &config);

    assert_eq!(catalog.cache().name(), "catalog");
    assert_eq!(catalog.breaker().config().failure_threshold, 3);
    assert_eq!(catalog.retry_config().retry_on, RetryOn::Always);
}
