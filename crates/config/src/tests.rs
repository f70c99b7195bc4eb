use figment::Figment;
use figment::providers::{Format, Toml};
use secrecy::{ExposeSecret, Secret};

use crate::{AppConfig, RedisConfig};

const MINIMAL: &str = r#"
app_name = "user-service"

[redis]
url = "redis://127.0.0.1:6379"

[bus]
brokers = "localhost:9092"
queue = "user-service.cache"

[jwt]
secret = "dev-secret"
"#;

#[test]
fn test_defaults_are_applied() {
    let config = AppConfig::from_figment(Figment::new().merge(Toml::string(MINIMAL))).unwrap();

    assert_eq!(config.app_env, "development");
    assert!(config.is_development());
    assert_eq!(config.bus.exchange, "");
    assert_eq!(config.bus.publish_timeout_ms, 5000);
    assert_eq!(config.bus.max_in_flight, 64);
    assert_eq!(config.redis.connection_timeout().as_millis(), 5000);
    assert_eq!(config.redis.response_timeout().as_millis(), 2000);
    assert_eq!(config.cache.user_ttl_secs, 3600);
    assert_eq!(config.cache.quiz_ttl_secs, 1800);
    assert_eq!(config.jwt.access_ttl_secs, 900);
    assert_eq!(config.jwt.refresh_ttl_secs, 604800);
    assert_eq!(config.telemetry.log_level, "info");
    assert_eq!(config.telemetry.metrics_addr, None);
    assert_eq!(config.jwt.secret.expose_secret(), "dev-secret");
}

#[test]
fn test_later_sources_override() {
    let overrides = r#"
app_env = "production"

[redis]
url = "redis://127.0.0.1:6379"
response_timeout_ms = 250

[cache]
user_ttl_secs = 60
"#;
    let config = AppConfig::from_figment(
        Figment::new()
            .merge(Toml::string(MINIMAL))
            .merge(Toml::string(overrides)),
    )
    .unwrap();

    assert!(config.is_production());
    assert_eq!(config.cache.user_ttl().as_secs(), 60);
    assert_eq!(config.cache.quiz_ttl_secs, 1800);
    assert_eq!(config.redis.response_timeout().as_millis(), 250);
    assert_eq!(config.redis.connection_timeout_ms, 5000);
}

#[test]
fn test_missing_required_section_fails() {
    let result = AppConfig::from_figment(Figment::new().merge(Toml::string("app_name = \"x\"")));
    assert!(result.is_err());
}

#[test]
fn test_secret_redaction() {
    let config = RedisConfig {
        url: Secret::new("redis://:hunter2@localhost:6379".to_string()),
        key_prefix: None,
        connection_timeout_ms: 5000,
        response_timeout_ms: 2000,
    };
    let debug_output = format!("{:?}", config);
    assert!(!debug_output.contains("hunter2"));
    assert!(debug_output.contains("REDACTED"));
}
