//! Configuration loading and validation.

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::services::route_table::RouteTable;

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    /// `canonical_service.base_url` is blank
    #[error("Canonical service base_url cannot be empty")]
    EmptyBaseUrl,

    /// Base URL is not http(s)
    #[error("Invalid base_url: {0}. Must start with http:// or https://")]
    InvalidBaseUrl(String),

    /// Zero request timeout
    #[error("Invalid timeout_secs: {0}. Must be at least 1")]
    InvalidTimeout(u64),

    /// Non-positive request rate
    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    /// Unknown log level
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Zero retry budget
    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    /// Initial backoff not below the cap
    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    /// Named reconciliation setting is zero
    #[error("Invalid reconciliation setting {0}: must be greater than 0")]
    InvalidReconciliation(&'static str),

    /// Route templates failed validation
    #[error("Invalid route templates: {0}")]
    InvalidRoutes(String),
}

const ENV_PREFIX: &str = "STAGEGATE_";

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .stagegate/config.yaml
    /// 3. .stagegate/local.yaml (optional developer overrides)
    /// 4. Environment variables (STAGEGATE_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".stagegate/config.yaml"))
            .merge(Yaml::file(".stagegate/local.yaml"))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file. Environment variables still
    /// take precedence over the file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let base_url = config.canonical_service.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url.to_string()));
        }
        if config.canonical_service.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(0));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.rate_limit.requests_per_second <= 0.0 {
            return Err(ConfigError::InvalidRateLimit(
                config.rate_limit.requests_per_second,
            ));
        }

        if config.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }
        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        let reconciliation = &config.reconciliation;
        if reconciliation.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidReconciliation("poll_interval_ms"));
        }
        if reconciliation.resubscribe_interval_ms == 0 {
            return Err(ConfigError::InvalidReconciliation("resubscribe_interval_ms"));
        }
        if reconciliation.queue_capacity == 0 {
            return Err(ConfigError::InvalidReconciliation("queue_capacity"));
        }

        RouteTable::validate(&config.routes).map_err(ConfigError::InvalidRoutes)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.canonical_service.base_url, "http://localhost:8080");
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
canonical_service:
  base_url: https://canonical.example.com
  timeout_secs: 3
reconciliation:
  poll_interval_ms: 2000
routes:
  closing: /e/{engagement_id}/close
logging:
  level: debug
  format: pretty
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.canonical_service.timeout_secs, 3);
        assert_eq!(config.reconciliation.poll_interval_ms, 2000);
        assert_eq!(config.reconciliation.queue_capacity, 256);
        assert_eq!(config.routes.closing, "/e/{engagement_id}/close");
        assert_eq!(config.routes.pending, "/engagements/{engagement_id}/offerings");
        assert_eq!(config.logging.format, "pretty");
        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogFormat(format)) => assert_eq!(format, "xml"),
            other => panic!("Expected InvalidLogFormat error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.canonical_service.base_url = "  ".to_string();
        assert_eq!(ConfigLoader::validate(&config), Err(ConfigError::EmptyBaseUrl));

        config.canonical_service.base_url = "ftp://canonical".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_validate_backoff_ordering() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 5_000;
        config.retry.max_backoff_ms = 1_000;

        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(5_000, 1_000))
        );
    }

    #[test]
    fn test_validate_zero_intervals() {
        let mut config = Config::default();
        config.reconciliation.resubscribe_interval_ms = 0;

        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidReconciliation("resubscribe_interval_ms"))
        );
    }

    #[test]
    fn test_validate_route_placeholders() {
        let mut config = Config::default();
        config.routes.exit = "/projects".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRoutes(_))
        ));
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "canonical_service:\n  base_url: http://from-file:9000\nrate_limit:\n  requests_per_second: 2.5"
        )
        .unwrap();

        temp_env::with_var(
            "STAGEGATE_CANONICAL_SERVICE__BASE_URL",
            Some("http://from-env:9100"),
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.canonical_service.base_url, "http://from-env:9100");
                assert!((config.rate_limit.requests_per_second - 2.5).abs() < f64::EPSILON);
            },
        );
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigLoader::load_from_file(dir.path().join("absent.yaml"));
        assert!(result.is_err());
    }
}
