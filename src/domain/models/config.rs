//! Application configuration model.

use serde::{Deserialize, Serialize};

/// Main configuration structure for Stagegate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Canonical state service connection
    #[serde(default)]
    pub canonical_service: CanonicalServiceConfig,

    /// Retry policy for canonical service calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Client-side throttle for canonical service calls
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Fallback reconciliation when the event bridge is unavailable
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,

    /// Route templates per stage
    #[serde(default)]
    pub routes: RoutesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Canonical state service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CanonicalServiceConfig {
    /// Base URL, without the `/engagement/...` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

impl Default for CanonicalServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    250
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests per second allowed against the canonical service
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
}

const fn default_requests_per_second() -> f64 {
    5.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Reconciliation (poll-based self-healing) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReconciliationConfig {
    /// Interval between resync calls while the bridge is down
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Interval between attempts to re-open the bridge subscription
    #[serde(default = "default_resubscribe_interval_ms")]
    pub resubscribe_interval_ms: u64,

    /// Capacity of each guard's command queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

const fn default_poll_interval_ms() -> u64 {
    15_000
}

const fn default_resubscribe_interval_ms() -> u64 {
    5_000
}

const fn default_queue_capacity() -> usize {
    256
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            resubscribe_interval_ms: default_resubscribe_interval_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Route templates. `{engagement_id}` and `{resource_id}` are substituted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RoutesConfig {
    /// Offerings, shown while nothing is under negotiation
    #[serde(default = "default_pending_route")]
    pub pending: String,

    /// Negotiation workspace
    #[serde(default = "default_negotiating_route")]
    pub negotiating: String,

    /// Closing page
    #[serde(default = "default_closing_route")]
    pub closing: String,

    /// Stage after approval, before a resource exists
    #[serde(default = "default_post_approval_route")]
    pub post_approval: String,

    /// Route out of the workflow once a quote has a linked resource
    #[serde(default = "default_exit_route")]
    pub exit: String,
}

fn default_pending_route() -> String {
    "/engagements/{engagement_id}/offerings".to_string()
}

fn default_negotiating_route() -> String {
    "/engagements/{engagement_id}/negotiation".to_string()
}

fn default_closing_route() -> String {
    "/engagements/{engagement_id}/closing".to_string()
}

fn default_post_approval_route() -> String {
    "/engagements/{engagement_id}/approved".to_string()
}

fn default_exit_route() -> String {
    "/projects/{resource_id}".to_string()
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            pending: default_pending_route(),
            negotiating: default_negotiating_route(),
            closing: default_closing_route(),
            post_approval: default_post_approval_route(),
            exit: default_exit_route(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling JSON log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
