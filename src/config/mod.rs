//! # Gateway Configuration System
//!
//! YAML-based configuration with environment-specific override sections and
//! `BGG_GATEWAY__*` environment variable overrides.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bgg_gateway::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let ttl = manager.config().cache.ttl();
//! let interactive = manager.config().rate_limiter.interactive.to_limiter_config();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{self, rate_limits};
use crate::resilience::RateLimiterConfig;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring gateway-config.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Durable cache store settings
    pub cache: CacheConfig,

    /// Upstream catalog API settings
    pub upstream: UpstreamConfig,

    /// The two independent rate limiter instances
    pub rate_limiter: RateLimiterSettings,

    /// Cache-aware dispatcher settings
    pub dispatcher: DispatcherConfig,

    /// Event log and derived metrics settings
    pub metrics: MetricsConfig,

    /// Bulk refresh job settings
    pub refresh: RefreshConfig,

    /// HTTP surface settings
    pub web: WebConfig,
}

/// Cache store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `memory`, `redis` or `noop`
    pub backend: String,
    pub ttl_seconds: u64,
    /// Upper bound per collection for the in-memory backend
    pub max_entries: usize,
    pub redis: Option<RedisConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            ttl_seconds: constants::CACHE_TTL.as_secs(),
            max_entries: constants::DEFAULT_MAX_CACHE_ENTRIES,
            redis: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_prefix")]
    pub key_prefix: String,
}

fn default_redis_prefix() -> String {
    "bgg".to_string()
}

/// Upstream catalog API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Per-HTTP-request timeout applied by the client
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://boardgamegeek.com/xmlapi2".to_string(),
            request_timeout_ms: 10_000,
            user_agent: format!("bgg-gateway/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// One rate limiter policy, expressed in milliseconds for YAML friendliness
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateLimitPolicy {
    pub min_spacing_ms: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    #[serde(default)]
    pub jitter_factor: f64,
}

impl RateLimitPolicy {
    pub fn interactive() -> Self {
        Self {
            min_spacing_ms: rate_limits::INTERACTIVE_MIN_SPACING.as_millis() as u64,
            max_retries: rate_limits::INTERACTIVE_MAX_RETRIES,
            base_delay_ms: rate_limits::INTERACTIVE_BASE_DELAY.as_millis() as u64,
            max_delay_ms: rate_limits::INTERACTIVE_MAX_DELAY.as_millis() as u64,
            jitter_factor: 0.0,
        }
    }

    pub fn bulk() -> Self {
        Self {
            min_spacing_ms: rate_limits::BULK_MIN_SPACING.as_millis() as u64,
            max_retries: rate_limits::BULK_MAX_RETRIES,
            base_delay_ms: rate_limits::BULK_BASE_DELAY.as_millis() as u64,
            max_delay_ms: rate_limits::BULK_MAX_DELAY.as_millis() as u64,
            jitter_factor: 0.0,
        }
    }

    /// Convert to the limiter's runtime configuration
    pub fn to_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            min_spacing: Duration::from_millis(self.min_spacing_ms),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter_factor: self.jitter_factor,
        }
    }

    fn validate(&self, name: &str) -> ConfigResult<()> {
        if self.base_delay_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                format!("rate_limiter.{name}.base_delay_ms"),
                "0",
                "base delay must be greater than 0",
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                format!("rate_limiter.{name}.max_delay_ms"),
                self.max_delay_ms.to_string(),
                "max delay must not be below the base delay",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigurationError::invalid_value(
                format!("rate_limiter.{name}.jitter_factor"),
                self.jitter_factor.to_string(),
                "jitter factor must be within 0.0..=1.0",
            ));
        }
        Ok(())
    }
}

/// The interactive (request path) and bulk (refresh job) limiter instances
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimiterSettings {
    pub interactive: RateLimitPolicy,
    pub bulk: RateLimitPolicy,
}

impl Default for RateLimiterSettings {
    fn default() -> Self {
        Self {
            interactive: RateLimitPolicy::interactive(),
            bulk: RateLimitPolicy::bulk(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub fetch_timeout_ms: u64,
    pub summary_interval: u64,
    pub coalesce_requests: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: constants::DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            summary_interval: constants::DEFAULT_SUMMARY_INTERVAL,
            coalesce_requests: true,
        }
    }
}

impl DispatcherConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub hit_rate_window: usize,
    pub memory_sample_size: usize,
    /// `memory` or `file`
    pub event_log: String,
    pub event_log_path: PathBuf,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            hit_rate_window: constants::DEFAULT_HIT_RATE_WINDOW,
            memory_sample_size: constants::DEFAULT_MEMORY_SAMPLE_SIZE,
            event_log: "memory".to_string(),
            event_log_path: PathBuf::from("log/cache-events.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub categories: Vec<String>,
    pub items_per_category: usize,
    pub item_delay_ms: u64,
    pub max_pages: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            categories: constants::refresh::CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            items_per_category: constants::refresh::ITEMS_PER_CATEGORY,
            item_delay_ms: constants::refresh::ITEM_DELAY.as_millis() as u64,
            max_pages: constants::refresh::MAX_PAGES,
        }
    }
}

impl RefreshConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
    pub request_timeout_ms: u64,
    /// Bearer tokens accepted for privileged endpoints
    pub admin_tokens: Vec<String>,
    /// Include internal error messages in responses (development only)
    pub expose_error_details: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_ms: 30_000,
            admin_tokens: Vec::new(),
            expose_error_details: false,
        }
    }
}

impl WebConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl GatewayConfig {
    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        match self.cache.backend.as_str() {
            "memory" | "in-memory" | "redis" | "noop" => {}
            other => {
                return Err(ConfigurationError::invalid_value(
                    "cache.backend",
                    other,
                    "expected one of memory, redis, noop",
                ))
            }
        }

        if self.cache.ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.ttl_seconds",
                "0",
                "ttl must be greater than 0",
            ));
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.max_entries",
                "0",
                "max entries must be greater than 0",
            ));
        }

        if self.cache.backend == "redis" && self.cache.redis.is_none() {
            return Err(ConfigurationError::validation_error(
                "cache.backend is redis but no [cache.redis] section is present",
            ));
        }

        if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            return Err(ConfigurationError::invalid_value(
                "upstream.base_url",
                self.upstream.base_url.clone(),
                "must be an http(s) URL",
            ));
        }

        self.rate_limiter.interactive.validate("interactive")?;
        self.rate_limiter.bulk.validate("bulk")?;

        if self.dispatcher.fetch_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatcher.fetch_timeout_ms",
                "0",
                "fetch timeout must be greater than 0",
            ));
        }

        if self.dispatcher.summary_interval == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatcher.summary_interval",
                "0",
                "summary interval must be greater than 0",
            ));
        }

        match self.metrics.event_log.as_str() {
            "memory" | "file" => {}
            other => {
                return Err(ConfigurationError::invalid_value(
                    "metrics.event_log",
                    other,
                    "expected memory or file",
                ))
            }
        }

        if self.refresh.categories.is_empty() {
            return Err(ConfigurationError::validation_error(
                "refresh.categories must list at least one category",
            ));
        }

        if self.refresh.items_per_category == 0 {
            return Err(ConfigurationError::invalid_value(
                "refresh.items_per_category",
                "0",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Settings that load cleanly but will not behave as written in this build
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.cache.backend == "redis" && !cfg!(feature = "cache-redis") {
            warnings.push(
                "cache.backend is redis but the 'cache-redis' feature is not enabled; \
                 the bounded in-memory store will be used"
                    .to_string(),
            );
        }
        if self.web.admin_tokens.is_empty() {
            warnings.push("web.admin_tokens is empty; admin endpoints reject every request".to_string());
        }
        warnings
    }
}
