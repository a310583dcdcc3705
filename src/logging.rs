//! # Structured Logging Module
//!
//! Environment-aware structured logging. Development and test emit human-readable
//! console output; production emits one JSON object per line. `RUST_LOG` overrides
//! the environment's default level.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let console_layer = if environment == "production" {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .boxed()
        };

        // A subscriber may already be installed by an embedding host or test harness
        if tracing_subscriber::registry()
            .with(console_layer.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "Structured logging initialized"
        );
    });
}

fn get_environment() -> String {
    std::env::var("BGG_GATEWAY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        "test" => "warn",
        _ => "debug",
    }
}

/// Log a cache store operation
pub fn log_cache_operation(
    operation: &str,
    collection: &str,
    key: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::debug!(
        operation = %operation,
        collection = %collection,
        key = key,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "CACHE_OPERATION"
    );
}

/// Log an upstream API call as seen by a rate limiter
pub fn log_api_operation(
    limiter: &str,
    operation: &str,
    attempt: u32,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        limiter = %limiter,
        operation = %operation,
        attempt = attempt,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "API_OPERATION"
    );
}

/// Log progress of the bulk refresh job
pub fn log_refresh_operation(
    category: Option<&str>,
    operation: &str,
    status: &str,
    games: Option<usize>,
    details: Option<&str>,
) {
    tracing::info!(
        category = category,
        operation = %operation,
        status = %status,
        games = games,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "REFRESH_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
