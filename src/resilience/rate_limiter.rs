//! # Rate Limiter / Request Queue
//!
//! Serializes outbound calls through one limiter instance. Each request moves
//! through `Queued -> Running -> {Succeeded, Retrying, Failed}`:
//!
//! - **Queued**: waiting for the limiter's FIFO lock
//! - **Running**: holding the lock; only one request per instance at a time
//! - **Retrying**: still holding the lock while sleeping out a backoff delay
//!
//! The lock owns the completion time of the previous request, so the minimum
//! spacing is measured from the end of one call to the start of the next.

use super::backoff::BackoffPolicy;
use crate::constants::rate_limits;
use crate::logging::log_api_operation;
use crate::metrics::{CacheEventType, MetricsCollector};
use crate::upstream::UpstreamError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Runtime policy of one limiter instance
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Minimum delay between the end of one call and the start of the next
    pub min_spacing: Duration,
    /// Retries after the first attempt; total attempts are `max_retries + 1`
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl RateLimiterConfig {
    /// Request-path preset: 500ms spacing, 3 retries, 500ms..8s backoff
    pub fn interactive() -> Self {
        Self {
            min_spacing: rate_limits::INTERACTIVE_MIN_SPACING,
            max_retries: rate_limits::INTERACTIVE_MAX_RETRIES,
            base_delay: rate_limits::INTERACTIVE_BASE_DELAY,
            max_delay: rate_limits::INTERACTIVE_MAX_DELAY,
            jitter_factor: 0.0,
        }
    }

    /// Refresh-job preset: 15s spacing, 2 retries, 15s..60s backoff
    pub fn bulk() -> Self {
        Self {
            min_spacing: rate_limits::BULK_MIN_SPACING,
            max_retries: rate_limits::BULK_MAX_RETRIES,
            base_delay: rate_limits::BULK_BASE_DELAY,
            max_delay: rate_limits::BULK_MAX_DELAY,
            jitter_factor: 0.0,
        }
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.base_delay, self.max_delay).with_jitter(self.jitter_factor)
    }
}

/// Point-in-time view of a limiter's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterStats {
    pub name: String,
    pub queued: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub retries: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    running: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
}

/// Decrements a gauge on drop, so an aborted task never leaves it raised
struct GaugeGuard<'a>(&'a AtomicU64);

impl<'a> GaugeGuard<'a> {
    fn raise(gauge: &'a AtomicU64) -> Self {
        gauge.fetch_add(1, Ordering::SeqCst);
        Self(gauge)
    }
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    config: RateLimiterConfig,
    backoff: BackoffPolicy,
    /// Completion time of the previous request; holding the guard is `Running`
    last_completed: Mutex<Option<Instant>>,
    counters: Counters,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, config: RateLimiterConfig) -> Self {
        let name = name.into();
        debug!(
            limiter = %name,
            min_spacing_ms = config.min_spacing.as_millis() as u64,
            max_retries = config.max_retries,
            "Rate limiter initialized"
        );
        Self {
            name,
            backoff: config.backoff(),
            config,
            last_completed: Mutex::new(None),
            counters: Counters::default(),
            metrics: None,
        }
    }

    /// Report retries, successes and throttling to a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            name: self.name.clone(),
            queued: self.counters.queued.load(Ordering::SeqCst),
            running: self.counters.running.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            retries: self.counters.retries.load(Ordering::SeqCst),
        }
    }

    /// Run `call` once this request reaches the front of the queue,
    /// retrying throttling and transient failures with backoff.
    ///
    /// A 429 that persists past `max_retries` is returned as-is, so callers can
    /// recognise it as a rate-limit failure. Other 4xx responses fail at once.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut call: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, UpstreamError>> + Send,
        T: Send,
    {
        let mut last_completed = {
            let _queued = GaugeGuard::raise(&self.counters.queued);
            self.last_completed.lock().await
        };
        let _running = GaugeGuard::raise(&self.counters.running);

        if let Some(previous) = *last_completed {
            tokio::time::sleep_until(previous + self.config.min_spacing).await;
        }

        let started = Instant::now();
        let mut attempt: u32 = 0;
        let result = loop {
            attempt += 1;
            match call().await {
                Ok(value) => {
                    self.on_success(operation, attempt, started.elapsed()).await;
                    break Ok(value);
                }
                Err(error) => {
                    if error.is_rate_limited() {
                        if let Some(metrics) = &self.metrics {
                            metrics.record_rate_limit_error();
                        }
                    }

                    if error.is_retryable() && attempt <= self.config.max_retries {
                        let delay = self.backoff.delay_for_retry(attempt);
                        self.on_retry(operation, attempt, delay, &error).await;
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    self.counters.failed.fetch_add(1, Ordering::SeqCst);
                    log_api_operation(
                        &self.name,
                        operation,
                        attempt,
                        "failed",
                        Some(started.elapsed().as_millis() as u64),
                        Some(&error.to_string()),
                    );
                    break Err(error);
                }
            }
        };

        *last_completed = Some(Instant::now());
        result
    }

    async fn on_success(&self, operation: &str, attempts: u32, elapsed: Duration) {
        self.counters.completed.fetch_add(1, Ordering::SeqCst);
        let duration_ms = elapsed.as_millis() as u64;
        log_api_operation(&self.name, operation, attempts, "succeeded", Some(duration_ms), None);

        if let Some(metrics) = &self.metrics {
            metrics
                .record(
                    CacheEventType::ApiSuccess,
                    json!({
                        "limiter": self.name,
                        "operation": operation,
                        "attempts": attempts,
                        "durationMs": duration_ms,
                    }),
                )
                .await;
        }
    }

    async fn on_retry(&self, operation: &str, attempt: u32, delay: Duration, error: &UpstreamError) {
        self.counters.retries.fetch_add(1, Ordering::SeqCst);
        warn!(
            limiter = %self.name,
            operation = operation,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying upstream call"
        );

        if let Some(metrics) = &self.metrics {
            metrics
                .record(
                    CacheEventType::ApiRetry,
                    json!({
                        "limiter": self.name,
                        "operation": operation,
                        "attempt": attempt,
                        "delayMs": delay.as_millis() as u64,
                        "status": error.status(),
                        "error": error.to_string(),
                    }),
                )
                .await;
        }
    }
}
