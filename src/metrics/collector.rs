//! Process-wide metrics collector

use super::event_log::{EventLog, FileEventLog, MemoryEventLog};
use super::events::{CacheEvent, CacheEventType};
use crate::cache::{CacheProvider, Collection};
use crate::config::MetricsConfig;
use crate::constants;
use crate::error::{GatewayError, GatewayResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counter snapshot, also the periodic summary payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rate_limit_errors: u64,
    pub total_requests: u64,
    /// hits / (hits + misses) over the process lifetime
    pub hit_ratio: f64,
}

/// Derived metrics computed on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    #[serde(flatten)]
    pub counters: MetricsSummary,
    /// Hit fraction over the most recent hit/miss events
    pub cache_hit_rate: f64,
    /// Serialized bytes of the sampled cache entries
    pub memory_usage: u64,
    pub sampled_entries: usize,
    pub cached_entries: u64,
    pub last_refresh_date: Option<DateTime<Utc>>,
    pub cache_provider: String,
    pub event_log: String,
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    rate_limit_errors: AtomicU64,
    total_requests: AtomicU64,
}

#[derive(Debug)]
pub struct MetricsCollector {
    counters: Counters,
    event_log: Arc<dyn EventLog>,
    hit_rate_window: usize,
    memory_sample_size: usize,
    last_summary: Mutex<Option<MetricsSummary>>,
}

impl MetricsCollector {
    pub fn new(event_log: Arc<dyn EventLog>, hit_rate_window: usize, memory_sample_size: usize) -> Self {
        Self {
            counters: Counters::default(),
            event_log,
            hit_rate_window,
            memory_sample_size,
            last_summary: Mutex::new(None),
        }
    }

    /// Collector over a fresh in-memory event log with default windows
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryEventLog::new()),
            constants::DEFAULT_HIT_RATE_WINDOW,
            constants::DEFAULT_MEMORY_SAMPLE_SIZE,
        )
    }

    pub async fn from_config(config: &MetricsConfig) -> GatewayResult<Self> {
        let event_log: Arc<dyn EventLog> = match config.event_log.as_str() {
            "file" => Arc::new(
                FileEventLog::open(&config.event_log_path)
                    .await
                    .map_err(|e| GatewayError::Configuration(e.to_string()))?,
            ),
            _ => Arc::new(MemoryEventLog::new()),
        };

        info!(
            event_log = event_log.backend_name(),
            hit_rate_window = config.hit_rate_window,
            "Metrics collector initialized"
        );

        Ok(Self::new(
            event_log,
            config.hit_rate_window,
            config.memory_sample_size,
        ))
    }

    pub fn event_log(&self) -> &Arc<dyn EventLog> {
        &self.event_log
    }

    /// Append an event and trace it. Log failures are reported, never returned.
    pub async fn record(&self, event_type: CacheEventType, data: Value) {
        match event_type {
            CacheEventType::CacheHit => {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            }
            CacheEventType::CacheMiss => {
                self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        debug!(target: "bgg_gateway::events", event = %event_type, data = %data, "cache event");

        let event = CacheEvent::new(event_type, data);
        if let Err(e) = self.event_log.append(&event).await {
            warn!(event = %event_type, error = %e, "Failed to append cache event");
        }
    }

    pub fn record_rate_limit_error(&self) {
        self.counters.rate_limit_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one dispatched request, returning the new total
    pub fn begin_request(&self) -> u64 {
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> MetricsSummary {
        let cache_hits = self.counters.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.counters.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;
        MetricsSummary {
            cache_hits,
            cache_misses,
            rate_limit_errors: self.counters.rate_limit_errors.load(Ordering::Relaxed),
            total_requests: self.counters.total_requests.load(Ordering::Relaxed),
            hit_ratio: if lookups == 0 {
                0.0
            } else {
                cache_hits as f64 / lookups as f64
            },
        }
    }

    /// Log the aggregate counters and remember them as the latest summary
    pub fn emit_summary(&self) -> MetricsSummary {
        let summary = self.snapshot();
        info!(
            cache_hits = summary.cache_hits,
            cache_misses = summary.cache_misses,
            rate_limit_errors = summary.rate_limit_errors,
            total_requests = summary.total_requests,
            hit_ratio = summary.hit_ratio,
            "Cache metrics summary"
        );
        *self.last_summary.lock() = Some(summary.clone());
        summary
    }

    pub fn last_summary(&self) -> Option<MetricsSummary> {
        self.last_summary.lock().clone()
    }

    /// Hit fraction over the most recent `hit_rate_window` hit/miss events
    pub async fn cache_hit_rate(&self) -> f64 {
        let recent = match self
            .event_log
            .recent(
                &[CacheEventType::CacheHit, CacheEventType::CacheMiss],
                self.hit_rate_window,
            )
            .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Could not read event log for hit rate");
                return 0.0;
            }
        };

        if recent.is_empty() {
            return 0.0;
        }
        let hits = recent
            .iter()
            .filter(|e| e.event_type == CacheEventType::CacheHit)
            .count();
        hits as f64 / recent.len() as f64
    }

    /// Timestamp of the most recent `cache_refresh` event
    pub async fn last_refresh_date(&self) -> Option<DateTime<Utc>> {
        match self
            .event_log
            .recent(&[CacheEventType::CacheRefresh], 1)
            .await
        {
            Ok(events) => events.first().map(|e| e.timestamp),
            Err(e) => {
                warn!(error = %e, "Could not read event log for last refresh");
                None
            }
        }
    }

    /// Compute the derived metrics record from the event log and a store scan
    pub async fn derived_metrics(&self, store: &CacheProvider) -> CacheMetrics {
        let (memory_usage, sampled_entries) = match store
            .sample(Collection::ApiCache, self.memory_sample_size)
            .await
        {
            Ok(entries) => (
                entries.iter().map(|e| e.len() as u64).sum(),
                entries.len(),
            ),
            Err(e) => {
                warn!(error = %e, "Could not sample cache for memory usage");
                (0, 0)
            }
        };

        let cached_entries = store.count(Collection::ApiCache).await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not count cache entries");
            0
        });

        CacheMetrics {
            counters: self.snapshot(),
            cache_hit_rate: self.cache_hit_rate().await,
            memory_usage,
            sampled_entries,
            cached_entries,
            last_refresh_date: self.last_refresh_date().await,
            cache_provider: store.provider_name().to_string(),
            event_log: self.event_log.backend_name().to_string(),
        }
    }
}
