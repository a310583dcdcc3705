//! # Cache-Aware Request Dispatcher
//!
//! The single entry point for cached upstream requests. A request is looked up by
//! its cache key; on a miss the fetch runs through the interactive rate limiter
//! under a hard deadline and the result is written back to the store.
//!
//! Store failures never reach the caller: a failed read is a miss and a failed
//! write is skipped, both recorded as `cache_error` events. Fetch failures do
//! reach the caller, after an `api_error` event.
//!
//! Concurrent misses for one key share a single fetch (single-flight): the first
//! caller leads, later callers wait for the leader's outcome.

use crate::cache::{cache_key, CacheEntry, CacheProvider};
use crate::config::GatewayConfig;
use crate::constants::{self, endpoints};
use crate::error::{GatewayError, GatewayResult};
use crate::logging::log_cache_operation;
use crate::metrics::{CacheEventType, MetricsCollector};
use crate::resilience::RateLimiter;
use crate::upstream::{CatalogSource, SearchQuery, ThingQuery, UpstreamError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

type Outcome = Option<GatewayResult<Value>>;

#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherSettings {
    pub ttl: Duration,
    pub fetch_timeout: Duration,
    pub summary_interval: u64,
    pub coalesce_requests: bool,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            ttl: constants::CACHE_TTL,
            fetch_timeout: constants::DEFAULT_FETCH_TIMEOUT,
            summary_interval: constants::DEFAULT_SUMMARY_INTERVAL,
            coalesce_requests: true,
        }
    }
}

impl DispatcherSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            ttl: config.cache.ttl(),
            fetch_timeout: config.dispatcher.fetch_timeout(),
            summary_interval: config.dispatcher.summary_interval,
            coalesce_requests: config.dispatcher.coalesce_requests,
        }
    }
}

/// In-flight fetch registered under a cache key
#[derive(Debug, Clone)]
struct InflightFetch {
    id: u64,
    outcome: watch::Receiver<Outcome>,
}

enum Role {
    Leader(u64, watch::Sender<Outcome>),
    Follower(watch::Receiver<Outcome>),
}

/// Removes the leader's in-flight registration even if the leader is dropped
struct InflightSlot<'a> {
    inflight: &'a DashMap<String, InflightFetch>,
    key: &'a str,
    id: u64,
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        self.inflight.remove_if(self.key, |_, fetch| fetch.id == self.id);
    }
}

#[derive(Debug)]
pub struct Dispatcher {
    store: CacheProvider,
    limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsCollector>,
    settings: DispatcherSettings,
    inflight: DashMap<String, InflightFetch>,
    next_fetch_id: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        store: CacheProvider,
        limiter: Arc<RateLimiter>,
        metrics: Arc<MetricsCollector>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            store,
            limiter,
            metrics,
            settings,
            inflight: DashMap::new(),
            next_fetch_id: AtomicU64::new(1),
        }
    }

    pub fn store(&self) -> &CacheProvider {
        &self.store
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// Serve `(endpoint, params)` from the cache, or fetch it with `fetch`.
    ///
    /// `fetch` is invoked through the rate limiter, possibly several times when
    /// the upstream throttles or fails transiently.
    pub async fn handle_cached_request<F, Fut>(
        &self,
        endpoint: &str,
        params: Value,
        fetch: F,
    ) -> GatewayResult<Value>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, UpstreamError>> + Send + 'static,
    {
        let total = self.metrics.begin_request();
        let result = self.lookup_or_fetch(endpoint, params, fetch).await;

        if total % self.settings.summary_interval.max(1) == 0 {
            self.metrics.emit_summary();
        }
        result
    }

    /// Cached item search; returns the raw XML body
    pub async fn search(
        &self,
        source: &Arc<dyn CatalogSource>,
        query: SearchQuery,
    ) -> GatewayResult<String> {
        let params = query.to_params();
        let source = Arc::clone(source);
        let data = self
            .handle_cached_request(endpoints::SEARCH, params, move || {
                let source = Arc::clone(&source);
                let query = query.clone();
                async move { source.search(&query).await.map(Value::String) }
            })
            .await?;
        Ok(payload_to_string(data))
    }

    /// Cached item detail lookup; returns the raw XML body
    pub async fn thing(
        &self,
        source: &Arc<dyn CatalogSource>,
        query: ThingQuery,
    ) -> GatewayResult<String> {
        let params = query.to_params();
        let source = Arc::clone(source);
        let data = self
            .handle_cached_request(endpoints::THING, params, move || {
                let source = Arc::clone(&source);
                let query = query.clone();
                async move { source.thing(&query).await.map(Value::String) }
            })
            .await?;
        Ok(payload_to_string(data))
    }

    async fn lookup_or_fetch<F, Fut>(
        &self,
        endpoint: &str,
        params: Value,
        fetch: F,
    ) -> GatewayResult<Value>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, UpstreamError>> + Send + 'static,
    {
        let started = Instant::now();
        let key = cache_key(endpoint, &params);

        if let Some(data) = self.cached(endpoint, &key, started).await {
            return Ok(data);
        }

        self.metrics
            .record(
                CacheEventType::CacheMiss,
                json!({ "endpoint": endpoint, "key": key, "params": params }),
            )
            .await;

        if !self.settings.coalesce_requests {
            return self.lead(endpoint, &key, params, fetch, started).await;
        }

        match self.claim(&key) {
            Role::Leader(id, sender) => {
                let _slot = InflightSlot {
                    inflight: &self.inflight,
                    key: &key,
                    id,
                };
                let result = self.lead(endpoint, &key, params, fetch, started).await;
                sender.send_replace(Some(result.clone()));
                result
            }
            Role::Follower(mut receiver) => {
                let shared = match receiver.wait_for(Option::is_some).await {
                    Ok(outcome) => (*outcome).clone(),
                    Err(_) => None,
                };
                match shared {
                    Some(result) => {
                        self.record_performance(endpoint, &key, &result, false, true, started)
                            .await;
                        result
                    }
                    // Leader went away before publishing; fetch on our own
                    None => self.lead(endpoint, &key, params, fetch, started).await,
                }
            }
        }
    }

    fn claim(&self, key: &str) -> Role {
        match self.inflight.entry(key.to_string()) {
            Entry::Occupied(existing) => Role::Follower(existing.get().outcome.clone()),
            Entry::Vacant(vacant) => {
                let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                let (sender, outcome) = watch::channel(None);
                vacant.insert(InflightFetch { id, outcome });
                Role::Leader(id, sender)
            }
        }
    }

    /// Valid cached payload, if any. Store errors count as a miss.
    async fn cached(&self, endpoint: &str, key: &str, started: Instant) -> Option<Value> {
        match self.store.get_entry(key).await {
            Ok(Some(entry)) if entry.is_valid(self.settings.ttl) => {
                self.metrics
                    .record(
                        CacheEventType::CacheHit,
                        json!({ "endpoint": endpoint, "key": key, "ageMs": entry.age_ms() }),
                    )
                    .await;
                self.metrics
                    .record(
                        CacheEventType::CachePerformance,
                        json!({
                            "operation": endpoint,
                            "key": key,
                            "success": true,
                            "cached": true,
                            "durationMs": started.elapsed().as_millis() as u64,
                        }),
                    )
                    .await;
                Some(entry.data)
            }
            Ok(Some(entry)) => {
                debug!(key = key, age_ms = entry.age_ms(), "Cache entry expired");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = key, error = %e, "Cache read failed, treating as miss");
                log_cache_operation("get", "api_cache", Some(key), "error", Some(&e.to_string()));
                self.metrics
                    .record(
                        CacheEventType::CacheError,
                        json!({ "operation": "get", "key": key, "error": e.to_string() }),
                    )
                    .await;
                None
            }
        }
    }

    /// Fetch through the limiter under the deadline, then report the outcome
    async fn lead<F, Fut>(
        &self,
        endpoint: &str,
        key: &str,
        params: Value,
        fetch: F,
        started: Instant,
    ) -> GatewayResult<Value>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, UpstreamError>> + Send + 'static,
    {
        // Spawned so that a timed-out fetch keeps running and still fills the cache
        let task = tokio::spawn(fetch_and_store(
            self.store.clone(),
            Arc::clone(&self.limiter),
            Arc::clone(&self.metrics),
            endpoint.to_string(),
            key.to_string(),
            params,
            fetch,
        ));

        let result = match tokio::time::timeout(self.settings.fetch_timeout, task).await {
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err(upstream))) => Err(GatewayError::from(upstream)),
            Ok(Err(join_error)) => Err(GatewayError::Internal(format!(
                "fetch task failed: {join_error}"
            ))),
            Err(_) => Err(GatewayError::upstream_timeout()),
        };

        if let Err(error) = &result {
            self.metrics
                .record(
                    CacheEventType::ApiError,
                    json!({
                        "endpoint": endpoint,
                        "key": key,
                        "error": error.to_string(),
                        "rateLimited": error.is_rate_limited(),
                        "timeout": error.is_timeout(),
                    }),
                )
                .await;
        }
        self.record_performance(endpoint, key, &result, false, false, started)
            .await;
        result
    }

    async fn record_performance(
        &self,
        endpoint: &str,
        key: &str,
        result: &GatewayResult<Value>,
        cached: bool,
        coalesced: bool,
        started: Instant,
    ) {
        self.metrics
            .record(
                CacheEventType::CachePerformance,
                json!({
                    "operation": endpoint,
                    "key": key,
                    "success": result.is_ok(),
                    "cached": cached,
                    "coalesced": coalesced,
                    "durationMs": started.elapsed().as_millis() as u64,
                }),
            )
            .await;
    }
}

async fn fetch_and_store<F, Fut>(
    store: CacheProvider,
    limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsCollector>,
    endpoint: String,
    key: String,
    params: Value,
    fetch: F,
) -> Result<Value, UpstreamError>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Value, UpstreamError>> + Send + 'static,
{
    let data = limiter.execute(&endpoint, fetch).await?;

    let entry = CacheEntry::new(&endpoint, params, data.clone());
    debug_assert_eq!(entry.key, key);
    match store.put_entry(&entry).await {
        Ok(()) => {
            log_cache_operation("set", "api_cache", Some(&key), "stored", None);
            metrics
                .record(
                    CacheEventType::CacheSet,
                    json!({ "endpoint": endpoint, "key": key, "timestamp": entry.timestamp }),
                )
                .await;
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Cache write failed, serving uncached");
            metrics
                .record(
                    CacheEventType::CacheError,
                    json!({ "operation": "set", "key": key, "error": e.to_string() }),
                )
                .await;
        }
    }

    Ok(data)
}

/// Raw body of a cached payload
pub fn payload_to_string(data: Value) -> String {
    match data {
        Value::String(body) => body,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MemoryEventLog;
    use crate::resilience::RateLimiterConfig;
    use std::sync::atomic::AtomicU32;

    fn limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(
            "test",
            RateLimiterConfig {
                min_spacing: Duration::from_millis(1),
                max_retries: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                jitter_factor: 0.0,
            },
        ))
    }

    fn dispatcher(store: CacheProvider) -> (Dispatcher, Arc<MemoryEventLog>) {
        let log = Arc::new(MemoryEventLog::new());
        let metrics = Arc::new(MetricsCollector::new(log.clone(), 100, 100));
        (
            Dispatcher::new(store, limiter(), metrics, DispatcherSettings::default()),
            log,
        )
    }

    fn counting_fetch(
        calls: Arc<AtomicU32>,
    ) -> impl FnMut() -> std::future::Ready<Result<Value, UpstreamError>> + Send + 'static {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(Value::String("<items/>".to_string())))
        }
    }

    #[tokio::test]
    async fn test_store_read_and_write_failures_are_swallowed() {
        let (dispatcher, log) = dispatcher(CacheProvider::unavailable());
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let data = dispatcher
                .handle_cached_request("thing", json!({"id": "13"}), counting_fetch(calls.clone()))
                .await
                .unwrap();
            assert_eq!(data, json!("<items/>"));
        }

        // Every call misses and refetches
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let errors = log.events_of(CacheEventType::CacheError);
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0].data["operation"], "get");
        assert_eq!(errors[1].data["operation"], "set");
        assert!(log.events_of(CacheEventType::ApiError).is_empty());
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched_and_superseded() {
        let store = CacheProvider::memory(10);
        let params = json!({"id": "13"});
        let stale_ts = chrono::Utc::now().timestamp_millis() - constants::CACHE_TTL.as_millis() as i64 - 1;
        let stale = CacheEntry::with_timestamp("thing", params.clone(), json!("old"), stale_ts);
        store.put_entry(&stale).await.unwrap();

        let (dispatcher, log) = dispatcher(store.clone());
        let calls = Arc::new(AtomicU32::new(0));
        let data = dispatcher
            .handle_cached_request("thing", params, counting_fetch(calls.clone()))
            .await
            .unwrap();

        assert_eq!(data, json!("<items/>"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let fresh = store.get_entry(&stale.key).await.unwrap().unwrap();
        assert_eq!(fresh.data, json!("<items/>"));
        assert!(fresh.timestamp > stale_ts);
        assert_eq!(log.events_of(CacheEventType::CacheMiss).len(), 1);
        assert_eq!(log.events_of(CacheEventType::CacheSet).len(), 1);
    }

    #[tokio::test]
    async fn test_fatal_upstream_error_propagates_with_events() {
        let (dispatcher, log) = dispatcher(CacheProvider::memory(10));
        let result = dispatcher
            .handle_cached_request("thing", json!({"id": "0"}), || async {
                Err(UpstreamError::Client { status: 404 })
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Upstream(_))));
        assert_eq!(log.events_of(CacheEventType::ApiError).len(), 1);
        let perf = log.events_of(CacheEventType::CachePerformance);
        assert_eq!(perf.len(), 1);
        assert_eq!(perf[0].data["success"], false);
        assert_eq!(dispatcher.store().count(crate::cache::Collection::ApiCache).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_distinct_and_fetch_finishes_in_background() {
        let store = CacheProvider::memory(10);
        let log = Arc::new(MemoryEventLog::new());
        let metrics = Arc::new(MetricsCollector::new(log.clone(), 100, 100));
        let settings = DispatcherSettings {
            fetch_timeout: Duration::from_secs(10),
            ..DispatcherSettings::default()
        };
        let dispatcher = Dispatcher::new(store.clone(), limiter(), metrics, settings);

        let params = json!({"query": "slow"});
        let result = dispatcher
            .handle_cached_request("search", params.clone(), || async {
                tokio::time::sleep(Duration::from_secs(15)).await;
                Ok(json!("<items/>"))
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "BGG API timeout");

        // The fetch was not cancelled and eventually fills the cache
        tokio::time::sleep(Duration::from_secs(10)).await;
        let entry = store.get_entry(&cache_key("search", &params)).await.unwrap();
        assert_eq!(entry.map(|e| e.data), Some(json!("<items/>")));
    }

    #[tokio::test]
    async fn test_summary_every_interval() {
        let log = Arc::new(MemoryEventLog::new());
        let metrics = Arc::new(MetricsCollector::new(log, 100, 100));
        let settings = DispatcherSettings {
            summary_interval: 3,
            ..DispatcherSettings::default()
        };
        let dispatcher = Dispatcher::new(CacheProvider::memory(10), limiter(), metrics.clone(), settings);
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            dispatcher
                .handle_cached_request("thing", json!({"id": "1"}), counting_fetch(calls.clone()))
                .await
                .unwrap();
        }
        assert!(metrics.last_summary().is_none());

        dispatcher
            .handle_cached_request("thing", json!({"id": "1"}), counting_fetch(calls.clone()))
            .await
            .unwrap();
        let summary = metrics.last_summary().unwrap();
        assert_eq!(summary.total_requests, 3);
        assert_eq!(summary.cache_hits, 2);
        assert_eq!(summary.cache_misses, 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let (dispatcher, log) = dispatcher(CacheProvider::memory(10));
        let dispatcher = Arc::new(dispatcher);
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let dispatcher = Arc::clone(&dispatcher);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                dispatcher
                    .handle_cached_request("search", json!({"query": "catan"}), move || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(json!("<items/>"))
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), json!("<items/>"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(dispatcher.inflight.is_empty());

        let coalesced = log
            .events_of(CacheEventType::CachePerformance)
            .into_iter()
            .filter(|e| e.data["coalesced"] == true)
            .count();
        assert_eq!(coalesced, 4);
    }

    #[test]
    fn test_payload_to_string() {
        assert_eq!(payload_to_string(json!("<items/>")), "<items/>");
        assert_eq!(payload_to_string(json!({"a": 1})), r#"{"a":1}"#);
    }
}
