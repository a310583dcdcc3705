//! Shared test doubles and builders for the integration tests
#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use bgg_gateway::cache::CacheProvider;
use bgg_gateway::config::GatewayConfig;
use bgg_gateway::metrics::{MemoryEventLog, MetricsCollector};
use bgg_gateway::resilience::{RateLimiter, RateLimiterConfig};
use bgg_gateway::upstream::{CatalogSource, SearchQuery, ThingQuery, UpstreamError};
use bgg_gateway::web::{create_app, state::AppState};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// One recorded upstream invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Search(String),
    Thing(String),
    Page { category: String, page: u32 },
}

/// In-process catalog that answers from a script and records every call
#[derive(Default)]
pub struct ScriptedCatalog {
    calls: Mutex<Vec<Call>>,
    search_script: Mutex<VecDeque<Result<String, UpstreamError>>>,
    search_fallback: Option<UpstreamError>,
    listings: HashMap<String, Vec<Vec<String>>>,
    failing_items: HashSet<String>,
    delay: Option<Duration>,
}

impl ScriptedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every search fails with `error`
    pub fn failing_searches(mut self, error: UpstreamError) -> Self {
        self.search_fallback = Some(error);
        self
    }

    /// Queue search answers, consumed before the default behaviour
    pub fn with_search_script(self, script: Vec<Result<String, UpstreamError>>) -> Self {
        *self.search_script.lock() = script.into();
        self
    }

    /// Listing pages for a category, each page a list of item ids
    pub fn with_listing(mut self, category: &str, pages: Vec<Vec<&str>>) -> Self {
        self.listings.insert(
            category.to_string(),
            pages
                .into_iter()
                .map(|page| page.into_iter().map(str::to_string).collect())
                .collect(),
        );
        self
    }

    /// Detail lookups for `id` fail with a server error
    pub fn with_failing_item(mut self, id: &str) -> Self {
        self.failing_items.insert(id.to_string());
        self
    }

    /// Every call sleeps first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn thing_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Thing(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    async fn enter(&self, call: Call) {
        self.calls.lock().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn search_body(query: &str) -> String {
    format!(r#"<items total="1"><item type="boardgame" id="13"><name type="primary" value="{query}"/></item></items>"#)
}

pub fn game_body(id: &str) -> String {
    format!(
        r#"<items><item type="boardgame" id="{id}"><name type="primary" value="Game {id}"/><yearpublished value="2001"/><statistics><ratings><ranks><rank type="subtype" name="boardgame" friendlyname="Board Game Rank" value="{id}"/></ranks></ratings></statistics></item></items>"#
    )
}

#[async_trait]
impl CatalogSource for ScriptedCatalog {
    async fn search(&self, query: &SearchQuery) -> Result<String, UpstreamError> {
        self.enter(Call::Search(query.query.clone())).await;
        if let Some(scripted) = self.search_script.lock().pop_front() {
            return scripted;
        }
        match &self.search_fallback {
            Some(error) => Err(error.clone()),
            None => Ok(search_body(&query.query)),
        }
    }

    async fn thing(&self, query: &ThingQuery) -> Result<String, UpstreamError> {
        self.enter(Call::Thing(query.id.clone())).await;
        if self.failing_items.contains(&query.id) {
            return Err(UpstreamError::Server { status: 500 });
        }
        Ok(game_body(&query.id))
    }

    async fn category_page(&self, category: &str, page: u32) -> Result<String, UpstreamError> {
        self.enter(Call::Page {
            category: category.to_string(),
            page,
        })
        .await;
        let pages = self
            .listings
            .get(category)
            .ok_or(UpstreamError::Server { status: 503 })?;
        let items = pages
            .get(page.saturating_sub(1) as usize)
            .map(|ids| {
                ids.iter()
                    .map(|id| format!(r#"<item id="{id}" name="Game {id}"/>"#))
                    .collect::<String>()
            })
            .unwrap_or_default();
        Ok(format!("<items>{items}</items>"))
    }
}

/// Limiter with millisecond timings and the given retry budget
pub fn fast_limiter(name: &str, max_retries: u32) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(name, fast_limiter_config(max_retries)))
}

pub fn fast_limiter_config(max_retries: u32) -> RateLimiterConfig {
    RateLimiterConfig {
        min_spacing: Duration::from_millis(5),
        max_retries,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        jitter_factor: 0.0,
    }
}

pub fn memory_metrics() -> (Arc<MetricsCollector>, Arc<MemoryEventLog>) {
    let log = Arc::new(MemoryEventLog::new());
    (Arc::new(MetricsCollector::new(log.clone(), 100, 100)), log)
}

pub const ADMIN_TOKEN: &str = "integration-admin-token";

/// Configuration with fast limiters, memory store and one admin token
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.cache.backend = "memory".to_string();
    config.metrics.event_log = "memory".to_string();
    for policy in [
        &mut config.rate_limiter.interactive,
        &mut config.rate_limiter.bulk,
    ] {
        policy.min_spacing_ms = 5;
        policy.base_delay_ms = 10;
        policy.max_delay_ms = 40;
    }
    config.rate_limiter.interactive.max_retries = 3;
    config.rate_limiter.bulk.max_retries = 1;
    config.dispatcher.fetch_timeout_ms = 5_000;
    config.refresh.categories = vec!["boardgame".to_string()];
    config.refresh.items_per_category = 2;
    config.refresh.item_delay_ms = 0;
    config.refresh.max_pages = 1;
    config.web.bind_address = "127.0.0.1:0".to_string();
    config.web.admin_tokens = vec![ADMIN_TOKEN.to_string()];
    config
}

pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    pub log: Arc<MemoryEventLog>,
}

/// Serve the app on an ephemeral port around `source`
pub async fn spawn_server(config: GatewayConfig, source: Arc<ScriptedCatalog>) -> TestServer {
    let (metrics, log) = memory_metrics();
    let store = CacheProvider::memory(config.cache.max_entries);
    let state = AppState::assemble(Arc::new(config), source, store, metrics);
    let app = create_app(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        state,
        log,
    }
}
