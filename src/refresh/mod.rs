//! # Bulk Cache Refresh Job
//!
//! Repopulates category snapshots end to end. For each configured category, in
//! order: walk the paged listing until `items_per_category` items are collected,
//! fetch each item's details through the bulk rate limiter with a fixed delay
//! between items, store every game record, then store one snapshot document for
//! the category and month.
//!
//! One failed item is skipped; one failed category listing is skipped. Only an
//! unauthorized caller fails the run, before any upstream call.

pub mod coordinator;
pub mod snapshot;

use crate::cache::{CacheProvider, Collection};
use crate::config::RefreshConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::logging::{log_error, log_refresh_operation};
use crate::metrics::{CacheEventType, MetricsCollector};
use crate::resilience::RateLimiter;
use crate::upstream::{parse_game, parse_listing, CatalogSource, GameRecord, ListingItem, ThingQuery, UpstreamError};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use coordinator::{RefreshCoordinator, TriggerStatus};
pub use snapshot::{
    month_of, snapshot_key, CategoryOutcome, CategorySnapshot, CategoryStatus, FailedItem,
    RefreshReport,
};

/// Identity of whoever invokes a privileged operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub is_admin: bool,
}

impl Caller {
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            id: "anonymous".to_string(),
            is_admin: false,
        }
    }

    pub fn require_admin(&self, operation: &str) -> GatewayResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(GatewayError::permission_denied(format!(
                "{operation} requires an administrator"
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSettings {
    pub categories: Vec<String>,
    pub items_per_category: usize,
    pub item_delay: Duration,
    pub max_pages: u32,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self::from_config(&RefreshConfig::default())
    }
}

impl RefreshSettings {
    pub fn from_config(config: &RefreshConfig) -> Self {
        Self {
            categories: config.categories.clone(),
            items_per_category: config.items_per_category,
            item_delay: config.item_delay(),
            max_pages: config.max_pages.max(1),
        }
    }
}

/// Outcome of [`RefreshJob::initialize_cache`]
#[derive(Debug, Clone, PartialEq)]
pub enum InitializeOutcome {
    Refreshed(RefreshReport),
    /// Snapshots for the current month already exist
    Skipped { month: String },
}

pub struct RefreshJob {
    source: Arc<dyn CatalogSource>,
    limiter: Arc<RateLimiter>,
    store: CacheProvider,
    metrics: Arc<MetricsCollector>,
    settings: RefreshSettings,
}

impl std::fmt::Debug for RefreshJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshJob")
            .field("limiter", &self.limiter.name())
            .field("store", &self.store.provider_name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl RefreshJob {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        limiter: Arc<RateLimiter>,
        store: CacheProvider,
        metrics: Arc<MetricsCollector>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            source,
            limiter,
            store,
            metrics,
            settings,
        }
    }

    pub fn settings(&self) -> &RefreshSettings {
        &self.settings
    }

    /// Refresh every configured category
    pub async fn run(&self, caller: &Caller) -> GatewayResult<RefreshReport> {
        caller.require_admin("cache refresh")?;

        let started_at = Utc::now();
        let month = month_of(started_at);
        info!(
            caller = %caller.id,
            month = %month,
            categories = self.settings.categories.len(),
            "Starting bulk cache refresh"
        );

        let mut outcomes = Vec::with_capacity(self.settings.categories.len());
        for category in &self.settings.categories {
            let outcome = match self.refresh_category(category, &month).await {
                Ok(snapshot) => CategoryOutcome {
                    category: category.clone(),
                    status: CategoryStatus::Completed,
                    games: snapshot.total_games,
                    failed_items: snapshot.failed_items.len(),
                    error: None,
                },
                Err(e) => {
                    log_error("refresh", "category_listing", &e.to_string(), Some(category.as_str()));
                    CategoryOutcome {
                        category: category.clone(),
                        status: CategoryStatus::Failed,
                        games: 0,
                        failed_items: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let report = RefreshReport {
            month,
            started_at,
            finished_at: Utc::now(),
            categories: outcomes,
        };

        self.metrics
            .record(
                CacheEventType::CacheRefresh,
                json!({
                    "month": report.month,
                    "categories": report.categories.len(),
                    "failedCategories": report.failed_categories(),
                    "totalGames": report.total_games(),
                    "caller": caller.id,
                }),
            )
            .await;
        log_refresh_operation(None, "run", "completed", Some(report.total_games()), None);

        Ok(report)
    }

    /// Run unless the current month's snapshot for the first category exists
    pub async fn initialize_cache(
        &self,
        caller: &Caller,
        force: bool,
    ) -> GatewayResult<InitializeOutcome> {
        caller.require_admin("cache initialization")?;

        let month = month_of(Utc::now());
        if !force && self.is_populated(&month).await {
            info!(month = %month, "Cache already initialized, skipping refresh");
            return Ok(InitializeOutcome::Skipped { month });
        }

        self.run(caller).await.map(InitializeOutcome::Refreshed)
    }

    /// Whether the first category's snapshot for `month` is stored
    pub async fn is_populated(&self, month: &str) -> bool {
        let Some(first) = self.settings.categories.first() else {
            return false;
        };
        match self
            .store
            .get(Collection::Snapshots, &snapshot_key(first, month))
            .await
        {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(error = %e, "Could not check for existing snapshot");
                false
            }
        }
    }

    async fn refresh_category(
        &self,
        category: &str,
        month: &str,
    ) -> Result<CategorySnapshot, UpstreamError> {
        log_refresh_operation(Some(category), "listing", "started", None, None);
        let items = self.collect_listing(category).await?;

        let mut games: Vec<GameRecord> = Vec::with_capacity(items.len());
        let mut failed_items = Vec::new();

        for (index, item) in items.iter().enumerate() {
            if index > 0 && !self.settings.item_delay.is_zero() {
                tokio::time::sleep(self.settings.item_delay).await;
            }

            match self.fetch_game(&item.id).await {
                Ok(game) => {
                    if let Err(e) = self
                        .store
                        .put_document(Collection::Games, &game.id, &game)
                        .await
                    {
                        warn!(category = category, id = %game.id, error = %e, "Failed to store game record");
                    }
                    games.push(game);
                }
                Err(e) => {
                    warn!(category = category, id = %item.id, error = %e, "Skipping item after failed detail fetch");
                    failed_items.push(FailedItem {
                        id: item.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let snapshot = CategorySnapshot {
            category: category.to_string(),
            month: month.to_string(),
            total_games: games.len(),
            games,
            failed_items,
            refreshed_at: Utc::now(),
        };

        if let Err(e) = self
            .store
            .put_document(Collection::Snapshots, &snapshot_key(category, month), &snapshot)
            .await
        {
            log_error("refresh", "store_snapshot", &e.to_string(), Some(category));
        }

        log_refresh_operation(
            Some(category),
            "snapshot",
            "completed",
            Some(snapshot.total_games),
            (!snapshot.failed_items.is_empty())
                .then(|| format!("{} items skipped", snapshot.failed_items.len()))
                .as_deref(),
        );
        Ok(snapshot)
    }

    /// First `items_per_category` listing items, across at most `max_pages` pages
    async fn collect_listing(&self, category: &str) -> Result<Vec<ListingItem>, UpstreamError> {
        let wanted = self.settings.items_per_category;
        let mut items: Vec<ListingItem> = Vec::with_capacity(wanted);

        for page in 1..=self.settings.max_pages {
            let fetched = self
                .limiter
                .execute("browse", || self.source.category_page(category, page))
                .await
                .and_then(|xml| parse_listing(&xml));

            let page_items = match fetched {
                Ok(page_items) => page_items,
                Err(e) if items.is_empty() => return Err(e),
                Err(e) => {
                    warn!(category = category, page = page, error = %e, "Listing page failed, continuing with collected items");
                    break;
                }
            };

            if page_items.is_empty() {
                break;
            }
            for item in page_items {
                if !items.iter().any(|existing| existing.id == item.id) {
                    items.push(item);
                }
            }
            if items.len() >= wanted {
                break;
            }
        }

        items.truncate(wanted);
        Ok(items)
    }

    async fn fetch_game(&self, id: &str) -> Result<GameRecord, UpstreamError> {
        let query = ThingQuery::with_stats(id);
        let xml = self
            .limiter
            .execute("thing", || self.source.thing(&query))
            .await?;
        parse_game(&xml)
    }
}

impl Default for Caller {
    fn default() -> Self {
        Self::anonymous()
    }
}
