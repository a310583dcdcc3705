//! # Web API Application State
//!
//! Shared state for the HTTP handlers: the dispatcher with its interactive rate
//! limiter, the refresh coordinator with its bulk rate limiter, and configuration.

use crate::cache::CacheProvider;
use crate::config::GatewayConfig;
use crate::dispatcher::{Dispatcher, DispatcherSettings};
use crate::error::{GatewayError, GatewayResult};
use crate::metrics::MetricsCollector;
use crate::refresh::{RefreshCoordinator, RefreshJob, RefreshSettings};
use crate::resilience::RateLimiter;
use crate::upstream::{BggClient, CatalogSource};
use crate::web::response_types::ApiError;
use std::sync::Arc;
use tracing::info;

/// Shared application state for the web API
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,

    /// Per-request cache front for search and thing lookups
    pub dispatcher: Arc<Dispatcher>,

    /// Upstream catalog used for interactive requests
    pub source: Arc<dyn CatalogSource>,

    /// Runs the bulk refresh job in the background
    pub coordinator: Arc<RefreshCoordinator>,

    /// Rate limiter dedicated to the refresh job
    pub bulk_limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("dispatcher", &self.dispatcher)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build state against the real upstream API
    pub async fn from_config(config: Arc<GatewayConfig>) -> GatewayResult<Self> {
        let client = BggClient::from_config(&config.upstream)?;
        info!(base_url = %client.base_url(), "Upstream catalog client ready");
        Self::with_source(config, Arc::new(client)).await
    }

    /// Build state around any catalog source
    pub async fn with_source(
        config: Arc<GatewayConfig>,
        source: Arc<dyn CatalogSource>,
    ) -> GatewayResult<Self> {
        let store = CacheProvider::from_config_graceful(&config.cache).await;
        let metrics = Arc::new(MetricsCollector::from_config(&config.metrics).await?);
        Ok(Self::assemble(config, source, store, metrics))
    }

    /// Wire components that were built elsewhere
    pub fn assemble(
        config: Arc<GatewayConfig>,
        source: Arc<dyn CatalogSource>,
        store: CacheProvider,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let interactive = Arc::new(
            RateLimiter::new("interactive", config.rate_limiter.interactive.to_limiter_config())
                .with_metrics(Arc::clone(&metrics)),
        );
        let bulk_limiter = Arc::new(
            RateLimiter::new("bulk", config.rate_limiter.bulk.to_limiter_config())
                .with_metrics(Arc::clone(&metrics)),
        );

        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            interactive,
            Arc::clone(&metrics),
            DispatcherSettings::from_config(&config),
        ));

        let job = RefreshJob::new(
            Arc::clone(&source),
            Arc::clone(&bulk_limiter),
            store,
            metrics,
            RefreshSettings::from_config(&config.refresh),
        );

        Self {
            dispatcher,
            source,
            coordinator: Arc::new(RefreshCoordinator::new(Arc::new(job))),
            bulk_limiter,
            config,
        }
    }

    /// Convert a gateway error for the response, honouring `expose_error_details`
    pub fn api_error(&self, error: GatewayError) -> ApiError {
        ApiError::from_gateway(error, self.config.web.expose_error_details)
    }

    pub fn is_admin_token(&self, token: &str) -> bool {
        self.config
            .web
            .admin_tokens
            .iter()
            .any(|known| !known.is_empty() && known == token)
    }
}
