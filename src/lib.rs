#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # BGG Gateway
//!
//! Cached, rate-limited gateway in front of the BoardGameGeek XML catalog API.
//!
//! ## Overview
//!
//! The upstream API throttles aggressively and is slow, so every lookup goes through
//! a durable cache first. Misses are fetched through a strictly serial rate limiter
//! with exponential backoff on throttling. An administrator-triggered bulk job
//! refreshes monthly per-category snapshots of the top-ranked games.
//!
//! ## Module Organization
//!
//! - [`cache`] - Durable cache store (memory, Redis, no-op) behind one provider
//! - [`resilience`] - Serial rate limiter with retry and backoff
//! - [`upstream`] - Catalog API client and XML parsing
//! - [`dispatcher`] - Cache-aware request dispatcher with request coalescing
//! - [`metrics`] - Cache events, event log and derived metrics
//! - [`refresh`] - Bulk cache refresh job
//! - [`web`] - Axum HTTP surface
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - Structured logging setup and helpers
//! - [`error`] - Crate error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgg_gateway::config::ConfigManager;
//! use bgg_gateway::web::{create_app, state::AppState};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let state = AppState::from_config(Arc::new(manager.config().clone())).await?;
//! let app = create_app(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod refresh;
pub mod resilience;
pub mod upstream;
pub mod web;

pub use cache::{CacheProvider, Collection};
pub use config::{ConfigManager, GatewayConfig};
pub use dispatcher::{Dispatcher, DispatcherSettings};
pub use error::{GatewayError, GatewayResult};
pub use metrics::{CacheEventType, MetricsCollector};
pub use refresh::{Caller, RefreshJob};
pub use resilience::{RateLimiter, RateLimiterConfig};
pub use upstream::{BggClient, CatalogSource, SearchQuery, ThingQuery, UpstreamError};
