//! # Upstream Catalog API
//!
//! The [`CatalogSource`] seam over the board-game catalog service, its error
//! taxonomy, the reqwest-backed [`BggClient`] and XML parsing for detail and
//! listing documents.

pub mod client;
pub mod xml;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use client::BggClient;
pub use xml::{parse_game, parse_listing, CategoryRank, GameRecord, ListingItem};

/// Failure of a single upstream call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("BGG API rate limit exceeded (HTTP {status})")]
    RateLimited { status: u16 },

    #[error("BGG API server error (HTTP {status})")]
    Server { status: u16 },

    #[error("BGG API rejected the request (HTTP {status})")]
    Client { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream request timed out")]
    Timeout,

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited { status },
            500..=599 => Self::Server { status },
            _ => Self::Client { status },
        }
    }

    /// Throttling and transient failures are retried; other 4xx are fatal
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Network(_) | Self::Timeout
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { status } | Self::Server { status } | Self::Client { status } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Item search parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub search_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, search_type: impl Into<String>) -> Self {
        self.search_type = Some(search_type.into());
        self
    }

    pub fn with_exact(mut self, exact: impl Into<String>) -> Self {
        self.exact = Some(exact.into());
        self
    }

    /// Query pairs as sent upstream
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("query", self.query.clone())];
        if let Some(t) = &self.search_type {
            pairs.push(("type", t.clone()));
        }
        if let Some(e) = &self.exact {
            pairs.push(("exact", e.clone()));
        }
        pairs
    }

    /// Parameters as used in the cache key
    pub fn to_params(&self) -> Value {
        pairs_to_params(self.pairs())
    }
}

/// Item detail parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThingQuery {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<String>,
}

impl ThingQuery {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Detail lookup with ranking statistics, as the refresh job needs
    pub fn with_stats(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stats: Some("1".to_string()),
            versions: None,
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("id", self.id.clone())];
        if let Some(s) = &self.stats {
            pairs.push(("stats", s.clone()));
        }
        if let Some(v) = &self.versions {
            pairs.push(("versions", v.clone()));
        }
        pairs
    }

    pub fn to_params(&self) -> Value {
        pairs_to_params(self.pairs())
    }
}

fn pairs_to_params(pairs: Vec<(&'static str, String)>) -> Value {
    let map: Map<String, Value> = pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v)))
        .collect();
    Value::Object(map)
}

/// The upstream catalog service
///
/// Bodies are returned as raw XML strings; callers cache them opaquely.
#[async_trait]
pub trait CatalogSource: Send + Sync + 'static {
    async fn search(&self, query: &SearchQuery) -> Result<String, UpstreamError>;

    async fn thing(&self, query: &ThingQuery) -> Result<String, UpstreamError>;

    /// One page of the ranked listing for a category (pages start at 1)
    async fn category_page(&self, category: &str, page: u32) -> Result<String, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classification() {
        assert!(UpstreamError::from_status(429).is_rate_limited());
        assert!(UpstreamError::from_status(429).is_retryable());
        assert!(UpstreamError::from_status(503).is_retryable());
        assert!(!UpstreamError::from_status(404).is_retryable());
        assert!(!UpstreamError::from_status(400).is_rate_limited());
        assert!(UpstreamError::Network("reset".into()).is_retryable());
        assert!(UpstreamError::Timeout.is_retryable());
        assert!(!UpstreamError::InvalidResponse("bad".into()).is_retryable());
        assert_eq!(UpstreamError::from_status(502).status(), Some(502));
    }

    #[test]
    fn test_search_params_omit_absent_fields() {
        let q = SearchQuery::new("catan").with_type("boardgame");
        assert_eq!(q.to_params(), json!({"query": "catan", "type": "boardgame"}));
    }

    #[test]
    fn test_thing_with_stats() {
        let q = ThingQuery::with_stats("13");
        assert_eq!(q.to_params(), json!({"id": "13", "stats": "1"}));
    }
}
