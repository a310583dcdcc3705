//! reqwest-backed catalog client

use super::{CatalogSource, SearchQuery, ThingQuery, UpstreamError};
use crate::config::UpstreamConfig;
use crate::constants::endpoints;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

/// HTTP client for the BoardGameGeek XML API
#[derive(Debug, Clone)]
pub struct BggClient {
    http: reqwest::Client,
    base_url: String,
}

impl BggClient {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| UpstreamError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_xml(
        &self,
        endpoint: &str,
        query: &[(&'static str, String)],
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let started = Instant::now();

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        debug!(
            endpoint = endpoint,
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Upstream response"
        );

        if !status.is_success() {
            return Err(UpstreamError::from_status(status.as_u16()));
        }

        response.text().await.map_err(map_transport_error)
    }
}

fn map_transport_error(error: reqwest::Error) -> UpstreamError {
    if error.is_timeout() {
        UpstreamError::Timeout
    } else if error.is_decode() || error.is_body() {
        UpstreamError::InvalidResponse(error.to_string())
    } else {
        UpstreamError::Network(error.to_string())
    }
}

#[async_trait]
impl CatalogSource for BggClient {
    async fn search(&self, query: &SearchQuery) -> Result<String, UpstreamError> {
        self.get_xml(endpoints::SEARCH, &query.pairs()).await
    }

    async fn thing(&self, query: &ThingQuery) -> Result<String, UpstreamError> {
        self.get_xml(endpoints::THING, &query.pairs()).await
    }

    async fn category_page(&self, category: &str, page: u32) -> Result<String, UpstreamError> {
        self.get_xml(
            endpoints::BROWSE,
            &[("category", category.to_string()), ("page", page.to_string())],
        )
        .await
    }
}
