//! Cache provider
//!
//! Uses enum dispatch for zero-cost abstraction over the configured backend.
//! Consumers use `CacheProvider` and the typed document helpers; backend choice
//! and startup fallback are internal details.

use super::entry::{CacheEntry, Collection};
use super::errors::CacheResult;
use super::providers::{InMemoryCacheService, NoOpCacheService};
use super::traits::CacheService;
use crate::config::CacheConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

#[cfg(feature = "cache-redis")]
use super::providers::RedisCacheService;

/// Internal cache backend enum for zero-cost dispatch
#[derive(Debug, Clone)]
enum CacheBackend {
    /// Bounded in-process store
    Memory(InMemoryCacheService),

    /// Redis cache provider (boxed to reduce enum size)
    #[cfg(feature = "cache-redis")]
    Redis(Box<RedisCacheService>),

    /// No-op cache provider (always miss, always succeed)
    NoOp(NoOpCacheService),

    /// Every operation fails; exercises fail-soft paths
    #[cfg(test)]
    Unavailable,
}

#[cfg(test)]
fn unavailable<T>() -> CacheResult<T> {
    Err(super::errors::CacheError::ConnectionError(
        "store unavailable".to_string(),
    ))
}

macro_rules! dispatch {
    ($backend:expr, $svc:ident => $call:expr) => {
        match $backend {
            CacheBackend::Memory($svc) => $call,
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis($svc) => $call,
            CacheBackend::NoOp($svc) => $call,
            #[cfg(test)]
            CacheBackend::Unavailable => unavailable(),
        }
    };
}

/// Cache provider over the configured backend
#[derive(Debug, Clone)]
pub struct CacheProvider {
    backend: CacheBackend,
}

impl CacheProvider {
    /// Create a cache provider from configuration with graceful degradation
    ///
    /// If Redis is configured but unavailable (no connection, no `[cache.redis]`
    /// section, or the `cache-redis` feature is off), logs a warning and keeps a
    /// bounded in-memory store so responses are still cached. The gateway never
    /// fails to start due to cache issues.
    pub async fn from_config_graceful(config: &CacheConfig) -> Self {
        let backend = match config.backend.as_str() {
            "redis" => Self::create_redis_backend(config).await,
            "memory" | "in-memory" => {
                info!(
                    backend = "memory",
                    max_entries = config.max_entries,
                    "In-memory cache provider initialized"
                );
                CacheBackend::Memory(InMemoryCacheService::new(config.max_entries))
            }
            "noop" => {
                info!("Caching disabled by configuration");
                CacheBackend::NoOp(NoOpCacheService::new())
            }
            other => {
                warn!(backend = other, "Unknown cache backend, falling back to NoOp");
                CacheBackend::NoOp(NoOpCacheService::new())
            }
        };

        Self { backend }
    }

    fn redis_fallback(config: &CacheConfig) -> CacheBackend {
        CacheBackend::Memory(InMemoryCacheService::new(config.max_entries))
    }

    #[cfg(feature = "cache-redis")]
    async fn create_redis_backend(config: &CacheConfig) -> CacheBackend {
        let Some(redis_config) = &config.redis else {
            warn!("Redis cache selected but no [cache.redis] config found, falling back to memory");
            return Self::redis_fallback(config);
        };

        match RedisCacheService::from_config(redis_config).await {
            Ok(service) => {
                info!(backend = "redis", "Redis cache provider initialized");
                CacheBackend::Redis(Box::new(service))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    max_entries = config.max_entries,
                    "Failed to connect to Redis, falling back to in-memory cache"
                );
                Self::redis_fallback(config)
            }
        }
    }

    #[cfg(not(feature = "cache-redis"))]
    async fn create_redis_backend(config: &CacheConfig) -> CacheBackend {
        warn!(
            max_entries = config.max_entries,
            "Redis cache backend requested but 'cache-redis' feature not enabled, using in-memory cache"
        );
        Self::redis_fallback(config)
    }

    /// Bounded in-memory provider
    pub fn memory(max_entries: usize) -> Self {
        Self {
            backend: CacheBackend::Memory(InMemoryCacheService::new(max_entries)),
        }
    }

    /// Disabled provider
    pub fn noop() -> Self {
        Self {
            backend: CacheBackend::NoOp(NoOpCacheService::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn unavailable() -> Self {
        Self {
            backend: CacheBackend::Unavailable,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match &self.backend {
            CacheBackend::Memory(s) => s.provider_name(),
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.provider_name(),
            CacheBackend::NoOp(s) => s.provider_name(),
            #[cfg(test)]
            CacheBackend::Unavailable => "unavailable",
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, CacheBackend::NoOp(_))
    }

    pub async fn get(&self, collection: Collection, key: &str) -> CacheResult<Option<String>> {
        dispatch!(&self.backend, s => s.get(collection, key).await)
    }

    pub async fn set(&self, collection: Collection, key: &str, value: &str) -> CacheResult<()> {
        dispatch!(&self.backend, s => s.set(collection, key, value).await)
    }

    pub async fn delete(&self, collection: Collection, key: &str) -> CacheResult<()> {
        dispatch!(&self.backend, s => s.delete(collection, key).await)
    }

    pub async fn sample(&self, collection: Collection, limit: usize) -> CacheResult<Vec<String>> {
        dispatch!(&self.backend, s => s.sample(collection, limit).await)
    }

    pub async fn count(&self, collection: Collection) -> CacheResult<u64> {
        dispatch!(&self.backend, s => s.count(collection).await)
    }

    pub async fn health_check(&self) -> CacheResult<bool> {
        dispatch!(&self.backend, s => s.health_check().await)
    }

    /// Read a cached API response, regardless of age
    pub async fn get_entry(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        self.get_document(Collection::ApiCache, key).await
    }

    /// Write a cached API response under its own key
    pub async fn put_entry(&self, entry: &CacheEntry) -> CacheResult<()> {
        self.put_document(Collection::ApiCache, &entry.key, entry)
            .await
    }

    pub async fn get_document<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> CacheResult<Option<T>> {
        match self.get(collection, key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn put_document<T: Serialize + ?Sized>(
        &self,
        collection: Collection,
        key: &str,
        document: &T,
    ) -> CacheResult<()> {
        let raw = serde_json::to_string(document)?;
        self.set(collection, key, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigManager, RedisConfig};
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_memory_backend_from_config() {
        let config = CacheConfig::default();
        let provider = CacheProvider::from_config_graceful(&config).await;
        assert_eq!(provider.provider_name(), "memory");
        assert!(provider.is_enabled());
    }

    #[tokio::test]
    async fn test_unknown_backend_falls_back_to_noop() {
        let config = CacheConfig {
            backend: "memcached".to_string(),
            ..CacheConfig::default()
        };
        let provider = CacheProvider::from_config_graceful(&config).await;
        assert_eq!(provider.provider_name(), "noop");
        assert!(!provider.is_enabled());
    }

    #[tokio::test]
    async fn test_unreachable_redis_keeps_a_memory_store() {
        let config = CacheConfig {
            backend: "redis".to_string(),
            max_entries: 8,
            redis: Some(RedisConfig {
                url: "redis://127.0.0.1:1".to_string(),
                key_prefix: "bgg".to_string(),
            }),
            ..CacheConfig::default()
        };
        let provider = CacheProvider::from_config_graceful(&config).await;
        assert_eq!(provider.provider_name(), "memory");
        assert!(provider.is_enabled());
    }

    #[tokio::test]
    async fn test_production_environment_caches_responses() {
        let config_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
        let manager = ConfigManager::load_with_overrides(
            Some(config_dir),
            "production",
            Some(HashMap::new()),
        )
        .unwrap();
        assert_eq!(manager.config().cache.backend, "redis");

        let provider = CacheProvider::from_config_graceful(&manager.config().cache).await;
        assert!(provider.is_enabled());

        provider
            .set(Collection::ApiCache, "k", "v")
            .await
            .unwrap();
        assert_eq!(
            provider.get(Collection::ApiCache, "k").await.unwrap(),
            Some("v".to_string())
        );
    }

    #[tokio::test]
    async fn test_entry_roundtrip_preserves_data() {
        let provider = CacheProvider::memory(16);
        let entry = CacheEntry::new(
            "search",
            json!({"query": "catan", "type": "boardgame"}),
            json!("<items total=\"1\"/>"),
        );
        provider.put_entry(&entry).await.unwrap();

        let first = provider.get_entry(&entry.key).await.unwrap().unwrap();
        let second = provider.get_entry(&entry.key).await.unwrap().unwrap();
        assert_eq!(first, entry);
        assert_eq!(second.data, entry.data);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_serialization_error() {
        let provider = CacheProvider::memory(16);
        provider
            .set(Collection::ApiCache, "broken", "{not json")
            .await
            .unwrap();
        let result = provider.get_entry("broken").await;
        assert!(matches!(
            result,
            Err(crate::cache::CacheError::SerializationError(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_backend_errors() {
        let provider = CacheProvider::unavailable();
        assert!(provider.get_entry("any").await.is_err());
        assert!(provider.health_check().await.is_err());
    }
}
