//! Redis cache provider
//!
//! Uses `redis::aio::ConnectionManager` for async multiplexed connections.
//! Documents live under `{key_prefix}:{collection}:{key}` and are stored without
//! a Redis TTL; validity is decided by readers. Requires the `cache-redis` feature.

use crate::cache::entry::Collection;
use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::CacheService;
use crate::config::loader::redact_url_credentials;
use crate::config::RedisConfig;
use tracing::debug;

const SCAN_BATCH: usize = 100;

/// Redis-backed cache service using ConnectionManager
#[derive(Clone)]
pub struct RedisCacheService {
    connection_manager: redis::aio::ConnectionManager,
    key_prefix: String,
}

impl std::fmt::Debug for RedisCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheService")
            .field("connection_manager", &"ConnectionManager")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisCacheService {
    pub async fn from_config(config: &RedisConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {e}"))
        })?;

        let connection_manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::ConnectionError(format!("Failed to connect to Redis: {e}")))?;

        debug!(url = %redact_url_credentials(&config.url), "Redis cache service connected");

        Ok(Self {
            connection_manager,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn full_key(&self, collection: Collection, key: &str) -> String {
        format!("{}:{}:{}", self.key_prefix, collection.as_str(), key)
    }

    fn collection_pattern(&self, collection: Collection) -> String {
        format!("{}:{}:*", self.key_prefix, collection.as_str())
    }

    /// SCAN keys of a collection, stopping once `limit` keys are collected
    async fn scan_keys(&self, collection: Collection, limit: Option<usize>) -> CacheResult<Vec<String>> {
        let mut conn = self.connection_manager.clone();
        let pattern = self.collection_pattern(collection);
        let mut found = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::BackendError(format!("Redis SCAN failed: {e}")))?;

            found.extend(keys);
            if let Some(limit) = limit {
                if found.len() >= limit {
                    found.truncate(limit);
                    break;
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(found)
    }
}

impl CacheService for RedisCacheService {
    async fn get(&self, collection: Collection, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("GET")
            .arg(self.full_key(collection, key))
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis GET failed: {e}")))
    }

    async fn set(&self, collection: Collection, key: &str, value: &str) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("SET")
            .arg(self.full_key(collection, key))
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis SET failed: {e}")))
    }

    async fn delete(&self, collection: Collection, key: &str) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("DEL")
            .arg(self.full_key(collection, key))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis DEL failed: {e}")))
    }

    async fn sample(&self, collection: Collection, limit: usize) -> CacheResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let keys = self.scan_keys(collection, Some(limit)).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connection_manager.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis MGET failed: {e}")))?;

        Ok(values.into_iter().flatten().collect())
    }

    async fn count(&self, collection: Collection) -> CacheResult<u64> {
        Ok(self.scan_keys(collection, None).await?.len() as u64)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.connection_manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis PING failed: {e}")))?;

        Ok(pong == "PONG")
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Requires a running Redis; skipped when none is reachable
    #[tokio::test]
    async fn test_redis_crud_when_available() {
        let config = RedisConfig {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: format!("bgg-test-{}", uuid::Uuid::new_v4()),
        };
        let connect = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            RedisCacheService::from_config(&config),
        )
        .await;
        let Ok(Ok(svc)) = connect else {
            return;
        };

        svc.set(Collection::Games, "13", r#"{"id":"13"}"#).await.unwrap();
        assert_eq!(
            svc.get(Collection::Games, "13").await.unwrap(),
            Some(r#"{"id":"13"}"#.to_string())
        );
        assert_eq!(svc.count(Collection::Games).await.unwrap(), 1);
        assert_eq!(svc.sample(Collection::Games, 5).await.unwrap().len(), 1);

        svc.delete(Collection::Games, "13").await.unwrap();
        assert_eq!(svc.get(Collection::Games, "13").await.unwrap(), None);
    }
}
