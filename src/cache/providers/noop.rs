//! No-op cache provider
//!
//! Always returns None/success. Used when caching is disabled or when Redis
//! is unavailable at startup (graceful degradation).

use crate::cache::entry::Collection;
use crate::cache::errors::CacheResult;
use crate::cache::traits::CacheService;

/// No-op cache service that never stores anything
#[derive(Debug, Clone, Default)]
pub struct NoOpCacheService;

impl NoOpCacheService {
    pub fn new() -> Self {
        Self
    }
}

impl CacheService for NoOpCacheService {
    async fn get(&self, _collection: Collection, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _collection: Collection, _key: &str, _value: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _collection: Collection, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn sample(&self, _collection: Collection, _limit: usize) -> CacheResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn count(&self, _collection: Collection) -> CacheResult<u64> {
        Ok(0)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }
}
