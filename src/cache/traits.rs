//! Cache service trait definition

use super::entry::Collection;
use super::errors::CacheResult;

/// Trait defining durable store operations
///
/// Values are serialized documents addressed by `(collection, key)`. Entries are
/// never expired by the store itself; TTL validity is checked by readers.
pub trait CacheService: Send + Sync {
    /// Get a document by key
    ///
    /// Returns `Ok(Some(value))` when present, `Ok(None)` when absent.
    fn get(
        &self,
        collection: Collection,
        key: &str,
    ) -> impl std::future::Future<Output = CacheResult<Option<String>>> + Send;

    /// Store a document, superseding any previous value under the key
    fn set(
        &self,
        collection: Collection,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Delete a specific key
    fn delete(
        &self,
        collection: Collection,
        key: &str,
    ) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Return up to `limit` stored documents from a collection
    fn sample(
        &self,
        collection: Collection,
        limit: usize,
    ) -> impl std::future::Future<Output = CacheResult<Vec<String>>> + Send;

    /// Number of documents stored in a collection
    fn count(
        &self,
        collection: Collection,
    ) -> impl std::future::Future<Output = CacheResult<u64>> + Send;

    /// Check if the backend is healthy
    fn health_check(&self) -> impl std::future::Future<Output = CacheResult<bool>> + Send;

    /// Get the name of the cache provider
    fn provider_name(&self) -> &'static str;
}
