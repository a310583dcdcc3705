//! Bounded in-memory cache provider
//!
//! Single-process store for development, tests and single-instance deployments.
//! Each collection holds at most `max_entries` documents; inserting a new key into
//! a full collection evicts the oldest inserted key. Overwriting an existing key
//! keeps its original insertion position, so eviction stays O(1).

use crate::cache::entry::Collection;
use crate::cache::errors::CacheResult;
use crate::cache::traits::CacheService;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct Bucket {
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

impl Bucket {
    fn insert(&mut self, key: &str, value: &str, max_entries: usize) -> Option<String> {
        if let Some(existing) = self.entries.get_mut(key) {
            *existing = value.to_string();
            return None;
        }

        let mut evicted = None;
        while self.entries.len() >= max_entries {
            match self.order.pop_front() {
                Some(oldest) => {
                    if self.entries.remove(&oldest).is_some() {
                        evicted = Some(oldest);
                    }
                }
                None => break,
            }
        }

        self.entries.insert(key.to_string(), value.to_string());
        self.order.push_back(key.to_string());
        evicted
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

/// In-memory cache service with insertion-order eviction
#[derive(Clone)]
pub struct InMemoryCacheService {
    buckets: Arc<Mutex<HashMap<Collection, Bucket>>>,
    max_entries: usize,
}

impl std::fmt::Debug for InMemoryCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sizes: HashMap<Collection, usize> = self
            .buckets
            .lock()
            .iter()
            .map(|(c, b)| (*c, b.entries.len()))
            .collect();
        f.debug_struct("InMemoryCacheService")
            .field("max_entries", &self.max_entries)
            .field("sizes", &sizes)
            .finish()
    }
}

impl InMemoryCacheService {
    pub fn new(max_entries: usize) -> Self {
        debug!(max_entries = max_entries, "In-memory cache service created");
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            max_entries: max_entries.max(1),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl CacheService for InMemoryCacheService {
    async fn get(&self, collection: Collection, key: &str) -> CacheResult<Option<String>> {
        let value = self
            .buckets
            .lock()
            .get(&collection)
            .and_then(|bucket| bucket.entries.get(key).cloned());
        Ok(value)
    }

    async fn set(&self, collection: Collection, key: &str, value: &str) -> CacheResult<()> {
        let evicted = self
            .buckets
            .lock()
            .entry(collection)
            .or_default()
            .insert(key, value, self.max_entries);

        if let Some(evicted_key) = evicted {
            debug!(
                collection = %collection,
                evicted = %evicted_key,
                "Evicted oldest cache entry"
            );
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &str) -> CacheResult<()> {
        if let Some(bucket) = self.buckets.lock().get_mut(&collection) {
            bucket.remove(key);
        }
        Ok(())
    }

    async fn sample(&self, collection: Collection, limit: usize) -> CacheResult<Vec<String>> {
        let buckets = self.buckets.lock();
        let Some(bucket) = buckets.get(&collection) else {
            return Ok(Vec::new());
        };
        Ok(bucket
            .order
            .iter()
            .filter_map(|key| bucket.entries.get(key).cloned())
            .take(limit)
            .collect())
    }

    async fn count(&self, collection: Collection) -> CacheResult<u64> {
        Ok(self
            .buckets
            .lock()
            .get(&collection)
            .map(|b| b.entries.len() as u64)
            .unwrap_or(0))
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
