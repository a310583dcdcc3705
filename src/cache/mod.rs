//! # Durable Cache Store
//!
//! Key/value persistence for cached upstream responses, category snapshots and
//! per-game detail records.
//!
//! ## Architecture
//!
//! ```text
//! CacheProvider (enum)               <- Zero-cost dispatch, no vtable
//!   ├── Memory(InMemoryCacheService)  <- Bounded, oldest-inserted eviction
//!   ├── Redis(RedisCacheService)      <- ConnectionManager-based async Redis
//!   └── NoOp(NoOpCacheService)        <- Always-miss, always-succeed fallback
//! ```
//!
//! - **Graceful degradation**: Redis failure at startup falls back to NoOp
//! - **Lazy expiry**: the store never evicts by age; readers check
//!   [`CacheEntry::is_valid_at`]
//! - **Last write wins**: `set` supersedes, it never merges

pub mod entry;
pub mod errors;
pub mod provider;
pub mod providers;
pub mod traits;

pub use entry::{cache_key, canonical_params, CacheEntry, Collection};
pub use errors::{CacheError, CacheResult};
pub use provider::CacheProvider;
pub use providers::{InMemoryCacheService, NoOpCacheService};
pub use traits::CacheService;

#[cfg(feature = "cache-redis")]
pub use providers::RedisCacheService;
