//! # Gateway Constants
//!
//! Defaults shared by the configuration layer, the dispatcher and the refresh job.

use std::time::Duration;

/// Maximum age at which a cached upstream response is still served
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Hard deadline for a dispatched upstream fetch (queue wait included)
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Emit an aggregate summary every N dispatched requests
pub const DEFAULT_SUMMARY_INTERVAL: u64 = 100;

/// Bound for the in-memory cache store
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 10_000;

/// Number of recent hit/miss events used for the derived hit rate
pub const DEFAULT_HIT_RATE_WINDOW: usize = 100;

/// Number of cache entries sampled for the memory usage estimate
pub const DEFAULT_MEMORY_SAMPLE_SIZE: usize = 100;

/// Upstream endpoint names, also used as cache key prefixes
pub mod endpoints {
    pub const SEARCH: &str = "search";
    pub const THING: &str = "thing";
    pub const BROWSE: &str = "browse";
}

/// Rate limiter presets
pub mod rate_limits {
    use std::time::Duration;

    pub const INTERACTIVE_MIN_SPACING: Duration = Duration::from_millis(500);
    pub const INTERACTIVE_MAX_RETRIES: u32 = 3;
    pub const INTERACTIVE_BASE_DELAY: Duration = Duration::from_millis(500);
    pub const INTERACTIVE_MAX_DELAY: Duration = Duration::from_secs(8);

    pub const BULK_MIN_SPACING: Duration = Duration::from_secs(15);
    pub const BULK_MAX_RETRIES: u32 = 2;
    pub const BULK_BASE_DELAY: Duration = Duration::from_secs(15);
    pub const BULK_MAX_DELAY: Duration = Duration::from_secs(60);
}

/// Bulk refresh defaults
pub mod refresh {
    use std::time::Duration;

    pub const ITEMS_PER_CATEGORY: usize = 50;
    pub const ITEM_DELAY: Duration = Duration::from_secs(2);
    pub const MAX_PAGES: u32 = 5;

    /// Ranked categories refreshed in this order
    pub const CATEGORIES: &[&str] = &[
        "boardgame",
        "strategygames",
        "familygames",
        "partygames",
        "thematic",
        "wargames",
        "abstracts",
        "childrensgames",
    ];
}
