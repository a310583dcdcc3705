//! # Resilience Module
//!
//! Serialization and backoff for outbound upstream calls.
//!
//! ## Architecture
//!
//! - **Rate limiter**: one request running at a time per instance, FIFO order,
//!   minimum spacing between the end of one call and the start of the next
//! - **Backoff**: exponential delay with an upper cap and optional jitter
//! - **Instances**: `interactive` (request path) and `bulk` (refresh job) are
//!   separate limiters with separate policies
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bgg_gateway::resilience::{RateLimiter, RateLimiterConfig};
//! use bgg_gateway::upstream::UpstreamError;
//!
//! # async fn example() -> Result<(), UpstreamError> {
//! let limiter = RateLimiter::new("interactive", RateLimiterConfig::interactive());
//!
//! let body = limiter
//!     .execute("search", || async { Ok::<_, UpstreamError>("<items/>".to_string()) })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Limiter state is per-process: separate gateway processes do not coordinate.

pub mod backoff;
pub mod rate_limiter;

pub use backoff::BackoffPolicy;
pub use rate_limiter::{RateLimiter, RateLimiterConfig, RateLimiterStats};
