//! Error types for the gateway.
//!

use thiserror::Error;

use crate::cache::CacheError;
use crate::config::ConfigurationError;
use crate::upstream::UpstreamError;

/// Crate-wide error type.
///
/// `Clone` so that a coalesced upstream failure can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),
    #[error("{0}")]
    Timeout(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Message used for the dispatcher's fetch deadline
    pub const UPSTREAM_TIMEOUT_MESSAGE: &'static str = "BGG API timeout";

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    pub fn upstream_timeout() -> Self {
        Self::Timeout(Self::UPSTREAM_TIMEOUT_MESSAGE.to_string())
    }

    /// True when the upstream kept answering 429 after all retries
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<UpstreamError> for GatewayError {
    fn from(error: UpstreamError) -> Self {
        match error {
            UpstreamError::RateLimited { .. } => GatewayError::RateLimited(error.to_string()),
            other => GatewayError::Upstream(other.to_string()),
        }
    }
}

impl From<CacheError> for GatewayError {
    fn from(error: CacheError) -> Self {
        GatewayError::Cache(error.to_string())
    }
}

impl From<ConfigurationError> for GatewayError {
    fn from(error: ConfigurationError) -> Self {
        GatewayError::Configuration(error.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(error: serde_json::Error) -> Self {
        GatewayError::Serialization(format!("JSON serialization error: {error}"))
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_upstream_maps_to_rate_limited() {
        let err: GatewayError = UpstreamError::RateLimited { status: 429 }.into();
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_server_error_maps_to_upstream() {
        let err: GatewayError = UpstreamError::Server { status: 503 }.into();
        assert!(matches!(err, GatewayError::Upstream(_)));
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_timeout_message() {
        let err = GatewayError::upstream_timeout();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "BGG API timeout");
    }
}
