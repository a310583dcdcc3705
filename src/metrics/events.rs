//! Cache event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEventType {
    CacheHit,
    CacheMiss,
    CacheSet,
    CacheError,
    ApiError,
    ApiRetry,
    ApiSuccess,
    CachePerformance,
    CacheRefresh,
}

impl CacheEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheHit => "cache_hit",
            Self::CacheMiss => "cache_miss",
            Self::CacheSet => "cache_set",
            Self::CacheError => "cache_error",
            Self::ApiError => "api_error",
            Self::ApiRetry => "api_retry",
            Self::ApiSuccess => "api_success",
            Self::CachePerformance => "cache_performance",
            Self::CacheRefresh => "cache_refresh",
        }
    }
}

impl fmt::Display for CacheEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only event log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEvent {
    #[serde(rename = "type")]
    pub event_type: CacheEventType,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl CacheEvent {
    pub fn new(event_type: CacheEventType, data: Value) -> Self {
        Self {
            event_type,
            data,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = CacheEvent::new(CacheEventType::CachePerformance, json!({"success": true}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "cache_performance");
        assert_eq!(value["data"]["success"], true);
        assert_eq!(CacheEventType::ApiRetry.to_string(), "api_retry");
    }
}
