//! Cache entries, collections and cache key derivation

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Logical collections held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Per-request cached upstream responses, keyed by [`cache_key`]
    ApiCache,
    /// Category snapshots, keyed by `category/YYYY-MM`
    Snapshots,
    /// Per-game detail records, keyed by game id
    Games,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::ApiCache => "api_cache",
            Collection::Snapshots => "snapshots",
            Collection::Games => "games",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached upstream response
///
/// Created after every successful fetch on a miss and superseded on the next
/// miss for the same key. Never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub data: Value,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: i64,
    pub endpoint: String,
    pub params: Value,
}

impl CacheEntry {
    pub fn new(endpoint: &str, params: Value, data: Value) -> Self {
        Self::with_timestamp(endpoint, params, data, Utc::now().timestamp_millis())
    }

    pub fn with_timestamp(endpoint: &str, params: Value, data: Value, timestamp: i64) -> Self {
        Self {
            key: cache_key(endpoint, &params),
            data,
            timestamp,
            endpoint: endpoint.to_string(),
            params,
        }
    }

    /// Valid iff `now - timestamp < ttl`
    pub fn is_valid_at(&self, now_ms: i64, ttl: Duration) -> bool {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.timestamp) < ttl_ms
    }

    pub fn is_valid(&self, ttl: Duration) -> bool {
        self.is_valid_at(Utc::now().timestamp_millis(), ttl)
    }

    pub fn age_ms(&self) -> i64 {
        Utc::now().timestamp_millis().saturating_sub(self.timestamp)
    }
}

/// `endpoint + ":" + canonical_params(params)`
pub fn cache_key(endpoint: &str, params: &Value) -> String {
    format!("{endpoint}:{}", canonical_params(params))
}

/// Serialize `params` as JSON with object keys sorted at every depth, so the
/// result does not depend on key insertion order.
///
/// `Value::to_string` only happens to sort keys while serde_json's
/// `preserve_order` feature is off; any crate in the graph can turn it on.
pub fn canonical_params(params: &Value) -> String {
    let mut out = String::new();
    write_canonical(params, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
