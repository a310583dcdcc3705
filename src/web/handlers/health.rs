//! # Health Check Handler

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::web::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub cache_provider: String,
    pub cache_healthy: bool,
    pub timestamp: String,
}

/// Liveness: GET /health
///
/// Always 200 while the process serves requests; a failing store only
/// degrades the reported status since lookups fall through to upstream.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.dispatcher.store();
    let cache_healthy = match store.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            warn!(error = %e, "Cache health check failed");
            false
        }
    };

    Json(HealthResponse {
        status: if cache_healthy { "ok" } else { "degraded" }.to_string(),
        cache_provider: store.provider_name().to_string(),
        cache_healthy,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
