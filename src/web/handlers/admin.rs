//! # Admin Endpoints
//!
//! Cache initialization and metrics. Both sit behind the admin auth middleware,
//! which places the authenticated [`Caller`] in the request extensions.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::GatewayError;
use crate::metrics::CacheMetrics;
use crate::refresh::{Caller, TriggerStatus};
use crate::resilience::RateLimiterStats;
use crate::web::response_types::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InitializeParams {
    pub force: Option<String>,
}

impl InitializeParams {
    /// Absent or blank means false; anything but a boolean literal is rejected
    fn force(&self) -> Result<bool, GatewayError> {
        match self.force.as_deref().map(str::trim) {
            None | Some("") => Ok(false),
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
            Some(_) => Err(GatewayError::validation(
                "Invalid force parameter, expected true or false",
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub status: String,
}

/// Gateway metrics with limiter state
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminMetricsResponse {
    #[serde(flatten)]
    pub cache: CacheMetrics,
    pub rate_limiters: Vec<RateLimiterStats>,
    pub refresh_running: bool,
}

/// Start the bulk refresh: POST /admin/cache/initialize?force=
pub async fn initialize_cache(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    params: Result<Query<InitializeParams>, QueryRejection>,
) -> ApiResult<(StatusCode, Json<InitializeResponse>)> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let force = params.force().map_err(|e| state.api_error(e))?;
    let status = state
        .coordinator
        .trigger(&caller, force)
        .await
        .map_err(|e| state.api_error(e))?;

    info!(caller = %caller.id, force = force, status = status.as_str(), "Cache initialization requested");

    let code = match status {
        TriggerStatus::Started => StatusCode::ACCEPTED,
        TriggerStatus::Skipped | TriggerStatus::AlreadyRunning => StatusCode::OK,
    };
    Ok((
        code,
        Json(InitializeResponse {
            status: status.as_str().to_string(),
        }),
    ))
}

/// Derived metrics: GET /admin/metrics
pub async fn cache_metrics(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<AdminMetricsResponse>> {
    caller
        .require_admin("metrics")
        .map_err(|e| state.api_error(e))?;

    let dispatcher = &state.dispatcher;
    let cache = dispatcher.metrics().derived_metrics(dispatcher.store()).await;

    Ok(Json(AdminMetricsResponse {
        cache,
        rate_limiters: vec![dispatcher.limiter().stats(), state.bulk_limiter.stats()],
        refresh_running: state.coordinator.is_running(),
    }))
}
