//! # Catalog Endpoints
//!
//! Search and item detail lookups served through the cache-aware dispatcher.
//! Successful responses carry the upstream XML body unchanged.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::debug;

use crate::error::GatewayError;
use crate::upstream::{SearchQuery, ThingQuery};
use crate::web::response_types::ApiResult;
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub search_type: Option<String>,
    pub exact: Option<String>,
}

impl SearchParams {
    fn into_query(self) -> Result<SearchQuery, GatewayError> {
        let query = required(self.query, "Missing query parameter")?;
        let mut search = SearchQuery::new(query);
        if let Some(t) = non_empty(self.search_type) {
            search = search.with_type(t);
        }
        if let Some(e) = non_empty(self.exact) {
            search = search.with_exact(e);
        }
        Ok(search)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ThingParams {
    pub id: Option<String>,
    pub stats: Option<String>,
    pub versions: Option<String>,
}

impl ThingParams {
    fn into_query(self) -> Result<ThingQuery, GatewayError> {
        let id = required(self.id, "Missing id parameter")?;
        Ok(ThingQuery {
            id,
            stats: non_empty(self.stats),
            versions: non_empty(self.versions),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, message: &str) -> Result<String, GatewayError> {
    non_empty(value).ok_or_else(|| GatewayError::validation(message))
}

fn xml_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

/// Search items: GET /search?query=&type=&exact=
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Response> {
    let query = params.into_query().map_err(|e| state.api_error(e))?;
    debug!(query = %query.query, "Catalog search");

    let body = state
        .dispatcher
        .search(&state.source, query)
        .await
        .map_err(|e| state.api_error(e))?;
    Ok(xml_response(body))
}

/// Item details: GET /thing?id=&stats=&versions=
pub async fn thing(
    State(state): State<AppState>,
    Query(params): Query<ThingParams>,
) -> ApiResult<Response> {
    let query = params.into_query().map_err(|e| state.api_error(e))?;
    debug!(id = %query.id, "Catalog item lookup");

    let body = state
        .dispatcher
        .thing(&state.source, query)
        .await
        .map_err(|e| state.api_error(e))?;
    Ok(xml_response(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_or_blank_query_is_rejected() {
        assert!(matches!(
            SearchParams::default().into_query(),
            Err(GatewayError::Validation(_))
        ));
        let blank = SearchParams {
            query: Some("  ".into()),
            ..Default::default()
        };
        assert!(blank.into_query().is_err());
    }

    #[test]
    fn test_optional_params_are_carried() {
        let params = SearchParams {
            query: Some("catan".into()),
            search_type: Some("boardgame".into()),
            exact: Some(String::new()),
        };
        let query = params.into_query().unwrap();
        assert_eq!(query.search_type.as_deref(), Some("boardgame"));
        assert_eq!(query.exact, None);

        let thing = ThingParams {
            id: Some("13".into()),
            stats: Some("1".into()),
            versions: None,
        }
        .into_query()
        .unwrap();
        assert_eq!(thing.id, "13");
        assert_eq!(thing.stats.as_deref(), Some("1"));
    }
}
