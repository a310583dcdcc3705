//! # Admin Authentication Middleware
//!
//! Privileged routes require `Authorization: Bearer <token>` with a token listed in
//! `web.admin_tokens`. The authenticated [`Caller`] is added to request extensions.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::refresh::Caller;
use crate::web::response_types::ApiError;
use crate::web::state::AppState;

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_str = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::forbidden("missing authorization header"))?
        .to_str()
        .map_err(|_| ApiError::forbidden("invalid authorization header"))?;

    let token = extract_bearer_token(auth_str)?;
    if !state.is_admin_token(token) {
        warn!(path = %request.uri().path(), "Rejected admin request with unknown token");
        return Err(ApiError::forbidden("invalid admin token"));
    }

    let caller = Caller::admin(token_label(token));
    debug!(caller = %caller.id, "Authenticated admin request");
    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}

fn extract_bearer_token(auth_header: &str) -> Result<&str, ApiError> {
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::forbidden("authorization header must use Bearer scheme"))?
        .trim();
    if token.is_empty() {
        return Err(ApiError::forbidden("empty bearer token"));
    }
    Ok(token)
}

/// Loggable caller id that does not reveal the token
fn token_label(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("admin:{prefix}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123").unwrap(), "abc123");
        assert!(extract_bearer_token("Basic abc123").is_err());
        assert!(extract_bearer_token("Bearer ").is_err());
        assert!(extract_bearer_token("abc123").is_err());
    }

    #[test]
    fn test_token_label_hides_token() {
        let label = token_label("test-admin-token");
        assert!(label.starts_with("admin:test"));
        assert!(!label.contains("admin-token"));
    }
}
