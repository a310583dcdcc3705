//! # Web API Request Handlers

pub mod admin;
pub mod catalog;
pub mod health;

use crate::web::response_types::ApiError;

/// Fallback for a known path hit with the wrong method
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
