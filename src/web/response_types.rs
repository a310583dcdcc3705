//! # Web API Error Responses
//!
//! Maps gateway errors onto HTTP statuses and the `{ "error", "details" }` JSON body.
//! Internal messages are only exposed when `web.expose_error_details` is on.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::GatewayError;

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

/// Web API errors with HTTP status code mappings
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Invalid request: {message}")]
    BadRequest { message: String, details: String },

    #[error("Access denied")]
    Forbidden { details: String },

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Rate limited by upstream")]
    RateLimited { details: String },

    #[error("Internal server error")]
    Internal { details: String },
}

impl ApiError {
    /// Missing or malformed request input
    pub fn bad_request(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::BadRequest {
            details: message.clone(),
            message,
        }
    }

    pub fn forbidden(details: impl Into<String>) -> Self {
        Self::Forbidden {
            details: details.into(),
        }
    }

    /// Convert a gateway error, hiding internal details unless `expose` is set
    pub fn from_gateway(error: GatewayError, expose: bool) -> Self {
        let internal = error.to_string();
        let details = |generic: &str| {
            if expose {
                internal.clone()
            } else {
                generic.to_string()
            }
        };

        match &error {
            GatewayError::Validation(message) => Self::BadRequest {
                message: message.clone(),
                details: details("invalid request"),
            },
            GatewayError::PermissionDenied(_) => Self::Forbidden {
                details: details("access denied"),
            },
            GatewayError::RateLimited(_) => Self::RateLimited {
                details: details("too many requests"),
            },
            _ => Self::Internal {
                details: details("service temporarily unavailable"),
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (error, details) = match self {
            Self::BadRequest { message, details } => (message.clone(), details.clone()),
            Self::Forbidden { details } => ("Forbidden".to_string(), details.clone()),
            Self::MethodNotAllowed => (
                "Method not allowed".to_string(),
                "method not allowed".to_string(),
            ),
            Self::RateLimited { details } => (
                "Rate limit exceeded, please try again later".to_string(),
                details.clone(),
            ),
            Self::Internal { details } => (
                "Failed to fetch data from BoardGameGeek".to_string(),
                details.clone(),
            ),
        };
        ErrorBody { error, details }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Result type alias for web API operations
pub type ApiResult<T> = Result<T, ApiError>;
