//! HTTP error mapping

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use loyalty_core::error::DomainError;

use crate::response::ApiResponse;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests")]
    RateLimited,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, bool) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", false),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", false),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", false),
            ApiError::Domain(e) if e.is_not_found() => (StatusCode::NOT_FOUND, "NOT_FOUND", false),
            ApiError::Domain(e) if e.is_retryable() => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE", true)
            }
            ApiError::Domain(e) => match e {
                DomainError::AlreadyClaimed { .. } => (StatusCode::CONFLICT, "ALREADY_CLAIMED", false),
                DomainError::CustomerAlreadyExists { .. } => (StatusCode::CONFLICT, "CUSTOMER_EXISTS", false),
                DomainError::ConfigurationError(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "CONFIGURATION_ERROR", false)
                }
                DomainError::AllRateLimited => (StatusCode::TOO_MANY_REQUESTS, "ALL_RATE_LIMITED", false),
                DomainError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", false),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", false),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, retryable) = self.parts();

        let message = if status.is_server_error() {
            tracing::error!("{} ({}): {}", code, status, self);
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Storage is temporarily unavailable, retry later".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            tracing::warn!("{} ({}): {}", code, status, self);
            self.to_string()
        };

        let body = ApiResponse::<()>::failure(code, &message, retryable);
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(errors.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
