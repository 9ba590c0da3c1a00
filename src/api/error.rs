// 🚦 HTTP error mapping
// DomainError → status code + `{ "message": ... }` body.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::error::DomainError;

#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl ApiError {
    pub fn unauthorized(message: &str) -> Self {
        ApiError(DomainError::Unauthorized(message.to_string()))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(DomainError::Validation(message.into()))
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Store(_) | DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Store and internal failures stay opaque.
    fn message(&self) -> String {
        match &self.0 {
            DomainError::Validation(m)
            | DomainError::NotFound(m)
            | DomainError::Forbidden(m)
            | DomainError::Unauthorized(m)
            | DomainError::Conflict(m) => m.clone(),
            DomainError::Store(_) | DomainError::Internal(_) => "Server error".to_string(),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(format!("Invalid path: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else if status == StatusCode::CONFLICT {
            warn!("Request conflict: {}", self.0);
        }

        (status, Json(json!({ "message": self.message() }))).into_response()
    }
}
