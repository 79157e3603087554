use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use warbler_db::DbError;
use warbler_types::api::ErrorResponse;

/// Shown for every rejected identity or ownership check.
pub const UNAUTHORIZED_MESSAGE: &str = "Access unauthorized.";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Anonymous caller, or an authenticated caller who does not own the resource.
    #[error("Access unauthorized.")]
    Unauthorized,

    /// Login failed. Unknown user and wrong password look the same.
    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error("Not found.")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Integrity(detail) => ApiError::Integrity(detail),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Malformed or incomplete request bodies keep the `ErrorResponse` shape.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE.to_string()),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Integrity(detail) => {
                debug!("Integrity violation: {}", detail);
                (
                    StatusCode::CONFLICT,
                    "Conflicts with existing data (username or email already taken?).".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
