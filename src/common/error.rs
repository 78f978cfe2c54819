// Error handling types for the API

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use tracing::{error, warn};

use super::config::Environment;
use super::validation::ValidationResult;

/// Deployment environment used when rendering errors. Unset means production rules apply.
static ERROR_ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// Fix the environment that decides whether internal errors are masked.
/// Only the first call has an effect.
pub fn configure_error_environment(environment: Environment) {
    let _ = ERROR_ENVIRONMENT.set(environment);
}

fn is_development() -> bool {
    matches!(ERROR_ENVIRONMENT.get(), Some(Environment::Development))
}

/// API error types
///
/// Every variant except `Internal` and `Database` is operational: an expected outcome
/// whose status and message are always shown to the caller.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
    Database(sqlx::Error),
}

impl ApiError {
    pub fn is_operational(&self) -> bool {
        !matches!(self, ApiError::Internal(_) | ApiError::Database(_))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
            ApiError::Database(_) => "DATABASE_ERROR",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Validation(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => msg.clone(),
            ApiError::Database(_) => "Database operation failed".to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::Database(e) => write!(f, "Database Error: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Database(e)
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    fn from_error(err: &ApiError, development: bool) -> (StatusCode, Self) {
        if !err.is_operational() && !development {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Internal Server Error".to_string(),
                    code: "INTERNAL_SERVER_ERROR".to_string(),
                    detail: None,
                },
            );
        }

        (
            err.status(),
            ErrorResponse {
                error: err.message(),
                code: err.code().to_string(),
                detail: development.then(|| format!("{:?}", err)),
            },
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if self.is_operational() {
            warn!(status = %self.status(), error = %self, "Request failed");
        } else {
            error!(error = %self, "Unexpected error while handling request");
        }

        let (status, body) = ErrorResponse::from_error(&self, is_development());
        (status, Json(body)).into_response()
    }
}

/// Helper function to convert ValidationResult to ApiError
impl From<ValidationResult> for ApiError {
    fn from(result: ValidationResult) -> Self {
        if result.is_valid {
            ApiError::Internal("Validation result was valid but converted to error".to_string())
        } else {
            let error_messages: Vec<String> = result
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            ApiError::Validation(error_messages.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operational_errors_keep_status_and_message() {
        let err = ApiError::Forbidden("Forbidden".to_string());
        let (status, body) = ErrorResponse::from_error(&err, false);
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, "Forbidden");
        assert_eq!(body.code, "FORBIDDEN");
        assert!(body.detail.is_none());
    }

    #[test]
    fn test_conflict_maps_to_bad_request() {
        let err = ApiError::Conflict("This email is already being used".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.is_operational());
    }

    #[test]
    fn test_internal_errors_masked_outside_development() {
        let err = ApiError::Internal("signing key exploded".to_string());
        let (status, body) = ErrorResponse::from_error(&err, false);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal Server Error");
        assert!(body.detail.is_none());
    }

    #[test]
    fn test_internal_errors_detailed_in_development() {
        let err = ApiError::Internal("signing key exploded".to_string());
        let (status, body) = ErrorResponse::from_error(&err, true);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "signing key exploded");
        assert!(body.detail.unwrap().contains("signing key exploded"));
    }

    #[test]
    fn test_validation_result_conversion() {
        let mut result = ValidationResult::new();
        result.add_error("email", "Email is required");
        result.add_error("password", "Password is too short");

        match ApiError::from(result) {
            ApiError::Validation(msg) => {
                assert_eq!(msg, "email: Email is required, password: Password is too short")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
