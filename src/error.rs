//! Engine error types with HTTP status code mapping.
//!
//! [`EngineError`] is the central error type. Each variant maps to a
//! numeric code and an HTTP status, and renders as a structured JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: limit must be a positive integer"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Engine error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category   | HTTP Status               |
/// |-----------|------------|---------------------------|
/// | 1000–1999 | Validation | 400 Bad Request           |
/// | 2000–2999 | Not Found  | 404 Not Found             |
/// | 3000–3999 | Server     | 500 Internal Server Error |
/// | 4000–4999 | Timeout    | 504 Gateway Timeout       |
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A target date or window could not be parsed.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Job name is not one of the supported jobs.
    #[error("unsupported job: {0}")]
    UnsupportedJob(String),

    /// Scope string is neither card nor deck.
    #[error("unsupported scope: {0}")]
    UnsupportedScope(String),

    /// Period string is not a known snapshot period.
    #[error("unsupported period: {0}")]
    UnsupportedPeriod(String),

    /// Job run with the given id does not exist.
    #[error("job run not found: {0}")]
    JobRunNotFound(uuid::Uuid),

    /// Storage layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A bounded store call did not finish in time.
    #[error("{0} timed out")]
    Timeout(String),

    /// No tier produced data and no fallback exists.
    #[error("no recommendations available for scope {0}")]
    Exhausted(String),

    /// A stored metric row carries a value that cannot be scored.
    #[error("malformed metric row: {0}")]
    MalformedMetric(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidDate(_) => 1002,
            Self::UnsupportedJob(_) => 1003,
            Self::UnsupportedScope(_) => 1004,
            Self::UnsupportedPeriod(_) => 1005,
            Self::JobRunNotFound(_) => 2001,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Exhausted(_) => 3002,
            Self::MalformedMetric(_) => 3003,
            Self::Timeout(_) => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidDate(_)
            | Self::UnsupportedJob(_)
            | Self::UnsupportedScope(_)
            | Self::UnsupportedPeriod(_) => StatusCode::BAD_REQUEST,
            Self::JobRunNotFound(_) => StatusCode::NOT_FOUND,
            Self::Persistence(_)
            | Self::Exhausted(_)
            | Self::MalformedMetric(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Returns `true` for input errors that are rejected before any side
    /// effect.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::InvalidDate(_)
                | Self::UnsupportedJob(_)
                | Self::UnsupportedScope(_)
                | Self::UnsupportedPeriod(_)
        )
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for EngineError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Persistence(format!("migration failed: {e}"))
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_request() {
        for e in [
            EngineError::InvalidRequest("x".into()),
            EngineError::InvalidDate("x".into()),
            EngineError::UnsupportedJob("x".into()),
            EngineError::UnsupportedScope("x".into()),
            EngineError::UnsupportedPeriod("x".into()),
        ] {
            assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
            assert!(e.is_input_error());
            assert!((1000..2000).contains(&e.error_code()));
        }
    }

    #[test]
    fn server_errors_map_to_5xx() {
        assert_eq!(
            EngineError::Persistence("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            EngineError::Timeout("model tier".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert!(!EngineError::Internal("x".into()).is_input_error());
        let malformed = EngineError::MalformedMetric("price_avg".into());
        assert_eq!(malformed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(malformed.error_code(), 3003);
        assert!(!malformed.is_input_error());
    }

    #[test]
    fn into_response_sets_status() {
        let response = EngineError::UnsupportedJob("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
