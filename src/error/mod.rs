//! Error handling module.
//!
//! This module provides unified error handling with proper HTTP status code mapping
//! and standardized API error envelopes.
//!
//! Every failure in the service converges on [`AppError`]. Its `IntoResponse`
//! implementation renders a bare error envelope and attaches an [`ErrorReport`]
//! to the response extensions; the boundary middleware in
//! `api::middleware::errors` picks the report up and re-renders it with the
//! request's trace id.

pub mod codes;

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::domain::{ApiResponse, ErrorModel};

pub use codes::{ErrorCategory, ErrorCode};

/// Application-level error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Generic key-not-found signal.
    #[error("{0}")]
    NotFound(String),

    /// Unauthorized access signal.
    #[error("{0}")]
    Unauthorized(String),

    /// Application error carrying an explicit error code.
    #[error("{message}")]
    Application {
        /// Human-readable message.
        message: String,
        /// Application error code; decides the HTTP status.
        code: ErrorCode,
        /// Optional diagnostic detail.
        details: Option<String>,
    },

    /// Request validation failed on one or more fields.
    #[error("{message}")]
    Validation {
        /// Summary message.
        message: String,
        /// Field name to message.
        field_errors: BTreeMap<String, String>,
    },

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Create an application error with the given code.
    pub fn application(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
            code,
            details: None,
        }
    }

    /// Create a validation error for a single field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = BTreeMap::new();
        field_errors.insert(field.into(), message.clone());
        Self::Validation {
            message,
            field_errors,
        }
    }

    /// Create a validation error without field detail.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    /// Get the error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::UserNotFound,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::Application { code, .. } => *code,
            Self::Validation { .. } => ErrorCode::ValidationError,
            Self::Storage(_) => ErrorCode::DatabaseError,
            Self::Internal(_) => ErrorCode::InternalServerError,
        }
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Application { code, .. } => code.status_code(),
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short name of the error kind, used as the envelope detail title.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "ResourceNotFound",
            Self::Unauthorized(_) => "UnauthorizedError",
            Self::Application { .. } => "ApplicationError",
            Self::Validation { .. } => "ValidationError",
            Self::Storage(_) => "StorageError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Build the diagnostic payload for this error.
    #[must_use]
    pub fn error_model(&self) -> ErrorModel {
        match self {
            Self::Validation { field_errors, .. } if !field_errors.is_empty() => {
                ErrorModel::from_field_errors(field_errors.clone())
            }
            Self::Application {
                details: Some(details),
                ..
            } => ErrorModel::new(self.title(), self.to_string()).with_inner(details.clone()),
            Self::Storage(inner) => {
                ErrorModel::new(self.title(), self.to_string()).with_inner(inner.to_string())
            }
            _ => ErrorModel::new(self.title(), self.to_string()),
        }
    }
}

/// Normalized description of a failed request.
///
/// Stored in response extensions so the boundary middleware can finish the
/// envelope (trace id, diagnostics) without re-deriving the mapping.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// HTTP status.
    pub status: StatusCode,
    /// Application error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Diagnostic payload, including inner error text.
    pub details: ErrorModel,
}

impl ErrorReport {
    /// Render the report as an error envelope.
    ///
    /// Inner error text is only attached when `include_inner` is set.
    #[must_use]
    pub fn envelope(&self, trace_id: Option<String>, include_inner: bool) -> ApiResponse<()> {
        let mut details = self.details.clone();
        if !include_inner {
            details.inner_error = None;
        }

        ApiResponse::fail(
            self.message.clone(),
            self.status,
            Some(self.code),
            Some(details),
            trace_id,
        )
    }
}

impl From<&AppError> for ErrorReport {
    fn from(err: &AppError) -> Self {
        Self {
            status: err.status_code(),
            code: err.error_code(),
            message: err.to_string(),
            details: err.error_model(),
        }
    }
}

impl<T> From<&ApiResponse<T>> for ErrorReport {
    fn from(envelope: &ApiResponse<T>) -> Self {
        Self {
            status: envelope.status(),
            code: envelope
                .error_code
                .and_then(ErrorCode::from_i32)
                .unwrap_or(ErrorCode::ValidationError),
            message: envelope.message.clone(),
            details: envelope.error.clone().unwrap_or_else(|| {
                ErrorModel::new("ApplicationError", envelope.message.clone())
            }),
        }
    }
}

impl IntoResponse for ErrorReport {
    fn into_response(self) -> Response {
        let mut response = self.envelope(None, false).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ErrorReport::from(&self).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut field_errors = BTreeMap::new();
        let mut count = 0usize;

        for (field, failures) in errors.field_errors() {
            count += failures.len();
            let joined = failures
                .iter()
                .map(|failure| {
                    failure
                        .message
                        .as_ref()
                        .map_or_else(|| failure.code.to_string(), ToString::to_string)
                })
                .collect::<Vec<_>>()
                .join("; ");
            field_errors.insert(field.to_string(), joined);
        }

        Self::Validation {
            message: format!("Validation failed with {count} error(s)"),
            field_errors,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

/// Storage-specific error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Connection error.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Query failed: {0}")]
    Query(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unique or referential constraint violated.
    #[error("Constraint violated: {0}")]
    Conflict(String),

    /// Lock acquisition failed.
    #[error("Failed to acquire lock: {0}")]
    LockFailed(String),

    /// File I/O error.
    #[error("File I/O error: {0}")]
    FileIO(String),

    /// Data not found.
    #[error("Data not found: {0}")]
    NotFound(String),

    /// Backend not available.
    #[error("Storage backend unavailable")]
    Unavailable,
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::FileIO(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                Self::Conflict(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
                Self::Conflict(db.message().to_string())
            }
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::Unavailable,
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => Self::Connection(err.to_string()),
            _ => Self::Query(err.to_string()),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias using `StorageError`.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Signup {
        #[validate(email(message = "Invalid email address."))]
        email: String,
        #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
        password: String,
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::NotFound("missing".to_string()).error_code(),
            ErrorCode::UserNotFound
        );
        assert_eq!(
            AppError::Unauthorized("no".to_string()).error_code(),
            ErrorCode::Unauthorized
        );
        assert_eq!(
            AppError::Internal("boom".to_string()).error_code(),
            ErrorCode::InternalServerError
        );
        assert_eq!(
            AppError::Storage(StorageError::Unavailable).error_code(),
            ErrorCode::DatabaseError
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotFound("missing".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unauthorized("no".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::application(ErrorCode::DuplicateEmail, "taken").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::application(ErrorCode::Forbidden, "nope").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::bad_request("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_duplicate_email_report() {
        let err = AppError::application(ErrorCode::DuplicateEmail, "Email already exists");
        let envelope = ErrorReport::from(&err).envelope(Some("trace-1".to_string()), false);

        assert!(!envelope.success);
        assert_eq!(envelope.status_code, 409);
        assert_eq!(envelope.error_code, Some(1004));
        assert_eq!(envelope.message, "Email already exists");
        assert_eq!(envelope.trace_id.as_deref(), Some("trace-1"));
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_inner_error_only_with_diagnostics() {
        let err = AppError::Storage(StorageError::Query("syntax error".to_string()));
        let report = ErrorReport::from(&err);

        let hidden = report.envelope(None, false);
        assert!(hidden.error.unwrap().inner_error.is_none());

        let shown = report.envelope(None, true);
        assert_eq!(
            shown.error.unwrap().inner_error.as_deref(),
            Some("Query failed: syntax error")
        );
    }

    #[test]
    fn test_validation_errors_conversion() {
        let signup = Signup {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
        };
        let err = AppError::from(signup.validate().unwrap_err());

        assert_eq!(err.error_code(), ErrorCode::ValidationError);
        assert_eq!(err.to_string(), "Validation failed with 2 error(s)");

        let model = err.error_model();
        let fields = model.field_errors.unwrap();
        assert_eq!(fields["email"], "Invalid email address.");
        assert_eq!(fields["password"], "Password must be at least 8 characters.");
    }

    #[test]
    fn test_into_response_attaches_report() {
        let response =
            AppError::application(ErrorCode::CourseNotFound, "Course 9 not found").into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.code, ErrorCode::CourseNotFound);
    }
}
