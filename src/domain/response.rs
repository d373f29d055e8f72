//! Uniform response envelope.
//!
//! Every endpoint answers with an [`ApiResponse`]. Success envelopes carry
//! `data` (and `pagination` for paged lists); failure envelopes carry
//! `errorCode`, `details` and usually `traceId`, never `data`.

use std::collections::BTreeMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::domain::PaginationMetadata;
use crate::error::{ErrorCode, ErrorReport};

/// Default message on success envelopes.
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Request successful";

/// Standard API response wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub success: bool,

    /// HTTP status code mirrored in the body.
    pub status_code: u16,

    /// Human-readable message.
    pub message: String,

    /// Application error code (errors only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,

    /// Response data (success only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Error diagnostics (errors only).
    #[serde(rename = "details", skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorModel>,

    /// Pagination metadata (paged lists only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMetadata>,

    /// Request correlation id (errors only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a 200 success response.
    pub fn ok(data: T) -> Self {
        Self::ok_with(data, DEFAULT_SUCCESS_MESSAGE, StatusCode::OK)
    }

    /// Create a success response with a custom message and status.
    pub fn ok_with(data: T, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            success: true,
            status_code: status.as_u16(),
            message: message.into(),
            error_code: None,
            data: Some(data),
            error: None,
            pagination: None,
            trace_id: None,
        }
    }

    /// Create a 200 success response without data.
    pub fn ok_empty(message: impl Into<String>) -> Self {
        Self {
            success: true,
            status_code: StatusCode::OK.as_u16(),
            message: message.into(),
            error_code: None,
            data: None,
            error: None,
            pagination: None,
            trace_id: None,
        }
    }

    /// Create a 200 success response for one page of a list.
    pub fn paged(data: T, pagination: PaginationMetadata) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::ok(data)
        }
    }

    /// Create an error response.
    pub fn fail(
        message: impl Into<String>,
        status: StatusCode,
        error_code: Option<ErrorCode>,
        error: Option<ErrorModel>,
        trace_id: Option<String>,
    ) -> Self {
        Self {
            success: false,
            status_code: status.as_u16(),
            message: message.into(),
            error_code: error_code.map(ErrorCode::as_i32),
            data: None,
            error,
            pagination: None,
            trace_id,
        }
    }

    /// Create a 400 validation error response.
    pub fn validation(errors: ErrorModel, trace_id: Option<String>) -> Self {
        Self::fail(
            "Validation failed",
            StatusCode::BAD_REQUEST,
            Some(ErrorCode::ValidationError),
            Some(errors),
            trace_id,
        )
    }

    /// Create a 404 error response.
    pub fn not_found(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::fail(message, StatusCode::NOT_FOUND, Some(code), None, None)
    }

    /// Create a 409 error response.
    pub fn conflict(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::fail(message, StatusCode::CONFLICT, Some(code), None, None)
    }

    /// Create a 401 error response.
    pub fn unauthorized(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::fail(message, StatusCode::UNAUTHORIZED, Some(code), None, None)
    }

    /// HTTP status of this envelope.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Failure envelopes also carry an [`ErrorReport`] so the boundary keeps
/// their message and code when it stamps the trace id.
impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(mut self) -> Response {
        if self.success {
            return (self.status(), Json(self)).into_response();
        }

        let report = ErrorReport::from(&self);
        self.error_code = Some(report.code.as_i32());
        let mut response = (report.status, Json(self)).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

/// Diagnostic payload attached to error envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorModel {
    /// Error category/kind.
    pub title: String,

    /// Detailed error message.
    pub message: String,

    /// Field name to validation message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<BTreeMap<String, String>>,

    /// Underlying error text, only attached in diagnostic mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<String>,
}

impl ErrorModel {
    /// Create a simple error model.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            field_errors: None,
            inner_error: None,
        }
    }

    /// Create an error model from field validation failures.
    #[must_use]
    pub fn from_field_errors(field_errors: BTreeMap<String, String>) -> Self {
        Self {
            title: "Validation Error".to_string(),
            message: format!("Validation failed with {} error(s)", field_errors.len()),
            field_errors: Some(field_errors),
            inner_error: None,
        }
    }

    /// Attach underlying error text.
    #[must_use]
    pub fn with_inner(mut self, inner: impl Into<String>) -> Self {
        self.inner_error = Some(inner.into());
        self
    }
}
