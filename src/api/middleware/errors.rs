//! Error boundary middleware.
//!
//! Every failed response leaves here as a canonical error envelope carrying
//! the request's trace id. Responses rendered from an `AppError` carry an
//! [`ErrorReport`] in their extensions; other error statuses produced by the
//! router itself (method not allowed, body limits) are described from the
//! status alone.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::api::state::AppState;
use crate::domain::ErrorModel;
use crate::error::{ErrorCode, ErrorReport};

/// Request id header shared with the request-id layers.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Trace id used when a request carries no usable id.
const UNKNOWN_TRACE_ID: &str = "unknown";

/// Request id of the current request.
pub fn trace_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_TRACE_ID)
        .to_string()
}

/// Describe an error status that no handler reported.
fn report_for_status(status: StatusCode) -> ErrorReport {
    let reason = status.canonical_reason().unwrap_or("Request failed");
    let code = if status.is_server_error() {
        ErrorCode::InternalServerError
    } else {
        ErrorCode::ValidationError
    };

    ErrorReport {
        status,
        code,
        message: reason.to_string(),
        details: ErrorModel::new("HttpError", reason),
    }
}

/// Middleware that renders every failed response as an error envelope.
pub async fn normalize_errors(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = trace_id(req.headers());
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let report = response
        .extensions()
        .get::<ErrorReport>()
        .cloned()
        .unwrap_or_else(|| report_for_status(status));

    let code = report.code.as_i32();
    if report.status.is_server_error() {
        error!(
            %method,
            path,
            trace_id,
            status = report.status.as_u16(),
            error_code = code,
            inner = report.details.inner_error.as_deref(),
            message = %report.message,
            "Request failed"
        );
    } else {
        warn!(
            %method,
            path,
            trace_id,
            status = report.status.as_u16(),
            error_code = code,
            message = %report.message,
            "Request rejected"
        );
    }

    metrics::counter!(
        "lms_request_errors_total",
        "status" => report.status.as_u16().to_string(),
        "error_code" => code.to_string()
    )
    .increment(1);

    report
        .envelope(Some(trace_id), state.config.observability.error_details)
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_trace_id_falls_back_to_unknown() {
        let mut headers = HeaderMap::new();
        assert_eq!(trace_id(&headers), "unknown");

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("abc-123"));
        assert_eq!(trace_id(&headers), "abc-123");
    }

    #[test]
    fn test_report_for_status() {
        let report = report_for_status(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(report.code, ErrorCode::ValidationError);
        assert_eq!(report.message, "Method Not Allowed");

        let report = report_for_status(StatusCode::BAD_GATEWAY);
        assert_eq!(report.code, ErrorCode::InternalServerError);
    }
}
