//! Response normalization.
//!
//! Every handler return type implements [`IntoApiResponse`], so the choice
//! between passing an envelope through, unwrapping an [`Outcome`] and
//! wrapping a plain value is made at compile time.

use std::future::Future;

use axum::http::StatusCode;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{
    ApiResponse, CourseDto, CreatedId, EnrollmentDto, LoginResponse, Outcome, Paged, UserDto,
};
use crate::error::{AppError, Result};

/// Message used when an operation returns no data.
pub const EMPTY_SUCCESS_MESSAGE: &str = "Operation completed successfully";

/// Which normalization path a response took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// The handler already produced an envelope.
    AlreadyWrapped,
    /// The handler produced an [`Outcome`].
    Result,
    /// The handler produced a plain value.
    Value,
    /// The handler produced an absent value.
    Absent,
}

impl Branch {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyWrapped => "already_wrapped",
            Self::Result => "result",
            Self::Value => "value",
            Self::Absent => "absent",
        }
    }
}

/// Normalized handler output.
#[derive(Debug)]
pub enum Normalized<T> {
    /// Canonical envelope.
    Envelope(ApiResponse<T>),
    /// Nothing was found; the transport decides which not-found to report.
    Absent,
}

impl<T> Normalized<T> {
    /// Envelope, or the error produced by `missing` when absent.
    ///
    /// # Errors
    ///
    /// Returns `missing()` for an absent value.
    pub fn or_else(self, missing: impl FnOnce() -> AppError) -> Result<ApiResponse<T>> {
        match self {
            Self::Envelope(envelope) => Ok(envelope),
            Self::Absent => Err(missing()),
        }
    }

    /// Envelope of a handler whose return type cannot be absent.
    ///
    /// # Errors
    ///
    /// Returns an internal error for an absent value.
    pub fn expect_envelope(self) -> Result<ApiResponse<T>> {
        self.or_else(|| AppError::Internal("Handler returned no response".to_string()))
    }
}

/// Conversion of a handler return value into the response envelope.
pub trait IntoApiResponse {
    /// Payload type carried in `data`.
    type Data: Serialize + Send;

    /// Convert into an envelope, reporting the path taken.
    fn normalize(self) -> (Branch, Normalized<Self::Data>);
}

impl<T: Serialize + Send> IntoApiResponse for ApiResponse<T> {
    type Data = T;

    fn normalize(self) -> (Branch, Normalized<T>) {
        (Branch::AlreadyWrapped, Normalized::Envelope(self))
    }
}

/// A failed outcome always becomes a 400 envelope carrying its code.
impl<T: Serialize + Send> IntoApiResponse for Outcome<T> {
    type Data = T;

    fn normalize(self) -> (Branch, Normalized<T>) {
        let envelope = self.match_with(ApiResponse::ok, |message, code| {
            ApiResponse::fail(message, StatusCode::BAD_REQUEST, code, None, None)
        });
        (Branch::Result, Normalized::Envelope(envelope))
    }
}

impl<T: Serialize + Send> IntoApiResponse for Option<T> {
    type Data = T;

    fn normalize(self) -> (Branch, Normalized<T>) {
        match self {
            Some(value) => (Branch::Value, Normalized::Envelope(ApiResponse::ok(value))),
            None => (Branch::Absent, Normalized::Absent),
        }
    }
}

impl<T: Serialize + Send> IntoApiResponse for Vec<T> {
    type Data = Self;

    fn normalize(self) -> (Branch, Normalized<Self>) {
        (Branch::Value, Normalized::Envelope(ApiResponse::ok(self)))
    }
}

impl<T: Serialize + Send> IntoApiResponse for Paged<T> {
    type Data = Vec<T>;

    fn normalize(self) -> (Branch, Normalized<Vec<T>>) {
        (
            Branch::Value,
            Normalized::Envelope(ApiResponse::paged(self.items, self.pagination)),
        )
    }
}

impl IntoApiResponse for () {
    type Data = ();

    fn normalize(self) -> (Branch, Normalized<()>) {
        (
            Branch::Value,
            Normalized::Envelope(ApiResponse::ok_empty(EMPTY_SUCCESS_MESSAGE)),
        )
    }
}

macro_rules! plain_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoApiResponse for $ty {
                type Data = Self;

                fn normalize(self) -> (Branch, Normalized<Self>) {
                    (Branch::Value, Normalized::Envelope(ApiResponse::ok(self)))
                }
            }
        )*
    };
}

plain_value!(
    UserDto,
    CourseDto,
    EnrollmentDto,
    CreatedId,
    LoginResponse,
    String,
    i64,
    bool,
);

/// Run a handler future and normalize what it returns.
///
/// Handler errors propagate unchanged; they are rendered at the HTTP boundary.
///
/// # Errors
///
/// Returns the handler's error.
pub async fn wrap_response<F, V>(request_type: &'static str, handler: F) -> Result<Normalized<V::Data>>
where
    F: Future<Output = Result<V>> + Send,
    V: IntoApiResponse,
{
    debug!(request_type, "Handling request");

    let value = handler.await?;
    let (branch, normalized) = value.normalize();

    match (&branch, &normalized) {
        (Branch::Result, Normalized::Envelope(envelope)) if !envelope.success => {
            info!(
                request_type,
                branch = branch.as_str(),
                error_code = envelope.error_code,
                "Request returned a failed result"
            );
        }
        _ => {
            debug!(request_type, branch = branch.as_str(), "Response normalized");
        }
    }

    metrics::counter!("lms_responses_normalized_total", "branch" => branch.as_str()).increment(1);

    Ok(normalized)
}
