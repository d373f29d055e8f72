//! Explicit success/failure values.
//!
//! [`Outcome`] is for operations where failure is an expected, handled result
//! rather than an error to propagate. It converts to and from the crate
//! [`Result`](crate::error::Result) at the edges.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::error::{AppError, ErrorCode};

/// Shared error cause carried by a failure.
pub type Cause = Arc<dyn StdError + Send + Sync>;

/// Success or failure of an operation.
#[derive(Clone)]
pub enum Outcome<T> {
    /// Operation succeeded with data.
    Success(T),
    /// Operation failed.
    Failure {
        /// Human-readable message.
        message: String,
        /// Optional application error code.
        code: Option<ErrorCode>,
        /// Optional underlying error.
        cause: Option<Cause>,
    },
}

impl<T> Outcome<T> {
    /// Successful outcome.
    pub const fn success(data: T) -> Self {
        Self::Success(data)
    }

    /// Failed outcome with a message and optional code.
    pub fn failure(message: impl Into<String>, code: Option<ErrorCode>) -> Self {
        Self::Failure {
            message: message.into(),
            code,
            cause: None,
        }
    }

    /// Failed outcome built from an error value.
    pub fn failure_from<E>(error: E, code: Option<ErrorCode>) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Failure {
            message: error.to_string(),
            code,
            cause: Some(Arc::new(error)),
        }
    }

    /// Whether this is a success.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether this is a failure.
    pub const fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Data of a success.
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failure { .. } => None,
        }
    }

    /// Message of a failure.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { message, .. } => Some(message),
        }
    }

    /// Code of a failure.
    pub const fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Success(_) => None,
            Self::Failure { code, .. } => *code,
        }
    }

    /// Underlying error of a failure.
    pub const fn cause(&self) -> Option<&Cause> {
        match self {
            Self::Success(_) => None,
            Self::Failure { cause, .. } => cause.as_ref(),
        }
    }

    /// Transform the data of a success; failures pass through unchanged.
    pub fn map<U, F>(self, transform: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Success(data) => Outcome::Success(transform(data)),
            Self::Failure {
                message,
                code,
                cause,
            } => Outcome::Failure {
                message,
                code,
                cause,
            },
        }
    }

    /// Transform the data of a success with a fallible function.
    ///
    /// An `Err` from the transform becomes a failure carrying that error.
    pub fn try_map<U, E, F>(self, transform: F) -> Outcome<U>
    where
        F: FnOnce(T) -> std::result::Result<U, E>,
        E: StdError + Send + Sync + 'static,
    {
        self.bind(|data| match transform(data) {
            Ok(value) => Outcome::Success(value),
            Err(error) => Outcome::failure_from(error, None),
        })
    }

    /// Chain another outcome-producing step; failures short-circuit.
    pub fn bind<U, F>(self, transform: F) -> Outcome<U>
    where
        F: FnOnce(T) -> Outcome<U>,
    {
        match self {
            Self::Success(data) => transform(data),
            Self::Failure {
                message,
                code,
                cause,
            } => Outcome::Failure {
                message,
                code,
                cause,
            },
        }
    }

    /// Run a side effect on success data.
    #[must_use]
    pub fn tap<F>(self, action: F) -> Self
    where
        F: FnOnce(&T),
    {
        if let Self::Success(data) = &self {
            action(data);
        }
        self
    }

    /// Run a side effect on a failure message and code.
    #[must_use]
    pub fn tap_error<F>(self, action: F) -> Self
    where
        F: FnOnce(&str, Option<ErrorCode>),
    {
        if let Self::Failure { message, code, .. } = &self {
            action(message, *code);
        }
        self
    }

    /// Exhaustive case analysis.
    pub fn match_with<R>(
        self,
        on_success: impl FnOnce(T) -> R,
        on_failure: impl FnOnce(String, Option<ErrorCode>) -> R,
    ) -> R {
        match self {
            Self::Success(data) => on_success(data),
            Self::Failure { message, code, .. } => on_failure(message, code),
        }
    }

    /// Return the data of a success.
    ///
    /// This is an escape hatch for call sites that have already established
    /// success; prefer [`Outcome::match_with`] or [`Outcome::into_result`].
    ///
    /// # Panics
    ///
    /// Panics when called on a failure.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Self::Success(data) => data,
            Self::Failure { message, .. } => {
                panic!("called `Outcome::unwrap()` on a failure: {message}")
            }
        }
    }

    /// Return the data of a success or a fallback.
    pub fn unwrap_or(self, fallback: T) -> T {
        match self {
            Self::Success(data) => data,
            Self::Failure { .. } => fallback,
        }
    }

    /// Convert into the crate result type.
    ///
    /// Failures without a code become validation errors.
    ///
    /// # Errors
    ///
    /// Returns the failure as an [`AppError::Application`].
    pub fn into_result(self) -> crate::error::Result<T> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Failure {
                message,
                code,
                cause,
            } => Err(AppError::Application {
                message,
                code: code.unwrap_or(ErrorCode::ValidationError),
                details: cause.map(|cause| cause.to_string()),
            }),
        }
    }
}

impl<T> From<crate::error::Result<T>> for Outcome<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(error) => {
                let code = error.error_code();
                Self::failure_from(error, Some(code))
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(data) => f.debug_tuple("Success").field(data).finish(),
            Self::Failure {
                message,
                code,
                cause,
            } => f
                .debug_struct("Failure")
                .field("message", message)
                .field("code", code)
                .field("cause", &cause.as_ref().map(ToString::to_string))
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("parse failed")]
    struct ParseFailed;

    #[test]
    fn test_success_and_failure_are_exclusive() {
        let ok = Outcome::success(1);
        let failed = Outcome::<i32>::failure("nope", Some(ErrorCode::UserNotFound));

        for outcome in [&ok, &failed] {
            assert_eq!(outcome.is_success(), !outcome.is_failure());
        }
        assert_eq!(ok.data(), Some(&1));
        assert!(ok.error_message().is_none());
        assert!(failed.data().is_none());
        assert_eq!(failed.error_message(), Some("nope"));
        assert_eq!(failed.error_code(), Some(ErrorCode::UserNotFound));
    }

    #[test]
    fn test_map_on_success() {
        let mapped = Outcome::success(20).map(|n| n + 1);
        assert_eq!(mapped.data(), Some(&21));
    }

    #[test]
    fn test_map_short_circuits_failure() {
        let mut called = false;
        let mapped = Outcome::<i32>::failure("gone", Some(ErrorCode::CourseNotFound)).map(|n| {
            called = true;
            n * 2
        });

        assert!(!called);
        assert_eq!(mapped.error_message(), Some("gone"));
        assert_eq!(mapped.error_code(), Some(ErrorCode::CourseNotFound));
    }

    #[test]
    fn test_try_map_captures_transform_error() {
        let mapped = Outcome::success("x").try_map(|_| Err::<i32, _>(ParseFailed));

        assert!(mapped.is_failure());
        assert_eq!(mapped.error_message(), Some("parse failed"));
        assert!(mapped.cause().is_some());
    }

    #[test]
    fn test_bind_chains() {
        let chained = Outcome::success(4).bind(|n| {
            if n % 2 == 0 {
                Outcome::success(n / 2)
            } else {
                Outcome::failure("odd", None)
            }
        });
        assert_eq!(chained.data(), Some(&2));

        let failed = Outcome::success(3).bind(|n| {
            if n % 2 == 0 {
                Outcome::success(n / 2)
            } else {
                Outcome::<i32>::failure("odd", None)
            }
        });
        assert_eq!(failed.error_message(), Some("odd"));
    }

    #[test]
    fn test_tap_and_match() {
        let mut seen = None;
        let outcome = Outcome::success(7).tap(|n| seen = Some(*n));
        assert_eq!(seen, Some(7));

        let mut seen_error = None;
        let described = Outcome::<i32>::failure("bad", Some(ErrorCode::Forbidden))
            .tap_error(|message, code| seen_error = Some((message.to_string(), code)))
            .match_with(|n| n.to_string(), |message, _| format!("failed: {message}"));
        assert_eq!(described, "failed: bad");
        assert_eq!(
            seen_error,
            Some(("bad".to_string(), Some(ErrorCode::Forbidden)))
        );

        assert_eq!(outcome.unwrap(), 7);
    }

    #[test]
    #[should_panic(expected = "on a failure: boom")]
    fn test_unwrap_failure_panics() {
        Outcome::<i32>::failure("boom", None).unwrap();
    }

    #[test]
    fn test_into_result() {
        let err = Outcome::<()>::failure("taken", Some(ErrorCode::DuplicateEmail))
            .into_result()
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::DuplicateEmail);

        let err = Outcome::<()>::failure("bad", None).into_result().unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError);

        assert_eq!(Outcome::success(5).unwrap_or(0), 5);
    }

    #[test]
    fn test_from_result_keeps_code() {
        let outcome: Outcome<()> = Err(AppError::application(
            ErrorCode::InvalidCredentials,
            "Invalid email or password.",
        ))
        .into();

        assert_eq!(outcome.error_code(), Some(ErrorCode::InvalidCredentials));
        assert_eq!(outcome.error_message(), Some("Invalid email or password."));
    }
}
