//! Error code constants.
//!
//! Error codes are organized in bands by category:
//! - 1xxx: Validation errors
//! - 2xxx: Resource not found
//! - 3xxx: Authentication/Authorization errors
//! - 4xxx: Conflict/duplicate errors
//! - 5xxx: Internal/server errors

use axum::http::StatusCode;

/// Application error code.
///
/// The set is closed: clients branch on these numbers, so existing values never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    // ===== Validation Errors (1xxx) =====
    /// Generic request validation failure.
    ValidationError = 1001,
    /// Malformed email address.
    InvalidEmail = 1002,
    /// Password does not meet the policy.
    InvalidPassword = 1003,
    /// Email already registered.
    DuplicateEmail = 1004,

    // ===== Not Found Errors (2xxx) =====
    /// User does not exist.
    UserNotFound = 2001,
    /// Course does not exist.
    CourseNotFound = 2002,
    /// Enrollment does not exist.
    EnrollmentNotFound = 2003,
    /// Course instructor does not exist.
    InstructorNotFound = 2004,

    // ===== Authentication/Authorization Errors (3xxx) =====
    /// Authentication required.
    Unauthorized = 3001,
    /// Email/password pair rejected.
    InvalidCredentials = 3002,
    /// Bearer token expired.
    TokenExpired = 3003,
    /// Authenticated but not allowed.
    Forbidden = 3004,

    // ===== Conflict Errors (4xxx) =====
    /// User already enrolled in the course.
    DuplicateEnrollment = 4001,
    /// Course title already taken.
    CourseAlreadyExists = 4002,

    // ===== Internal/Server Errors (5xxx) =====
    /// Unclassified server failure.
    InternalServerError = 5000,
    /// Persistence failure.
    DatabaseError = 5001,
    /// Outbound email failure.
    EmailSendError = 5002,
    /// Commit/rollback failure.
    TransactionError = 5003,
}

impl ErrorCode {
    /// Get the error code as an i32.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Look up a code by its numeric value.
    #[must_use]
    pub const fn from_i32(value: i32) -> Option<Self> {
        let code = match value {
            1001 => Self::ValidationError,
            1002 => Self::InvalidEmail,
            1003 => Self::InvalidPassword,
            1004 => Self::DuplicateEmail,
            2001 => Self::UserNotFound,
            2002 => Self::CourseNotFound,
            2003 => Self::EnrollmentNotFound,
            2004 => Self::InstructorNotFound,
            3001 => Self::Unauthorized,
            3002 => Self::InvalidCredentials,
            3003 => Self::TokenExpired,
            3004 => Self::Forbidden,
            4001 => Self::DuplicateEnrollment,
            4002 => Self::CourseAlreadyExists,
            5000 => Self::InternalServerError,
            5001 => Self::DatabaseError,
            5002 => Self::EmailSendError,
            5003 => Self::TransactionError,
            _ => return None,
        };
        Some(code)
    }

    /// Get the category of this error code.
    #[must_use]
    pub const fn category(self) -> ErrorCategory {
        match self.as_i32() {
            1000..=1999 => ErrorCategory::Validation,
            2000..=2999 => ErrorCategory::NotFound,
            3000..=3999 => ErrorCategory::Authentication,
            4000..=4999 => ErrorCategory::Conflict,
            _ => ErrorCategory::Server,
        }
    }

    /// HTTP status used when this code reaches the HTTP boundary.
    ///
    /// Codes outside the explicit groups fall through to 500, including
    /// `InstructorNotFound` and `CourseAlreadyExists`.
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::ValidationError | Self::InvalidEmail | Self::InvalidPassword => {
                StatusCode::BAD_REQUEST
            }
            Self::DuplicateEmail | Self::DuplicateEnrollment => StatusCode::CONFLICT,
            Self::UserNotFound | Self::CourseNotFound | Self::EnrollmentNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::Unauthorized | Self::InvalidCredentials | Self::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.as_i32()
    }
}

/// Error category based on error code band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Validation errors (1xxx).
    Validation,
    /// Missing resources (2xxx).
    NotFound,
    /// Authentication/authorization errors (3xxx).
    Authentication,
    /// Conflicts and duplicates (4xxx).
    Conflict,
    /// Internal/server errors (5xxx).
    Server,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Authentication => write!(f, "authentication"),
            Self::Conflict => write!(f, "conflict"),
            Self::Server => write!(f, "server"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::ValidationError.as_i32(), 1001);
        assert_eq!(ErrorCode::DuplicateEmail.as_i32(), 1004);
        assert_eq!(ErrorCode::UserNotFound.as_i32(), 2001);
        assert_eq!(ErrorCode::Unauthorized.as_i32(), 3001);
        assert_eq!(ErrorCode::DuplicateEnrollment.as_i32(), 4001);
        assert_eq!(ErrorCode::InternalServerError.as_i32(), 5000);
    }

    #[test]
    fn test_from_i32_round_trips_every_code() {
        for value in [
            1001, 1002, 1003, 1004, 2001, 2002, 2003, 2004, 3001, 3002, 3003, 3004, 4001, 4002,
            5000, 5001, 5002, 5003,
        ] {
            let code = ErrorCode::from_i32(value).unwrap();
            assert_eq!(code.as_i32(), value);
        }
        assert_eq!(ErrorCode::from_i32(1005), None);
        assert_eq!(ErrorCode::from_i32(0), None);
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ErrorCode::InvalidEmail.category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            ErrorCode::CourseNotFound.category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            ErrorCode::TokenExpired.category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            ErrorCode::CourseAlreadyExists.category(),
            ErrorCategory::Conflict
        );
        assert_eq!(ErrorCode::DatabaseError.category(), ErrorCategory::Server);
    }

    #[test]
    fn test_status_table() {
        assert_eq!(
            ErrorCode::InvalidPassword.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ErrorCode::DuplicateEmail.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::DuplicateEnrollment.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::EnrollmentNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ErrorCode::InstructorNotFound.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::TransactionError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
