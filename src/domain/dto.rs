//! Data Transfer Objects for API requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::entities::{Course, Role, User};

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    /// Identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Granted role.
    pub role: Role,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Public view of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDto {
    /// Identifier.
    pub id: i64,
    /// Course title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Owning user.
    pub instructor_id: i64,
}

impl From<&Course> for CourseDto {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id,
            title: course.title.clone(),
            description: course.description.clone(),
            instructor_id: course.instructor_id,
        }
    }
}

/// Public view of an enrollment, joined with user and course names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentDto {
    /// Identifier.
    pub id: i64,
    /// Enrolled user.
    pub user_id: i64,
    /// Target course.
    pub course_id: i64,
    /// Name of the enrolled user.
    pub user_name: String,
    /// Title of the course.
    pub course_title: String,
    /// When the enrollment was created.
    pub enrolled_at: DateTime<Utc>,
}

/// Identifier of a newly created resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedId {
    /// Identifier.
    pub id: i64,
}

/// Login request body.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Account email.
    #[validate(email(message = "A valid email is required."))]
    pub email: String,

    /// Account password.
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

/// Successful login payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Bearer token.
    pub token: String,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
    /// Authenticated user.
    pub user: UserDto,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,

    /// Service version.
    pub version: String,
}

/// Readiness check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    /// Overall readiness status.
    pub ready: bool,

    /// Individual component statuses.
    pub components: ReadyComponents,
}

/// Component readiness statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyComponents {
    /// Storage backend status.
    pub storage: bool,

    /// Storage backend name.
    pub backend: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 7,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Instructor,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_user_dto_hides_password_hash() {
        let value = serde_json::to_value(UserDto::from(&user())).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["role"], "Instructor");
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("password_hash").is_none());
    }

    #[test]
    fn test_course_dto_is_camel_case() {
        let now = Utc::now();
        let course = Course {
            id: 3,
            title: "Rust".to_string(),
            description: "Ownership".to_string(),
            instructor_id: 7,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(CourseDto::from(&course)).unwrap();
        assert_eq!(value["instructorId"], 7);
    }

    #[test]
    fn test_login_request_validation() {
        let valid = LoginRequest {
            email: "ada@example.com".to_string(),
            password: "hunter22".to_string(),
        };
        assert!(valid.validate().is_ok());

        let invalid = LoginRequest {
            email: "nope".to_string(),
            password: String::new(),
        };
        let errors = invalid.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 2);
    }
}
