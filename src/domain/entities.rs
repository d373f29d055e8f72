//! Persistent entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role granted to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    /// Full access, including user management.
    Admin,
    /// Teaches courses.
    Instructor,
    /// Enrolls in courses.
    #[default]
    Student,
}

impl Role {
    /// Role name as stored and carried in tokens.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Instructor => "Instructor",
            Self::Student => "Student",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Self::Admin),
            "Instructor" => Ok(Self::Instructor),
            "Student" => Ok(Self::Student),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Login email, unique ignoring case.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Granted role.
    pub role: Role,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Course taught by an instructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Identifier.
    pub id: i64,
    /// Course title.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Owning user.
    pub instructor_id: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Enrollment of a user in a course.
///
/// A `(user_id, course_id)` pair appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    /// Identifier.
    pub id: i64,
    /// Enrolled user.
    pub user_id: i64,
    /// Target course.
    pub course_id: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Admin, Role::Instructor, Role::Student] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            assert_eq!(
                serde_json::to_string(&role).unwrap(),
                format!("\"{}\"", role.as_str())
            );
        }
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_course_description_defaults() {
        let course: Course = serde_json::from_str(
            r#"{"id":1,"title":"Rust","instructor_id":2,
                "created_at":"2026-01-01T00:00:00Z","updated_at":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(course.description.is_empty());
    }
}
