//! Storage trait definitions.
//!
//! These traits define the interface for storage backends, enabling swapping
//! between different implementations without changing business logic.
//!
//! Reads go straight to the backend. Writes are expressed as a batch of
//! [`Change`]s that [`Storage::apply`] commits atomically.

use async_trait::async_trait;

use crate::domain::{Course, Enrollment, PageRequest, User};
use crate::error::StorageResult;

/// Persistent tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// Users.
    Users,
    /// Courses.
    Courses,
    /// Enrollments.
    Enrollments,
}

impl Table {
    /// All tables.
    pub const ALL: [Self; 3] = [Self::Users, Self::Courses, Self::Enrollments];

    /// Table name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Courses => "courses",
            Self::Enrollments => "enrollments",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A staged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Insert a new user.
    InsertUser(User),
    /// Replace an existing user.
    UpdateUser(User),
    /// Delete a user together with the courses they teach and all related enrollments.
    DeleteUser(i64),
    /// Insert a new course.
    InsertCourse(Course),
    /// Replace an existing course.
    UpdateCourse(Course),
    /// Delete a course and its enrollments.
    DeleteCourse(i64),
    /// Insert a new enrollment.
    InsertEnrollment(Enrollment),
    /// Replace an existing enrollment.
    UpdateEnrollment(Enrollment),
    /// Delete an enrollment.
    DeleteEnrollment(i64),
}

impl Change {
    /// Table the change targets.
    #[must_use]
    pub const fn table(&self) -> Table {
        match self {
            Self::InsertUser(_) | Self::UpdateUser(_) | Self::DeleteUser(_) => Table::Users,
            Self::InsertCourse(_) | Self::UpdateCourse(_) | Self::DeleteCourse(_) => Table::Courses,
            Self::InsertEnrollment(_) | Self::UpdateEnrollment(_) | Self::DeleteEnrollment(_) => {
                Table::Enrollments
            }
        }
    }
}

/// One page of rows and the total matching count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// Rows matching the query across all pages.
    pub total: i64,
}

/// Enrollment joined with the names it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentDetails {
    /// The enrollment row.
    pub enrollment: Enrollment,
    /// Name of the enrolled user.
    pub user_name: String,
    /// Title of the course.
    pub course_title: String,
}

/// User reads.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Get a user by id.
    async fn get_user(&self, id: i64) -> StorageResult<Option<User>>;

    /// Find a user by email, ignoring case.
    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>>;

    /// List all users ordered by id.
    async fn list_users(&self) -> StorageResult<Vec<User>>;

    /// One page of users; the search term matches name or email.
    async fn page_users(&self, page: &PageRequest) -> StorageResult<Page<User>>;

    /// Number of users.
    async fn count_users(&self) -> StorageResult<i64>;
}

/// Course reads.
#[async_trait]
pub trait CourseStorage: Send + Sync {
    /// Get a course by id.
    async fn get_course(&self, id: i64) -> StorageResult<Option<Course>>;

    /// List all courses ordered by id.
    async fn list_courses(&self) -> StorageResult<Vec<Course>>;

    /// One page of courses; the search term matches title or description.
    async fn page_courses(&self, page: &PageRequest) -> StorageResult<Page<Course>>;
}

/// Enrollment reads.
#[async_trait]
pub trait EnrollmentStorage: Send + Sync {
    /// Get an enrollment by id.
    async fn get_enrollment(&self, id: i64) -> StorageResult<Option<EnrollmentDetails>>;

    /// List all enrollments ordered by id.
    async fn list_enrollments(&self) -> StorageResult<Vec<EnrollmentDetails>>;

    /// One page of enrollments; the search term matches user name or course title.
    async fn page_enrollments(&self, page: &PageRequest)
    -> StorageResult<Page<EnrollmentDetails>>;

    /// Whether the user is already enrolled in the course.
    async fn enrollment_exists(&self, user_id: i64, course_id: i64) -> StorageResult<bool>;
}

/// Combined storage trait for all storage operations.
#[async_trait]
pub trait Storage: UserStorage + CourseStorage + EnrollmentStorage {
    /// Reserve the next identifier for a table.
    async fn next_id(&self, table: Table) -> StorageResult<i64>;

    /// Commit a batch of changes atomically.
    ///
    /// Either every change is persisted or none is. Unique and referential
    /// violations fail with [`StorageError::Conflict`](crate::error::StorageError::Conflict),
    /// updates and deletes of missing rows with
    /// [`StorageError::NotFound`](crate::error::StorageError::NotFound).
    async fn apply(&self, changes: Vec<Change>) -> StorageResult<()>;

    /// Check if the storage backend is healthy and reachable.
    async fn health_check(&self) -> StorageResult<()>;

    /// Get the storage backend name.
    fn backend_name(&self) -> &'static str;
}

/// Trait object alias for Storage.
pub type DynStorage = dyn Storage;
