//! `PostgreSQL` storage backend.
//!
//! The schema is created on connect. Every batch passed to
//! [`Storage::apply`] runs inside one transaction; uniqueness and references
//! are enforced by the database.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::PostgresStorageConfig;
use crate::domain::{Course, Enrollment, PageRequest, Role, User};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{
    Change, CourseStorage, EnrollmentDetails, EnrollmentStorage, Page, Storage, Table, UserStorage,
};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id            BIGSERIAL PRIMARY KEY,
    name          VARCHAR(100) NOT NULL,
    email         VARCHAR(200) NOT NULL,
    password_hash TEXT         NOT NULL,
    role          VARCHAR(20)  NOT NULL,
    created_at    TIMESTAMPTZ  NOT NULL,
    updated_at    TIMESTAMPTZ  NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS users_email_lower_key ON users (LOWER(email));

CREATE TABLE IF NOT EXISTS courses (
    id            BIGSERIAL PRIMARY KEY,
    title         VARCHAR(150) NOT NULL,
    description   VARCHAR(500) NOT NULL DEFAULT '',
    instructor_id BIGINT       NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    created_at    TIMESTAMPTZ  NOT NULL,
    updated_at    TIMESTAMPTZ  NOT NULL
);

CREATE TABLE IF NOT EXISTS enrollments (
    id         BIGSERIAL PRIMARY KEY,
    user_id    BIGINT      NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    course_id  BIGINT      NOT NULL REFERENCES courses (id) ON DELETE CASCADE,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    UNIQUE (user_id, course_id)
);
";

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";
const COURSE_COLUMNS: &str = "id, title, description, instructor_id, created_at, updated_at";
const ENROLLMENT_SELECT: &str = "SELECT e.id, e.user_id, e.course_id, e.created_at, e.updated_at, \
     u.name AS user_name, c.title AS course_title \
     FROM enrollments e \
     JOIN users u ON u.id = e.user_id \
     JOIN courses c ON c.id = e.course_id";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StorageError;

    fn try_from(row: UserRow) -> StorageResult<Self> {
        let role: Role = row.role.parse().map_err(StorageError::Serialization)?;
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CourseRow {
    id: i64,
    title: String,
    description: String,
    instructor_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            instructor_id: row.instructor_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EnrollmentRow {
    id: i64,
    user_id: i64,
    course_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user_name: String,
    course_title: String,
}

impl From<EnrollmentRow> for EnrollmentDetails {
    fn from(row: EnrollmentRow) -> Self {
        Self {
            enrollment: Enrollment {
                id: row.id,
                user_id: row.user_id,
                course_id: row.course_id,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            user_name: row.user_name,
            course_title: row.course_title,
        }
    }
}

/// `ILIKE` pattern matching `term` anywhere, with wildcards in `term` escaped.
fn like_pattern(term: Option<&str>) -> Option<String> {
    term.map(|term| {
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{escaped}%")
    })
}

fn users_from(rows: Vec<UserRow>) -> StorageResult<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

/// `PostgreSQL` storage implementation.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect and make sure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or the schema cannot be created.
    pub async fn connect(config: &PostgresStorageConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .connect(&config.url)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        tracing::info!(
            max_connections = config.max_connections,
            "PostgreSQL schema ready"
        );

        Ok(Self { pool })
    }

    async fn apply_change(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        change: Change,
    ) -> StorageResult<()> {
        let table = change.table();
        let (id, query) = match &change {
            Change::InsertUser(user) => (
                user.id,
                sqlx::query(
                    "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.role.as_str())
                .bind(user.created_at)
                .bind(user.updated_at),
            ),
            Change::UpdateUser(user) => (
                user.id,
                sqlx::query(
                    "UPDATE users SET name = $2, email = $3, password_hash = $4, role = $5,
                         updated_at = $6
                     WHERE id = $1",
                )
                .bind(user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.role.as_str())
                .bind(user.updated_at),
            ),
            Change::InsertCourse(course) => (
                course.id,
                sqlx::query(
                    "INSERT INTO courses (id, title, description, instructor_id, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(course.id)
                .bind(&course.title)
                .bind(&course.description)
                .bind(course.instructor_id)
                .bind(course.created_at)
                .bind(course.updated_at),
            ),
            Change::UpdateCourse(course) => (
                course.id,
                sqlx::query(
                    "UPDATE courses SET title = $2, description = $3, instructor_id = $4,
                         updated_at = $5
                     WHERE id = $1",
                )
                .bind(course.id)
                .bind(&course.title)
                .bind(&course.description)
                .bind(course.instructor_id)
                .bind(course.updated_at),
            ),
            Change::InsertEnrollment(enrollment) => (
                enrollment.id,
                sqlx::query(
                    "INSERT INTO enrollments (id, user_id, course_id, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(enrollment.id)
                .bind(enrollment.user_id)
                .bind(enrollment.course_id)
                .bind(enrollment.created_at)
                .bind(enrollment.updated_at),
            ),
            Change::UpdateEnrollment(enrollment) => (
                enrollment.id,
                sqlx::query(
                    "UPDATE enrollments SET user_id = $2, course_id = $3, updated_at = $4
                     WHERE id = $1",
                )
                .bind(enrollment.id)
                .bind(enrollment.user_id)
                .bind(enrollment.course_id)
                .bind(enrollment.updated_at),
            ),
            Change::DeleteUser(id) => (*id, sqlx::query("DELETE FROM users WHERE id = $1").bind(*id)),
            Change::DeleteCourse(id) => {
                (*id, sqlx::query("DELETE FROM courses WHERE id = $1").bind(*id))
            }
            Change::DeleteEnrollment(id) => (
                *id,
                sqlx::query("DELETE FROM enrollments WHERE id = $1").bind(*id),
            ),
        };

        let result = query.execute(&mut **tx).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("{table} row {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStorage for PostgresStorage {
    async fn get_user(&self, id: i64) -> StorageResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn list_users(&self) -> StorageResult<Vec<User>> {
        let rows =
            sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        users_from(rows)
    }

    async fn page_users(&self, page: &PageRequest) -> StorageResult<Page<User>> {
        let pattern = like_pattern(page.search_term.as_deref());
        let filter = "($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {filter} ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(page.page_size)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items: users_from(rows)?,
            total,
        })
    }

    async fn count_users(&self) -> StorageResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl CourseStorage for PostgresStorage {
    async fn get_course(&self, id: i64) -> StorageResult<Option<Course>> {
        Ok(sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Course::from))
    }

    async fn list_courses(&self) -> StorageResult<Vec<Course>> {
        let rows = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Course::from).collect())
    }

    async fn page_courses(&self, page: &PageRequest) -> StorageResult<Page<Course>> {
        let pattern = like_pattern(page.search_term.as_deref());
        let filter = "($1::text IS NULL OR title ILIKE $1 OR description ILIKE $1)";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM courses WHERE {filter}"))
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;
        let rows = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE {filter} ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(page.page_size)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items: rows.into_iter().map(Course::from).collect(),
            total,
        })
    }
}

#[async_trait]
impl EnrollmentStorage for PostgresStorage {
    async fn get_enrollment(&self, id: i64) -> StorageResult<Option<EnrollmentDetails>> {
        Ok(
            sqlx::query_as::<_, EnrollmentRow>(&format!("{ENROLLMENT_SELECT} WHERE e.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .map(EnrollmentDetails::from),
        )
    }

    async fn list_enrollments(&self) -> StorageResult<Vec<EnrollmentDetails>> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(&format!("{ENROLLMENT_SELECT} ORDER BY e.id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(EnrollmentDetails::from).collect())
    }

    async fn page_enrollments(
        &self,
        page: &PageRequest,
    ) -> StorageResult<Page<EnrollmentDetails>> {
        let pattern = like_pattern(page.search_term.as_deref());
        let filter = "($1::text IS NULL OR u.name ILIKE $1 OR c.title ILIKE $1)";

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM enrollments e \
             JOIN users u ON u.id = e.user_id \
             JOIN courses c ON c.id = e.course_id WHERE {filter}"
        ))
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, EnrollmentRow>(&format!(
            "{ENROLLMENT_SELECT} WHERE {filter} ORDER BY e.id LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(page.page_size)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items: rows.into_iter().map(EnrollmentDetails::from).collect(),
            total,
        })
    }

    async fn enrollment_exists(&self, user_id: i64, course_id: i64) -> StorageResult<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?)
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn next_id(&self, table: Table) -> StorageResult<i64> {
        Ok(
            sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence($1, 'id'))")
                .bind(table.as_str())
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn apply(&self, changes: Vec<Change>) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        for change in changes {
            // Dropping the transaction on error rolls it back.
            Self::apply_change(&mut tx, change).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgresql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(None), None);
        assert_eq!(like_pattern(Some("rust")).as_deref(), Some("%rust%"));
        assert_eq!(
            like_pattern(Some("100%_done")).as_deref(),
            Some("%100\\%\\_done%")
        );
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let now = Utc::now();
        let row = UserRow {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: "Wizard".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            User::try_from(row),
            Err(StorageError::Serialization(_))
        ));
    }

    /// Runs against a live database when `LMS_TEST_DATABASE_URL` is set.
    #[tokio::test]
    async fn test_round_trip_against_live_database() {
        let Ok(url) = std::env::var("LMS_TEST_DATABASE_URL") else {
            return;
        };
        let storage = PostgresStorage::connect(&PostgresStorageConfig {
            url,
            ..PostgresStorageConfig::default()
        })
        .await
        .unwrap();
        storage.health_check().await.unwrap();

        let now = Utc::now();
        let id = storage.next_id(Table::Users).await.unwrap();
        let email = format!("pg-{id}@example.com");
        storage
            .apply(vec![Change::InsertUser(User {
                id,
                name: "Pg".to_string(),
                email: email.clone(),
                password_hash: "hash".to_string(),
                role: Role::Student,
                created_at: now,
                updated_at: now,
            })])
            .await
            .unwrap();

        let found = storage
            .find_user_by_email(&email.to_uppercase())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id);

        storage.apply(vec![Change::DeleteUser(id)]).await.unwrap();
        assert!(storage.get_user(id).await.unwrap().is_none());
        assert!(matches!(
            storage.apply(vec![Change::DeleteUser(id)]).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
