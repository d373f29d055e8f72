//! File-based storage backend.
//!
//! This backend stores data as JSON files with file locking for atomic operations.
//! Suitable for development and single-node deployments.
//!
//! Directory structure:
//! ```text
//! data/
//! ├── users/
//! │   └── {id}.json
//! ├── courses/
//! │   └── {id}.json
//! ├── enrollments/
//! │   └── {id}.json
//! ├── sequences/
//! │   └── {table}.json
//! └── .commit.lock
//! ```

mod batch;
mod sequence;
mod table;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tokio::sync::RwLock;

use crate::config::FileStorageConfig;
use crate::domain::{Course, Enrollment, PageRequest, User};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{
    Change, CourseStorage, EnrollmentDetails, EnrollmentStorage, Page, Storage, Table, UserStorage,
};

use batch::Snapshot;
pub use sequence::{FileSequences, SequenceState};
pub use table::{FileTable, Row, StagedRow};

/// File-based storage implementation.
pub struct FileStorage {
    /// Base data directory.
    base_dir: PathBuf,
    users: FileTable<User>,
    courses: FileTable<Course>,
    enrollments: FileTable<Enrollment>,
    sequences: FileSequences,
    /// Readers share, a committing batch is exclusive.
    commit: RwLock<()>,
}

impl FileStorage {
    /// Create a new file storage instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directories cannot be created.
    pub fn new(config: &FileStorageConfig) -> StorageResult<Self> {
        let base_dir = config.data_dir.clone();

        Self::ensure_directories(&base_dir)?;

        Ok(Self {
            users: FileTable::new(&base_dir),
            courses: FileTable::new(&base_dir),
            enrollments: FileTable::new(&base_dir),
            sequences: FileSequences::new(base_dir.join("sequences")),
            commit: RwLock::new(()),
            base_dir,
        })
    }

    /// Ensure all required directories exist.
    fn ensure_directories(base_dir: &Path) -> StorageResult<()> {
        let dirs = Table::ALL
            .iter()
            .map(|table| base_dir.join(table.as_str()))
            .chain([base_dir.to_path_buf(), base_dir.join("sequences")]);

        for dir in dirs {
            std::fs::create_dir_all(&dir).map_err(|e| {
                StorageError::FileIO(format!("Failed to create directory {}: {e}", dir.display()))
            })?;
        }

        Ok(())
    }

    fn snapshot(&self) -> StorageResult<Snapshot> {
        Ok(Snapshot::new(
            self.users.load_all()?,
            self.courses.load_all()?,
            self.enrollments.load_all()?,
        ))
    }

    /// Persist every row the batch touched; rows gone from the snapshot are removed.
    ///
    /// All rows are staged before any is published, so a failed write leaves
    /// the tables as they were. A failure while publishing can still leave the
    /// batch half applied.
    fn flush(&self, snapshot: &Snapshot) -> StorageResult<()> {
        let mut staged = Vec::new();
        let mut removed = Vec::new();

        for (table, id) in snapshot.dirty() {
            let row = match table {
                Table::Users => snapshot.users.get(&id).map(|row| self.users.stage(row)),
                Table::Courses => snapshot.courses.get(&id).map(|row| self.courses.stage(row)),
                Table::Enrollments => snapshot
                    .enrollments
                    .get(&id)
                    .map(|row| self.enrollments.stage(row)),
            };

            match row {
                Some(Ok(row)) => staged.push(row),
                Some(Err(e)) => {
                    staged.into_iter().for_each(StagedRow::discard);
                    return Err(e);
                }
                None => removed.push((table, id)),
            }
        }

        for row in staged {
            row.publish()?;
        }

        for (table, id) in removed {
            match table {
                Table::Users => self.users.remove(id)?,
                Table::Courses => self.courses.remove(id)?,
                Table::Enrollments => self.enrollments.remove(id)?,
            };
        }
        Ok(())
    }

    fn details(&self, rows: Vec<Enrollment>) -> StorageResult<Vec<EnrollmentDetails>> {
        let users: HashMap<i64, String> = self
            .users
            .load_all()?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();
        let courses: HashMap<i64, String> = self
            .courses
            .load_all()?
            .into_iter()
            .map(|c| (c.id, c.title))
            .collect();

        Ok(rows
            .into_iter()
            .map(|enrollment| EnrollmentDetails {
                user_name: users.get(&enrollment.user_id).cloned().unwrap_or_default(),
                course_title: courses
                    .get(&enrollment.course_id)
                    .cloned()
                    .unwrap_or_default(),
                enrollment,
            })
            .collect())
    }
}

/// Case-insensitive substring match of `term` against any of `fields`.
fn matches_term(term: Option<&str>, fields: &[&str]) -> bool {
    term.is_none_or(|term| {
        let term = term.to_lowercase();
        fields
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    })
}

fn page_of<T>(rows: Vec<T>, page: &PageRequest) -> Page<T> {
    let total = i64::try_from(rows.len()).unwrap_or(i64::MAX);
    let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let take = usize::try_from(page.page_size).unwrap_or(0);

    Page {
        items: rows.into_iter().skip(skip).take(take).collect(),
        total,
    }
}

#[async_trait]
impl UserStorage for FileStorage {
    async fn get_user(&self, id: i64) -> StorageResult<Option<User>> {
        let _guard = self.commit.read().await;
        self.users.load(id)
    }

    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let _guard = self.commit.read().await;
        let email = email.to_lowercase();
        Ok(self
            .users
            .load_all()?
            .into_iter()
            .find(|u| u.email.to_lowercase() == email))
    }

    async fn list_users(&self) -> StorageResult<Vec<User>> {
        let _guard = self.commit.read().await;
        self.users.load_all()
    }

    async fn page_users(&self, page: &PageRequest) -> StorageResult<Page<User>> {
        let _guard = self.commit.read().await;
        let term = page.search_term.as_deref();
        let rows = self
            .users
            .load_all()?
            .into_iter()
            .filter(|u| matches_term(term, &[u.name.as_str(), u.email.as_str()]))
            .collect();
        Ok(page_of(rows, page))
    }

    async fn count_users(&self) -> StorageResult<i64> {
        let _guard = self.commit.read().await;
        Ok(i64::try_from(self.users.load_all()?.len()).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl CourseStorage for FileStorage {
    async fn get_course(&self, id: i64) -> StorageResult<Option<Course>> {
        let _guard = self.commit.read().await;
        self.courses.load(id)
    }

    async fn list_courses(&self) -> StorageResult<Vec<Course>> {
        let _guard = self.commit.read().await;
        self.courses.load_all()
    }

    async fn page_courses(&self, page: &PageRequest) -> StorageResult<Page<Course>> {
        let _guard = self.commit.read().await;
        let term = page.search_term.as_deref();
        let rows = self
            .courses
            .load_all()?
            .into_iter()
            .filter(|c| matches_term(term, &[c.title.as_str(), c.description.as_str()]))
            .collect();
        Ok(page_of(rows, page))
    }
}

#[async_trait]
impl EnrollmentStorage for FileStorage {
    async fn get_enrollment(&self, id: i64) -> StorageResult<Option<EnrollmentDetails>> {
        let _guard = self.commit.read().await;
        match self.enrollments.load(id)? {
            Some(row) => Ok(self.details(vec![row])?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn list_enrollments(&self) -> StorageResult<Vec<EnrollmentDetails>> {
        let _guard = self.commit.read().await;
        self.details(self.enrollments.load_all()?)
    }

    async fn page_enrollments(
        &self,
        page: &PageRequest,
    ) -> StorageResult<Page<EnrollmentDetails>> {
        let _guard = self.commit.read().await;
        let term = page.search_term.as_deref();
        let rows = self
            .details(self.enrollments.load_all()?)?
            .into_iter()
            .filter(|d| matches_term(term, &[d.user_name.as_str(), d.course_title.as_str()]))
            .collect();
        Ok(page_of(rows, page))
    }

    async fn enrollment_exists(&self, user_id: i64, course_id: i64) -> StorageResult<bool> {
        let _guard = self.commit.read().await;
        Ok(self
            .enrollments
            .load_all()?
            .iter()
            .any(|e| e.user_id == user_id && e.course_id == course_id))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn next_id(&self, table: Table) -> StorageResult<i64> {
        let floor = match table {
            Table::Users => self.users.max_id()?,
            Table::Courses => self.courses.max_id()?,
            Table::Enrollments => self.enrollments.max_id()?,
        };
        self.sequences.next(table, floor).await
    }

    async fn apply(&self, changes: Vec<Change>) -> StorageResult<()> {
        let _guard = self.commit.write().await;

        let lock_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.base_dir.join(".commit.lock"))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        let result = self.snapshot().and_then(|mut snapshot| {
            for change in changes {
                snapshot.apply(change)?;
            }
            self.flush(&snapshot)
        });

        lock_file
            .unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        result
    }

    async fn health_check(&self) -> StorageResult<()> {
        if !self.base_dir.exists() {
            return Err(StorageError::Unavailable);
        }

        let test_file = self.base_dir.join(".health_check");
        tokio::fs::write(&test_file, b"ok")
            .await
            .map_err(|e| StorageError::FileIO(format!("Health check failed: {e}")))?;
        tokio::fs::remove_file(&test_file)
            .await
            .map_err(|e| StorageError::FileIO(format!("Health check cleanup failed: {e}")))?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_storage() -> (FileStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = FileStorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        };
        let storage = FileStorage::new(&config).unwrap();
        (storage, temp_dir)
    }

    fn user(id: i64, name: &str, email: &str) -> User {
        let now = Utc::now();
        User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Instructor,
            created_at: now,
            updated_at: now,
        }
    }

    fn course(id: i64, title: &str, instructor_id: i64) -> Course {
        let now = Utc::now();
        Course {
            id,
            title: title.to_string(),
            description: format!("All about {title}"),
            instructor_id,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seed(storage: &FileStorage) {
        let now = Utc::now();
        storage
            .apply(vec![
                Change::InsertUser(user(1, "Ada Lovelace", "ada@example.com")),
                Change::InsertUser(user(2, "Alan Turing", "alan@example.com")),
                Change::InsertCourse(course(1, "Rust Basics", 1)),
                Change::InsertCourse(course(2, "Compilers", 2)),
                Change::InsertEnrollment(Enrollment {
                    id: 1,
                    user_id: 2,
                    course_id: 1,
                    created_at: now,
                    updated_at: now,
                }),
            ])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_health_check() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.health_check().await.is_ok());
        assert_eq!(storage.backend_name(), "file");
    }

    #[tokio::test]
    async fn test_reads_after_apply() {
        let (storage, _temp) = create_test_storage();
        seed(&storage).await;

        assert_eq!(storage.count_users().await.unwrap(), 2);
        assert_eq!(
            storage
                .find_user_by_email("ADA@example.com")
                .await
                .unwrap()
                .unwrap()
                .id,
            1
        );
        assert_eq!(storage.list_courses().await.unwrap().len(), 2);
        assert!(storage.enrollment_exists(2, 1).await.unwrap());
        assert!(!storage.enrollment_exists(1, 1).await.unwrap());

        let details = storage.get_enrollment(1).await.unwrap().unwrap();
        assert_eq!(details.user_name, "Alan Turing");
        assert_eq!(details.course_title, "Rust Basics");
    }

    #[tokio::test]
    async fn test_paging_and_search() {
        let (storage, _temp) = create_test_storage();
        seed(&storage).await;

        let page = PageRequest {
            page_number: 1,
            page_size: 1,
            search_term: None,
        };
        let users = storage.page_users(&page).await.unwrap();
        assert_eq!(users.total, 2);
        assert_eq!(users.items.len(), 1);
        assert_eq!(users.items[0].id, 1);

        let page = PageRequest {
            page_number: 1,
            page_size: 10,
            search_term: Some("rust".to_string()),
        };
        let courses = storage.page_courses(&page).await.unwrap();
        assert_eq!(courses.total, 1);
        assert_eq!(courses.items[0].title, "Rust Basics");

        let page = PageRequest {
            page_number: 1,
            page_size: 10,
            search_term: Some("turing".to_string()),
        };
        assert_eq!(storage.page_enrollments(&page).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_rejected_batch_writes_nothing() {
        let (storage, _temp) = create_test_storage();
        seed(&storage).await;

        let result = storage
            .apply(vec![
                Change::InsertCourse(course(3, "Databases", 1)),
                Change::InsertUser(user(3, "Copy", "ALAN@example.com")),
            ])
            .await;

        assert!(matches!(result, Err(StorageError::Conflict(_))));
        assert!(storage.get_course(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_rows() {
        let (storage, temp) = create_test_storage();
        seed(&storage).await;

        // A directory squatting on the temp path makes the course write fail.
        std::fs::create_dir_all(temp.path().join("courses/3.json.tmp")).unwrap();

        let result = storage
            .apply(vec![
                Change::UpdateUser(user(1, "Ada King", "ada@example.com")),
                Change::InsertUser(user(3, "Grace Hopper", "grace@example.com")),
                Change::InsertCourse(course(3, "Databases", 3)),
            ])
            .await;

        assert!(matches!(result, Err(StorageError::FileIO(_))));
        assert_eq!(storage.get_user(1).await.unwrap().unwrap().name, "Ada Lovelace");
        assert!(storage.get_user(3).await.unwrap().is_none());
        assert!(storage.get_course(3).await.unwrap().is_none());
        assert!(!temp.path().join("users/1.json.tmp").exists());
        assert!(!temp.path().join("users/3.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_delete_user_cascades_on_disk() {
        let (storage, temp) = create_test_storage();
        seed(&storage).await;

        storage.apply(vec![Change::DeleteUser(1)]).await.unwrap();

        assert!(storage.get_user(1).await.unwrap().is_none());
        assert!(storage.get_course(1).await.unwrap().is_none());
        assert!(storage.get_enrollment(1).await.unwrap().is_none());
        assert!(!temp.path().join("courses/1.json").exists());
        assert!(storage.get_course(2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_next_id_skips_existing_rows() {
        let (storage, _temp) = create_test_storage();
        seed(&storage).await;

        assert_eq!(storage.next_id(Table::Users).await.unwrap(), 3);
        assert_eq!(storage.next_id(Table::Users).await.unwrap(), 4);
        assert_eq!(storage.next_id(Table::Enrollments).await.unwrap(), 2);
    }
}
