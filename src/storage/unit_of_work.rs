//! Per-request unit of work.

use std::ops::Deref;
use std::sync::Arc;

use crate::error::StorageResult;
use crate::storage::traits::{Change, DynStorage, Storage, Table};

/// Reads through the storage and stages writes until [`UnitOfWork::save`].
///
/// Nothing staged is visible to reads, nor persisted, before `save`.
/// Dropping a unit of work discards its staged changes.
pub struct UnitOfWork {
    storage: Arc<DynStorage>,
    staged: Vec<Change>,
}

impl UnitOfWork {
    /// Start a unit of work.
    #[must_use]
    pub fn new(storage: Arc<DynStorage>) -> Self {
        Self {
            storage,
            staged: Vec::new(),
        }
    }

    /// Reserve an identifier for a row about to be staged.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn next_id(&self, table: Table) -> StorageResult<i64> {
        self.storage.next_id(table).await
    }

    /// Stage a change.
    pub fn stage(&mut self, change: Change) {
        self.staged.push(change);
    }

    /// Number of staged changes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    /// Commit all staged changes in one batch.
    ///
    /// Returns the number of changes written.
    ///
    /// # Errors
    ///
    /// Returns the storage error; nothing is persisted in that case and the
    /// staged changes are discarded.
    pub async fn save(&mut self) -> StorageResult<usize> {
        if self.staged.is_empty() {
            return Ok(0);
        }

        let changes = std::mem::take(&mut self.staged);
        let count = changes.len();
        self.storage.apply(changes).await?;

        tracing::debug!(changes = count, "Unit of work committed");
        Ok(count)
    }
}

impl Deref for UnitOfWork {
    type Target = DynStorage;

    fn deref(&self) -> &Self::Target {
        self.storage.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileStorageConfig;
    use crate::domain::{Role, User};
    use crate::storage::file::FileStorage;
    use crate::storage::traits::UserStorage;
    use chrono::Utc;
    use tempfile::TempDir;

    fn storage() -> (Arc<DynStorage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(&FileStorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        })
        .unwrap();
        (Arc::new(storage), temp_dir)
    }

    fn user(id: i64, email: &str) -> User {
        let now = Utc::now();
        User {
            id,
            name: "Grace".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Student,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_staged_changes_invisible_until_save() {
        let (storage, _temp) = storage();
        let mut uow = UnitOfWork::new(storage.clone());

        let id = uow.next_id(Table::Users).await.unwrap();
        uow.stage(Change::InsertUser(user(id, "grace@example.com")));
        assert_eq!(uow.pending(), 1);
        assert!(uow.get_user(id).await.unwrap().is_none());

        assert_eq!(uow.save().await.unwrap(), 1);
        assert_eq!(uow.pending(), 0);
        assert!(storage.get_user(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_persists_nothing() {
        let (storage, _temp) = storage();
        {
            let mut uow = UnitOfWork::new(storage.clone());
            let id = uow.next_id(Table::Users).await.unwrap();
            uow.stage(Change::InsertUser(user(id, "lost@example.com")));
        }
        assert_eq!(storage.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_persists_nothing() {
        let (storage, _temp) = storage();
        let mut uow = UnitOfWork::new(storage.clone());

        uow.stage(Change::InsertUser(user(1, "same@example.com")));
        uow.stage(Change::InsertUser(user(2, "SAME@example.com")));
        assert!(uow.save().await.is_err());
        assert_eq!(storage.count_users().await.unwrap(), 0);
    }
}
