//! One JSON document per row.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{Course, Enrollment, User};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::Table;

/// A row type stored in its own directory.
pub trait Row: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table the row belongs to.
    const TABLE: Table;

    /// Row identifier.
    fn id(&self) -> i64;
}

impl Row for User {
    const TABLE: Table = Table::Users;

    fn id(&self) -> i64 {
        self.id
    }
}

impl Row for Course {
    const TABLE: Table = Table::Courses;

    fn id(&self) -> i64 {
        self.id
    }
}

impl Row for Enrollment {
    const TABLE: Table = Table::Enrollments;

    fn id(&self) -> i64 {
        self.id
    }
}

/// Directory of `{id}.json` files for one table.
pub struct FileTable<T> {
    dir: PathBuf,
    _row: PhantomData<fn() -> T>,
}

impl<T: Row> FileTable<T> {
    /// Table rooted under `base_dir/<table>`.
    pub fn new(base_dir: &Path) -> Self {
        Self {
            dir: base_dir.join(T::TABLE.as_str()),
            _row: PhantomData,
        }
    }

    /// Directory holding the rows.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn row_path(&self, id: i64) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Load a row.
    pub fn load(&self, id: i64) -> StorageResult<Option<T>> {
        let path = self.row_path(id);

        if !path.exists() {
            return Ok(None);
        }

        read_locked(&path).map(Some)
    }

    /// Load every row, ordered by id.
    ///
    /// Unreadable documents are logged and skipped.
    pub fn load_all(&self) -> StorageResult<Vec<T>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();

            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match read_locked::<T>(&path) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Failed to parse row file");
                }
            }
        }

        rows.sort_by_key(|row| row.id());
        Ok(rows)
    }

    /// Highest id present on disk, from file names alone.
    pub fn max_id(&self) -> StorageResult<i64> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut max = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<i64>().ok())
            {
                max = max.max(id);
            }
        }
        Ok(max)
    }

    /// Write a row, replacing any previous version.
    pub fn save(&self, row: &T) -> StorageResult<()> {
        self.stage(row)?.publish()
    }

    /// Write a row to its temp file. Reads see nothing until the row is published.
    pub fn stage(&self, row: &T) -> StorageResult<StagedRow> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.row_path(row.id());
        let tmp = path.with_extension("json.tmp");

        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;

        file.lock_exclusive()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        let staged = StagedRow { tmp, path };
        let written = serde_json::to_writer_pretty(&file, row)
            .map_err(StorageError::from)
            .and_then(|()| file.sync_all().map_err(StorageError::from));
        file.unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        match written {
            Ok(()) => Ok(staged),
            Err(e) => {
                staged.discard();
                Err(e)
            }
        }
    }

    /// Delete a row. Returns whether it existed.
    pub fn remove(&self, id: i64) -> StorageResult<bool> {
        let path = self.row_path(id);

        if !path.exists() {
            return Ok(false);
        }

        std::fs::remove_file(&path)?;
        Ok(true)
    }
}

/// A row written beside its final path.
#[derive(Debug)]
pub struct StagedRow {
    tmp: PathBuf,
    path: PathBuf,
}

impl StagedRow {
    /// Move the row into place.
    pub fn publish(self) -> StorageResult<()> {
        std::fs::rename(&self.tmp, &self.path)?;
        Ok(())
    }

    /// Drop the temp file; the previous version of the row stays.
    pub fn discard(self) {
        if let Err(e) = std::fs::remove_file(&self.tmp) {
            tracing::warn!(path = ?self.tmp, error = %e, "Failed to remove staged row");
        }
    }
}

fn read_locked<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let file = std::fs::File::open(path)?;
    file.lock_shared()
        .map_err(|e| StorageError::LockFailed(e.to_string()))?;

    let row = serde_json::from_reader(&file);
    file.unlock()
        .map_err(|e| StorageError::LockFailed(e.to_string()))?;

    Ok(row?)
}
