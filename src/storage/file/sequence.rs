//! File-based id sequences.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::storage::traits::Table;

/// Persisted sequence state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceState {
    /// Table the sequence serves.
    pub table: String,
    /// Last identifier handed out.
    pub last_value: i64,
    /// Version, incremented on every allocation.
    pub version: u64,
    /// Last allocation time.
    pub updated_at: DateTime<Utc>,
}

/// Per-table sequences under `data/sequences/{table}.json`.
pub struct FileSequences {
    /// Directory for sequence files.
    sequences_dir: PathBuf,
    /// Mutex for coordinating file operations within this process.
    lock: Mutex<()>,
}

impl FileSequences {
    /// Create sequences rooted at `sequences_dir`.
    pub fn new(sequences_dir: PathBuf) -> Self {
        Self {
            sequences_dir,
            lock: Mutex::new(()),
        }
    }

    fn sequence_path(&self, table: Table) -> PathBuf {
        self.sequences_dir.join(format!("{}.json", table.as_str()))
    }

    /// Allocate the next identifier for `table`.
    ///
    /// The result is always greater than `floor`, so ids never collide with
    /// rows written before the sequence file existed.
    pub async fn next(&self, table: Table, floor: i64) -> StorageResult<i64> {
        let _guard = self.lock.lock().await;
        let state = self.update_state(table, |state| {
            state.last_value = state.last_value.max(floor) + 1;
        })?;
        Ok(state.last_value)
    }

    /// Current state of a sequence, if it was ever used.
    pub async fn current(&self, table: Table) -> StorageResult<Option<SequenceState>> {
        let _guard = self.lock.lock().await;
        let path = self.sequence_path(table);

        if !path.exists() {
            return Ok(None);
        }

        let file = std::fs::File::open(&path)?;
        file.lock_shared()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;
        let state = serde_json::from_reader(&file);
        file.unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        Ok(Some(state?))
    }

    /// Atomically update sequence state, creating it on first use.
    fn update_state<F>(&self, table: Table, update_fn: F) -> StorageResult<SequenceState>
    where
        F: FnOnce(&mut SequenceState),
    {
        std::fs::create_dir_all(&self.sequences_dir)?;

        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.sequence_path(table))?;

        file.lock_exclusive()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let mut state = if contents.trim().is_empty() {
            SequenceState {
                table: table.as_str().to_string(),
                last_value: 0,
                version: 0,
                updated_at: Utc::now(),
            }
        } else {
            serde_json::from_str(&contents)?
        };

        update_fn(&mut state);
        state.version += 1;
        state.updated_at = Utc::now();

        file.seek(SeekFrom::Start(0))?;
        file.set_len(0)?;
        let json = serde_json::to_string_pretty(&state)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        file.unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_sequences() -> (FileSequences, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let sequences = FileSequences::new(temp_dir.path().join("sequences"));
        (sequences, temp_dir)
    }

    #[tokio::test]
    async fn test_sequence_starts_at_one() {
        let (sequences, _temp) = create_test_sequences();

        assert!(sequences.current(Table::Users).await.unwrap().is_none());
        assert_eq!(sequences.next(Table::Users, 0).await.unwrap(), 1);
        assert_eq!(sequences.next(Table::Users, 0).await.unwrap(), 2);

        let state = sequences.current(Table::Users).await.unwrap().unwrap();
        assert_eq!(state.last_value, 2);
        assert_eq!(state.version, 2);
    }

    #[tokio::test]
    async fn test_tables_are_independent() {
        let (sequences, _temp) = create_test_sequences();

        assert_eq!(sequences.next(Table::Users, 0).await.unwrap(), 1);
        assert_eq!(sequences.next(Table::Courses, 0).await.unwrap(), 1);
        assert_eq!(sequences.next(Table::Users, 0).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_floor_skips_existing_ids() {
        let (sequences, _temp) = create_test_sequences();

        assert_eq!(sequences.next(Table::Enrollments, 41).await.unwrap(), 42);
        assert_eq!(sequences.next(Table::Enrollments, 3).await.unwrap(), 43);
    }
}
