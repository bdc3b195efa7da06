//! Shared store handle
//!
//! The pipeline opens exactly one handle per run and passes clones of it to
//! every worker. All access goes through a single connection behind a mutex,
//! so updates to any one document are linearizable.

use crate::state::DocumentStatus;
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Explicitly constructed, cloneable handle to the document store
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<Mutex<SqliteStorage>>,
}

impl StoreHandle {
    /// Opens (or creates) the database at `path`
    ///
    /// Missing parent directories are created first.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::debug!("Opening document store at {}", path.display());
        Ok(Self::from_storage(SqliteStorage::new(path)?))
    }

    /// Opens a private in-memory store
    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::from_storage(SqliteStorage::new_in_memory()?))
    }

    fn from_storage(storage: SqliteStorage) -> Self {
        Self {
            inner: Arc::new(Mutex::new(storage)),
        }
    }

    /// Runs `f` with exclusive access to the store
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let mut storage = self
            .inner
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;
        f(&mut storage)
    }

    /// Document counts by status
    ///
    /// Best-effort: on failure the error is logged and the map is empty.
    pub fn stats(&self) -> HashMap<DocumentStatus, u64> {
        self.with(|storage| storage.count_by_status())
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to count documents by status: {}", e);
                HashMap::new()
            })
    }

    /// Closes the store
    ///
    /// Fails with `StillShared` while other clones of this handle are alive.
    pub fn close(self) -> StorageResult<()> {
        let mutex = Arc::try_unwrap(self.inner).map_err(|_| StorageError::StillShared)?;
        let storage = mutex.into_inner().map_err(|_| StorageError::LockPoisoned)?;
        storage.close()
    }
}
