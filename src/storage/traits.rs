//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::extract::ContentFingerprint;
use crate::state::{DocumentStatus, PipelineState};
use crate::storage::{
    DocumentFilter, DocumentRecord, ErrorKind, ErrorRecord, HistoryEntry, InitialMetadata,
    ProcessingResults,
};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid state update: {0}")]
    InvalidState(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Store handle is still shared and cannot be closed")]
    StillShared,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// All multi-statement writes are atomic: readers never observe a document
/// with half of its results applied.
pub trait Storage {
    // ===== Document Lifecycle =====

    /// Creates the document if no record with this filename exists
    ///
    /// On conflict the document row is left untouched and only the
    /// processing-status timestamp is refreshed.
    ///
    /// # Returns
    ///
    /// The ID of the (new or pre-existing) document
    fn upsert_initial(&mut self, metadata: &InitialMetadata) -> StorageResult<i64>;

    /// Stores the content fingerprint of the document's local file
    fn record_fingerprint(
        &mut self,
        document_id: i64,
        fingerprint: &ContentFingerprint,
    ) -> StorageResult<()>;

    /// Increments the attempt counter and stamps the attempt time
    fn begin_attempt(&mut self, document_id: i64) -> StorageResult<()>;

    /// Persists the status and stage of an in-flight pipeline state
    ///
    /// `Completed` is rejected: it is only reachable through `record_results`.
    fn set_state(&mut self, document_id: i64, state: PipelineState) -> StorageResult<()>;

    /// Merges results into the document, marks it completed, and appends a
    /// history entry, all in one transaction
    fn record_results(
        &mut self,
        document_id: i64,
        results: &ProcessingResults,
    ) -> StorageResult<()>;

    // ===== Document Queries =====

    /// Gets a document by ID
    fn get_document(&self, document_id: i64) -> StorageResult<DocumentRecord>;

    /// Gets a document by its unique filename
    fn get_document_by_filename(&self, filename: &str) -> StorageResult<Option<DocumentRecord>>;

    /// Gets all documents whose content fingerprint equals `hash`
    fn find_by_hash(&self, hash: &str) -> StorageResult<Vec<DocumentRecord>>;

    /// Gets documents matching every predicate set in the filter
    fn query_documents(&self, filter: &DocumentFilter) -> StorageResult<Vec<DocumentRecord>>;

    /// Gets the processing history of a document, oldest first
    fn history(&self, document_id: i64) -> StorageResult<Vec<HistoryEntry>>;

    // ===== Error Log =====

    /// Appends an error record
    fn insert_error(&mut self, kind: ErrorKind, filename: &str, message: &str)
        -> StorageResult<i64>;

    /// Gets all error records for a filename, oldest first
    fn errors_for(&self, filename: &str) -> StorageResult<Vec<ErrorRecord>>;

    // ===== Statistics =====

    /// Counts documents by status
    fn count_by_status(&self) -> StorageResult<HashMap<DocumentStatus, u64>>;

    /// Counts error records by kind
    fn count_errors_by_kind(&self) -> StorageResult<HashMap<ErrorKind, u64>>;
}
