//! Storage module for persisting document metadata
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Idempotent creation and atomic result merges for documents
//! - Processing history and the append-only error log
//! - Filtered document queries and status counts

mod error_log;
mod handle;
mod schema;
mod sqlite;
mod traits;

pub use error_log::{ErrorLog, ErrorLogOutcome};
pub use handle::StoreHandle;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::extract::Keyword;
use crate::state::{DocumentStatus, ProcessingStage};
use chrono::{SecondsFormat, Utc};
use std::fmt;

/// Version tag written into every processing history entry
pub const RESULTS_VERSION: &str = "1.0";

/// Current time in the fixed-width RFC 3339 form used for every stored
/// timestamp, so string comparison orders them chronologically
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Represents a document in the database
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: i64,
    pub filename: String,
    pub source_url: Option<String>,
    pub file_hash: Option<String>,
    pub file_size: Option<u64>,
    pub local_path: String,
    pub upload_timestamp: String,
    pub status: DocumentStatus,
    pub processing_stage: ProcessingStage,
    pub attempt_count: u32,
    pub last_attempt_at: Option<String>,
    pub summary: Option<String>,
    pub keywords: Vec<Keyword>,
    pub page_count: Option<u32>,
    pub text_length: Option<u64>,
    pub last_updated: String,
}

/// Fields known when a document is first seen
#[derive(Debug, Clone)]
pub struct InitialMetadata {
    pub filename: String,
    pub source_url: Option<String>,
    pub local_path: String,
}

/// Output of a successful extraction, merged into the document atomically
#[derive(Debug, Clone)]
pub struct ProcessingResults {
    pub summary: String,
    pub keywords: Vec<Keyword>,
    pub page_count: u32,
    pub text_length: u64,
}

impl ProcessingResults {
    /// Rebuilds the results stored on a completed document
    ///
    /// Returns `None` if any result field is missing.
    pub fn from_record(record: &DocumentRecord) -> Option<Self> {
        Some(Self {
            summary: record.summary.clone()?,
            keywords: record.keywords.clone(),
            page_count: record.page_count?,
            text_length: record.text_length?,
        })
    }
}

/// One append-only entry per results write
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: i64,
    pub document_id: i64,
    pub timestamp: String,
    pub version: String,
    pub summary_length: u64,
    pub keyword_count: u32,
}

/// Pipeline stage that produced an error record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MetadataStorage,
    Download,
    Extraction,
    ResultsStorage,
}

impl ErrorKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            ErrorKind::MetadataStorage => "metadata_storage",
            ErrorKind::Download => "download",
            ErrorKind::Extraction => "extraction",
            ErrorKind::ResultsStorage => "results_storage",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "metadata_storage" => Some(ErrorKind::MetadataStorage),
            "download" => Some(ErrorKind::Download),
            "extraction" => Some(ErrorKind::Extraction),
            "results_storage" => Some(ErrorKind::ResultsStorage),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Represents an entry in the error log
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub id: i64,
    pub kind: ErrorKind,
    pub filename: String,
    pub message: String,
    pub timestamp: String,
    pub recovered: bool,
}

/// Predicates for `Storage::query_documents`; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    /// Matches documents whose keyword list contains this word
    pub keyword: Option<String>,
    /// Matches documents updated strictly after this RFC 3339 timestamp
    pub updated_after: Option<String>,
    pub limit: Option<usize>,
}

impl DocumentFilter {
    pub fn with_status(status: DocumentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: Some(keyword.into()),
            ..Self::default()
        }
    }
}
