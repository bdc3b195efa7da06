//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the document store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per document, keyed by its local filename
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL UNIQUE,
    source_url TEXT,
    file_hash TEXT,
    file_size INTEGER,
    local_path TEXT NOT NULL,
    upload_timestamp TEXT NOT NULL,
    status TEXT NOT NULL,
    processing_stage TEXT NOT NULL,
    attempt_count INTEGER NOT NULL DEFAULT 0,
    last_attempt_at TEXT,
    summary TEXT,
    page_count INTEGER,
    text_length INTEGER,
    last_updated TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(file_hash);
CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);
CREATE INDEX IF NOT EXISTS idx_documents_last_updated ON documents(last_updated);

-- Ranked keywords; rank 0 is the most frequent word
CREATE TABLE IF NOT EXISTS document_keywords (
    document_id INTEGER NOT NULL REFERENCES documents(id),
    rank INTEGER NOT NULL,
    word TEXT NOT NULL,
    frequency INTEGER NOT NULL,
    PRIMARY KEY(document_id, rank)
);

CREATE INDEX IF NOT EXISTS idx_document_keywords_word ON document_keywords(word);

-- Append-only record of every results write
CREATE TABLE IF NOT EXISTS processing_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL REFERENCES documents(id),
    timestamp TEXT NOT NULL,
    version TEXT NOT NULL,
    summary_length INTEGER NOT NULL,
    keyword_count INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_processing_history_document ON processing_history(document_id);

-- Status tracking, touched on every initial upsert
CREATE TABLE IF NOT EXISTS processing_status (
    filename TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_processing_status_status ON processing_status(status);
CREATE INDEX IF NOT EXISTS idx_processing_status_timestamp ON processing_status(timestamp);

-- Append-only failure log
CREATE TABLE IF NOT EXISTS errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    error_kind TEXT NOT NULL,
    filename TEXT NOT NULL,
    message TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    recovered INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_errors_filename ON errors(filename);
CREATE INDEX IF NOT EXISTS idx_errors_timestamp ON errors(timestamp);
CREATE INDEX IF NOT EXISTS idx_errors_kind ON errors(error_kind);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
