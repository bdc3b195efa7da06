//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::extract::{ContentFingerprint, Keyword};
use crate::state::{DocumentStatus, PipelineState, ProcessingStage};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    timestamp_now, DocumentFilter, DocumentRecord, ErrorKind, ErrorRecord, HistoryEntry,
    InitialMetadata, ProcessingResults, RESULTS_VERSION,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const DOCUMENT_COLUMNS: &str = "id, filename, source_url, file_hash, file_size, local_path, \
     upload_timestamp, status, processing_stage, attempt_count, last_attempt_at, summary, \
     page_count, text_length, last_updated";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Closes the underlying connection, reporting any error SQLite raises
    pub fn close(self) -> StorageResult<()> {
        self.conn.close().map_err(|(_, e)| StorageError::Sqlite(e))
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs a document SELECT and attaches each document's keywords
    fn collect_documents<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> StorageResult<Vec<DocumentRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut documents = stmt
            .query_map(params, row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;

        for document in &mut documents {
            document.keywords = load_keywords(&self.conn, document.id)?;
        }

        Ok(documents)
    }
}

/// Maps a row selected with `DOCUMENT_COLUMNS`; keywords are loaded separately
fn row_to_document(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        source_url: row.get(2)?,
        file_hash: row.get(3)?,
        file_size: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
        local_path: row.get(5)?,
        upload_timestamp: row.get(6)?,
        status: DocumentStatus::from_db_string(&row.get::<_, String>(7)?)
            .unwrap_or(DocumentStatus::Pending),
        processing_stage: ProcessingStage::from_db_string(&row.get::<_, String>(8)?)
            .unwrap_or(ProcessingStage::Initial),
        attempt_count: row.get(9)?,
        last_attempt_at: row.get(10)?,
        summary: row.get(11)?,
        keywords: Vec::new(),
        page_count: row.get(12)?,
        text_length: row.get::<_, Option<i64>>(13)?.map(|v| v as u64),
        last_updated: row.get(14)?,
    })
}

fn load_keywords(conn: &Connection, document_id: i64) -> rusqlite::Result<Vec<Keyword>> {
    let mut stmt = conn.prepare(
        "SELECT word, frequency FROM document_keywords WHERE document_id = ?1 ORDER BY rank",
    )?;

    let keywords = stmt
        .query_map(params![document_id], |row| {
            Ok(Keyword {
                word: row.get(0)?,
                frequency: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(keywords)
}

fn row_to_error(row: &Row<'_>) -> rusqlite::Result<ErrorRecord> {
    Ok(ErrorRecord {
        id: row.get(0)?,
        kind: ErrorKind::from_db_string(&row.get::<_, String>(1)?)
            .unwrap_or(ErrorKind::MetadataStorage),
        filename: row.get(2)?,
        message: row.get(3)?,
        timestamp: row.get(4)?,
        recovered: row.get::<_, i64>(5)? != 0,
    })
}

impl Storage for SqliteStorage {
    // ===== Document Lifecycle =====

    fn upsert_initial(&mut self, metadata: &InitialMetadata) -> StorageResult<i64> {
        let now = timestamp_now();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO documents
                (filename, source_url, local_path, upload_timestamp, status, processing_stage,
                 attempt_count, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?4)
             ON CONFLICT(filename) DO NOTHING",
            params![
                metadata.filename,
                metadata.source_url,
                metadata.local_path,
                now,
                DocumentStatus::Pending.to_db_string(),
                ProcessingStage::Initial.to_db_string(),
            ],
        )?;

        tx.execute(
            "INSERT INTO processing_status (filename, status, timestamp) VALUES (?1, ?2, ?3)
             ON CONFLICT(filename) DO UPDATE SET timestamp = excluded.timestamp",
            params![
                metadata.filename,
                DocumentStatus::Pending.to_db_string(),
                now
            ],
        )?;

        let id: i64 = tx.query_row(
            "SELECT id FROM documents WHERE filename = ?1",
            params![metadata.filename],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(id)
    }

    fn record_fingerprint(
        &mut self,
        document_id: i64,
        fingerprint: &ContentFingerprint,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents SET file_hash = ?1, file_size = ?2, last_updated = ?3 WHERE id = ?4",
            params![
                fingerprint.hash,
                fingerprint.size_bytes as i64,
                timestamp_now(),
                document_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::DocumentNotFound(document_id.to_string()));
        }
        Ok(())
    }

    fn begin_attempt(&mut self, document_id: i64) -> StorageResult<()> {
        let now = timestamp_now();
        let changed = self.conn.execute(
            "UPDATE documents
             SET attempt_count = attempt_count + 1, last_attempt_at = ?1, last_updated = ?1
             WHERE id = ?2",
            params![now, document_id],
        )?;

        if changed == 0 {
            return Err(StorageError::DocumentNotFound(document_id.to_string()));
        }
        Ok(())
    }

    fn set_state(&mut self, document_id: i64, state: PipelineState) -> StorageResult<()> {
        if state == PipelineState::Completed {
            return Err(StorageError::InvalidState(
                "completed is only reachable by recording results".to_string(),
            ));
        }

        let now = timestamp_now();
        let status = state.status().to_db_string();
        let tx = self.conn.transaction()?;

        // Error has no stage of its own; the last committed stage stays
        let changed = tx.execute(
            "UPDATE documents
             SET status = ?1, processing_stage = COALESCE(?2, processing_stage), last_updated = ?3
             WHERE id = ?4",
            params![
                status,
                state.stage().map(|s| s.to_db_string()),
                now,
                document_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::DocumentNotFound(document_id.to_string()));
        }

        tx.execute(
            "UPDATE processing_status SET status = ?1, timestamp = ?2
             WHERE filename = (SELECT filename FROM documents WHERE id = ?3)",
            params![status, now, document_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn record_results(
        &mut self,
        document_id: i64,
        results: &ProcessingResults,
    ) -> StorageResult<()> {
        let now = timestamp_now();
        let completed = DocumentStatus::Completed.to_db_string();
        let tx = self.conn.transaction()?;

        let changed = tx.execute(
            "UPDATE documents
             SET summary = ?1, page_count = ?2, text_length = ?3, status = ?4,
                 processing_stage = ?5, last_updated = ?6
             WHERE id = ?7",
            params![
                results.summary,
                results.page_count,
                results.text_length as i64,
                completed,
                ProcessingStage::Stored.to_db_string(),
                now,
                document_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::DocumentNotFound(document_id.to_string()));
        }

        tx.execute(
            "DELETE FROM document_keywords WHERE document_id = ?1",
            params![document_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO document_keywords (document_id, rank, word, frequency)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (rank, keyword) in results.keywords.iter().enumerate() {
                stmt.execute(params![
                    document_id,
                    rank as i64,
                    keyword.word,
                    keyword.frequency
                ])?;
            }
        }

        tx.execute(
            "INSERT INTO processing_history
                (document_id, timestamp, version, summary_length, keyword_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                document_id,
                now,
                RESULTS_VERSION,
                results.summary.chars().count() as i64,
                results.keywords.len() as i64
            ],
        )?;

        tx.execute(
            "UPDATE processing_status SET status = ?1, timestamp = ?2
             WHERE filename = (SELECT filename FROM documents WHERE id = ?3)",
            params![completed, now, document_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    // ===== Document Queries =====

    fn get_document(&self, document_id: i64) -> StorageResult<DocumentRecord> {
        let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
        self.collect_documents(&sql, params![document_id])?
            .pop()
            .ok_or_else(|| StorageError::DocumentNotFound(document_id.to_string()))
    }

    fn get_document_by_filename(&self, filename: &str) -> StorageResult<Option<DocumentRecord>> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM documents WHERE filename = ?1",
                params![filename],
                |row| row.get(0),
            )
            .optional()?;

        match id {
            Some(id) => Ok(Some(self.get_document(id)?)),
            None => Ok(None),
        }
    }

    fn find_by_hash(&self, hash: &str) -> StorageResult<Vec<DocumentRecord>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE file_hash = ?1 ORDER BY id",
            DOCUMENT_COLUMNS
        );
        self.collect_documents(&sql, params![hash])
    }

    fn query_documents(&self, filter: &DocumentFilter) -> StorageResult<Vec<DocumentRecord>> {
        let mut sql = format!("SELECT {} FROM documents WHERE 1 = 1", DOCUMENT_COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            values.push(Value::Text(status.to_db_string().to_string()));
        }

        if let Some(keyword) = &filter.keyword {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM document_keywords k
                              WHERE k.document_id = documents.id AND k.word = ?)",
            );
            values.push(Value::Text(keyword.to_lowercase()));
        }

        if let Some(after) = &filter.updated_after {
            sql.push_str(" AND last_updated > ?");
            values.push(Value::Text(after.clone()));
        }

        sql.push_str(" ORDER BY filename");

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(limit as i64));
        }

        self.collect_documents(&sql, params_from_iter(values.iter()))
    }

    fn history(&self, document_id: i64) -> StorageResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, document_id, timestamp, version, summary_length, keyword_count
             FROM processing_history WHERE document_id = ?1 ORDER BY id",
        )?;

        let entries = stmt
            .query_map(params![document_id], |row| {
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    document_id: row.get(1)?,
                    timestamp: row.get(2)?,
                    version: row.get(3)?,
                    summary_length: row.get::<_, i64>(4)? as u64,
                    keyword_count: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    // ===== Error Log =====

    fn insert_error(
        &mut self,
        kind: ErrorKind,
        filename: &str,
        message: &str,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO errors (error_kind, filename, message, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![kind.to_db_string(), filename, message, timestamp_now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn errors_for(&self, filename: &str) -> StorageResult<Vec<ErrorRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, error_kind, filename, message, timestamp, recovered
             FROM errors WHERE filename = ?1 ORDER BY id",
        )?;

        let errors = stmt
            .query_map(params![filename], row_to_error)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(errors)
    }

    // ===== Statistics =====

    fn count_by_status(&self) -> StorageResult<HashMap<DocumentStatus, u64>> {
        let mut counts: HashMap<DocumentStatus, u64> =
            DocumentStatus::all().into_iter().map(|s| (s, 0)).collect();

        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM documents GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            if let Some(status) = DocumentStatus::from_db_string(&status) {
                counts.insert(status, count as u64);
            }
        }

        Ok(counts)
    }

    fn count_errors_by_kind(&self) -> StorageResult<HashMap<ErrorKind, u64>> {
        let mut counts = HashMap::new();

        let mut stmt = self
            .conn
            .prepare("SELECT error_kind, COUNT(*) FROM errors GROUP BY error_kind")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (kind, count) = row?;
            if let Some(kind) = ErrorKind::from_db_string(&kind) {
                counts.insert(kind, count as u64);
            }
        }

        Ok(counts)
    }
}
