//! Statistics generation from the document store
//!
//! This module provides functionality for extracting and displaying
//! processing statistics from the storage layer.

use crate::state::DocumentStatus;
use crate::storage::{ErrorKind, Storage};
use std::collections::HashMap;

/// Processing statistics summary
#[derive(Debug, Clone, Default)]
pub struct ProcessingStatistics {
    /// Total number of documents known to the store
    pub total_documents: u64,

    /// Count of documents by status
    pub documents_by_status: HashMap<DocumentStatus, u64>,

    /// Count of error records by the stage that produced them
    pub errors_by_kind: HashMap<ErrorKind, u64>,
}

impl ProcessingStatistics {
    pub fn count(&self, status: DocumentStatus) -> u64 {
        self.documents_by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn total_errors(&self) -> u64 {
        self.errors_by_kind.values().sum()
    }
}

/// Loads statistics from storage
///
/// Best-effort: a failed query is logged and yields empty statistics
/// instead of an error.
///
/// # Arguments
///
/// * `storage` - The storage backend to query
pub fn load_statistics(storage: &dyn Storage) -> ProcessingStatistics {
    let documents_by_status = match storage.count_by_status() {
        Ok(counts) => counts,
        Err(e) => {
            tracing::warn!("Failed to load document statistics: {}", e);
            return ProcessingStatistics::default();
        }
    };

    let errors_by_kind = storage.count_errors_by_kind().unwrap_or_else(|e| {
        tracing::warn!("Failed to load error statistics: {}", e);
        HashMap::new()
    });

    ProcessingStatistics {
        total_documents: documents_by_status.values().sum(),
        documents_by_status,
        errors_by_kind,
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &ProcessingStatistics) {
    println!("=== Processing Statistics ===\n");

    println!("Documents:");
    println!("  Total: {}", stats.total_documents);
    for status in DocumentStatus::all() {
        let count = stats.count(status);
        let percentage = if stats.total_documents > 0 {
            (count as f64 / stats.total_documents as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if !stats.errors_by_kind.is_empty() {
        println!("Error Log ({} records):", stats.total_errors());
        let mut error_counts: Vec<_> = stats.errors_by_kind.iter().collect();
        error_counts.sort_by(|a, b| {
            b.1.cmp(a.1)
                .then_with(|| a.0.to_db_string().cmp(b.0.to_db_string()))
        });

        for (kind, count) in error_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    let completed = stats.count(DocumentStatus::Completed);
    let success_rate = if stats.total_documents > 0 {
        (completed as f64 / stats.total_documents as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} documents completed)",
        success_rate, completed, stats.total_documents
    );
}
