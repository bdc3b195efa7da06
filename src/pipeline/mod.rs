//! Pipeline module - batch orchestration
//!
//! This module contains:
//! - The coordinator that drives each document through download,
//!   fingerprinting, extraction, keyword ranking, and storage
//! - Manifest parsing and filename assignment
//! - Request pacing shared by all workers
//! - Batch outcome reporting

mod coordinator;
mod manifest;
mod pacer;

pub use coordinator::{CancelHandle, Coordinator};
pub use manifest::{Manifest, ManifestEntry};
pub use pacer::RequestPacer;

use crate::storage::ErrorKind;
use std::fmt;

/// What happened to one document in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Results extracted and stored
    Completed { page_count: u32, keyword_count: usize },

    /// Results copied from a completed document with identical content
    Deduplicated { original: String },

    /// Already completed by an earlier run
    Skipped,

    /// A stage failed; an error record was written
    Failed { kind: ErrorKind, message: String },
}

/// Outcome of a single document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOutcome {
    pub filename: String,
    pub kind: OutcomeKind,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self.kind,
            OutcomeKind::Completed { .. } | OutcomeKind::Deduplicated { .. }
        )
    }
}

impl fmt::Display for DocumentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OutcomeKind::Completed {
                page_count,
                keyword_count,
            } => write!(
                f,
                "{}: completed ({} pages, {} keywords)",
                self.filename, page_count, keyword_count
            ),
            OutcomeKind::Deduplicated { original } => {
                write!(f, "{}: duplicate of {}", self.filename, original)
            }
            OutcomeKind::Skipped => write!(f, "{}: already completed", self.filename),
            OutcomeKind::Failed { kind, message } => {
                write!(f, "{}: failed at {}: {}", self.filename, kind, message)
            }
        }
    }
}

/// Final tally of a batch
///
/// `successful` includes deduplicated documents; `skipped` and
/// `not_started` count documents that did no work at all.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub successful: usize,
    pub failed: usize,
    pub deduplicated: usize,
    pub skipped: usize,
    /// Documents never dispatched because the batch was cancelled
    pub not_started: usize,
    /// Per-document outcomes, sorted by filename
    pub outcomes: Vec<DocumentOutcome>,
}

impl BatchReport {
    pub(crate) fn record(&mut self, outcome: DocumentOutcome) {
        match &outcome.kind {
            OutcomeKind::Completed { .. } => self.successful += 1,
            OutcomeKind::Deduplicated { .. } => {
                self.successful += 1;
                self.deduplicated += 1;
            }
            OutcomeKind::Skipped => self.skipped += 1,
            OutcomeKind::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn was_cancelled(&self) -> bool {
        self.not_started > 0
    }
}
