//! Output module for console reports
//!
//! This module handles:
//! - Per-document results and the final tally of a batch
//! - Listings of stored documents
//! - Processing statistics from the store

mod report;
pub mod stats;

pub use report::{format_document_line, format_tally, print_batch_report, print_documents};
pub use stats::{load_statistics, print_statistics, ProcessingStatistics};
