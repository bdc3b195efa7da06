//! Content processing stages
//!
//! This module contains the pure, local stages of the pipeline:
//! - Content fingerprinting (SHA-256 and size)
//! - PDF text extraction
//! - Keyword ranking

mod hasher;
mod keywords;
mod text;

pub use hasher::{hash_bytes, hash_file, ContentFingerprint};
pub use keywords::{rank_keywords, Keyword, DEFAULT_MAX_KEYWORDS};
pub use text::{extract_text, ExtractedText};

use thiserror::Error;

/// Errors raised while reading or decoding a stored document
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Not a valid PDF ({path}): {message}")]
    InvalidPdf { path: String, message: String },

    #[error("Failed to decode page {page} of {path}: {message}")]
    PageDecode {
        path: String,
        page: u32,
        message: String,
    },

    /// The document decoded but yielded no rankable words
    #[error("No readable text in {path}")]
    NoText { path: String },

    #[error("Extraction task failed: {0}")]
    Task(String),
}
