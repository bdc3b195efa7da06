//! Fetcher module for downloading source documents
//!
//! This module contains:
//! - The transport abstraction and its reqwest implementation
//! - The download loop with bounded retries
//! - The one-shot certificate-verification fallback on the final attempt
//! - Error classification (transport vs. certificate vs. local write)

mod download;
mod transport;

pub use download::{
    fetch_to_path, is_pdf_content_type, partial_path, FetchFailure, FetchPolicy, FetchReport,
};
pub use transport::{build_http_client, classify_error, ReqwestTransport, ResponseBody, Transport};

#[cfg(test)]
pub(crate) use transport::scripted;

use thiserror::Error;

/// Errors that can occur while downloading a document
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure, timeout, or broken response body
    #[error("Transport error: {0}")]
    Transport(String),

    /// TLS certificate validation failure
    #[error("Certificate validation failed: {0}")]
    Certificate(String),

    #[error("HTTP status {status}")]
    HttpStatus { status: u16 },

    /// The response could not be written to local storage
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn is_certificate(&self) -> bool {
        matches!(self, Self::Certificate(_))
    }

    /// Returns true if another attempt could succeed
    ///
    /// Local write failures are not retried; everything on the network side is.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Write { .. })
    }
}
