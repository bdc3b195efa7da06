//! Append-only error log
//!
//! Recording an error never fails the caller. If the record itself cannot be
//! written, the failure is logged locally and reported as `Dropped`.

use crate::storage::handle::StoreHandle;
use crate::storage::traits::Storage;
use crate::storage::ErrorKind;

/// Result of an attempt to record an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLogOutcome {
    /// Stored with this row ID
    Recorded(i64),
    /// Could not be stored; only the local log has it
    Dropped,
}

impl ErrorLogOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

/// Writes stage failures to the `errors` table
#[derive(Clone)]
pub struct ErrorLog {
    store: StoreHandle,
}

impl ErrorLog {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Appends an error record
    ///
    /// # Arguments
    ///
    /// * `kind` - The stage that failed
    /// * `filename` - The document's local filename
    /// * `message` - Human-readable failure description
    pub fn record(&self, kind: ErrorKind, filename: &str, message: &str) -> ErrorLogOutcome {
        tracing::error!("{} error for {}: {}", kind, filename, message);

        match self
            .store
            .with(|storage| storage.insert_error(kind, filename, message))
        {
            Ok(id) => ErrorLogOutcome::Recorded(id),
            Err(e) => {
                tracing::error!(
                    "Failed to record {} error for {}: {} (original error: {})",
                    kind,
                    filename,
                    e,
                    message
                );
                ErrorLogOutcome::Dropped
            }
        }
    }
}
