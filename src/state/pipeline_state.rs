//! Per-document pipeline state machine

use super::{DocumentStatus, ProcessingStage};

/// Where a document is in the download → extract → keyword → store sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Pending,
    Downloading,
    Downloaded,
    Extracting,
    Extracted,
    Keyworded,
    Completed,

    /// Absorbing failure state, reachable from every in-flight state
    Error,
}

impl PipelineState {
    /// Reconstructs the resumable state of a stored document
    ///
    /// Anything that is neither completed nor failed restarts from `Pending`;
    /// stages are never resumed half-way.
    pub fn from_status(status: DocumentStatus) -> Self {
        match status {
            DocumentStatus::Completed => Self::Completed,
            DocumentStatus::Error => Self::Error,
            DocumentStatus::Pending | DocumentStatus::Processing => Self::Pending,
        }
    }

    /// Returns true if moving from `self` to `next` is allowed
    ///
    /// Terminal states (`Completed`, `Error`) can only restart a run, either
    /// with a download or, for files already on disk, with extraction.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;

        match (self, next) {
            (Completed, Error) => false,
            (Error, Error) => false,
            (_, Error) => true,
            (Pending | Completed | Error, Downloading | Extracting) => true,
            (Downloading, Downloaded) => true,
            (Downloaded, Extracting) => true,
            (Extracting, Extracted) => true,
            (Extracted, Keyworded) => true,
            (Keyworded, Completed) => true,
            _ => false,
        }
    }

    /// Status column persisted for this state
    pub fn status(&self) -> DocumentStatus {
        match self {
            Self::Pending => DocumentStatus::Pending,
            Self::Completed => DocumentStatus::Completed,
            Self::Error => DocumentStatus::Error,
            _ => DocumentStatus::Processing,
        }
    }

    /// Stage column persisted for this state
    ///
    /// `None` for `Error`: a failure keeps the last committed stage.
    pub fn stage(&self) -> Option<ProcessingStage> {
        match self {
            Self::Pending | Self::Downloading => Some(ProcessingStage::Initial),
            Self::Downloaded | Self::Extracting => Some(ProcessingStage::Downloaded),
            Self::Extracted => Some(ProcessingStage::Extracted),
            Self::Keyworded => Some(ProcessingStage::Keyworded),
            Self::Completed => Some(ProcessingStage::Stored),
            Self::Error => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}
