/// Persisted document status and processing stage
///
/// These are the two columns the store keeps for every document. The finer
/// grained in-flight states live in [`super::PipelineState`].
use std::fmt;

/// Coarse lifecycle status of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentStatus {
    /// Record exists but no stage has started yet
    Pending,

    /// A stage is running or the document stopped between stages
    Processing,

    /// Results are stored (summary, keywords, page count populated)
    Completed,

    /// A stage failed; at least one error record exists
    Error,
}

impl DocumentStatus {
    /// Returns true if the document needs no further work
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if a retry sweep should pick this document up
    pub fn needs_retry(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing | Self::Error)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::Processing, Self::Completed, Self::Error]
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Last stage whose output was committed to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProcessingStage {
    Initial,
    Downloaded,
    Extracted,
    Keyworded,
    Stored,
}

impl ProcessingStage {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Downloaded => "downloaded",
            Self::Extracted => "extracted",
            Self::Keyworded => "keyworded",
            Self::Stored => "stored",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "initial" => Some(Self::Initial),
            "downloaded" => Some(Self::Downloaded),
            "extracted" => Some(Self::Extracted),
            "keyworded" => Some(Self::Keyworded),
            "stored" => Some(Self::Stored),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
