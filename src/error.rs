//! Error types for Motif

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Motif operations
pub type Result<T> = std::result::Result<T, MotifError>;

/// Main error type for Motif
///
/// Lost updates between concurrent writers are not detected; the last atomic
/// rename wins.
#[derive(Error, Debug)]
pub enum MotifError {
    #[error("Pattern not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store corrupt at {}: {reason}", path.display())]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to persist store: {0}")]
    Persist(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MotifError {
    /// Build a corruption error for the store at `path`
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        MotifError::StoreCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller can retry or continue without manual recovery.
    ///
    /// A corrupt store is never recoverable in-process; the caller has to
    /// decide to reset it.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, MotifError::StoreCorrupt { .. } | MotifError::Config(_))
    }

    /// Stable numeric code for front-ends that map failures without string matching
    pub fn code(&self) -> i64 {
        match self {
            MotifError::NotFound(_) => -32001,
            MotifError::InvalidInput(_) => -32602,
            MotifError::StoreCorrupt { .. } => -32010,
            MotifError::Config(_) => -32011,
            _ => -32000,
        }
    }
}

impl From<tempfile::PersistError> for MotifError {
    fn from(err: tempfile::PersistError) -> Self {
        MotifError::Persist(err.error.to_string())
    }
}
