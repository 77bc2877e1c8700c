//! Error types for ferry-core
//!
//! Every fallible transfer operation reports one of these variants. The CLI
//! maps them onto process exit codes.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for ferry-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by key mapping, listing, and transfers
#[derive(Debug, Error)]
pub enum Error {
    /// Source file for an upload is missing or unreadable
    #[error("Local file not found: {}: {reason}", path.display())]
    LocalFileNotFound { path: PathBuf, reason: String },

    /// Download destination could not be created or written
    #[error("Cannot write {}: {reason}", path.display())]
    LocalWriteFailed { path: PathBuf, reason: String },

    /// Object key does not exist in the bucket
    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    /// Auth failure, network failure, missing bucket or malformed response
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Caller supplied something unusable (bad destination, bad flag value)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Settings file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a `LocalFileNotFound` from an I/O failure on `path`
    pub fn local_file(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Error::LocalFileNotFound {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Build a `LocalWriteFailed` from an I/O failure on `path`
    pub fn local_write(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Error::LocalWriteFailed {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Whether this error names something that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::LocalFileNotFound { .. } | Error::ObjectNotFound { .. }
        )
    }
}
