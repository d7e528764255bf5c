//! Error types for journaldoc core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in journaldoc core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] journaldoc_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path string could not be compiled.
    #[error("invalid path {path:?}: {message}")]
    InvalidPath {
        /// The raw path string.
        path: String,
        /// What is wrong with it.
        message: String,
    },

    /// A value or container has the wrong type for the requested mutation.
    #[error("type mismatch: {message}")]
    TypeMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// A list index points past the end of the list.
    #[error("list index {index} out of range for list of length {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The length of the list.
        len: usize,
    },

    /// A journal could not be decoded.
    #[error("journal corruption at entry {entry} (byte {offset}): {message}")]
    JournalCorruption {
        /// Zero-based entry index (0 is the info entry).
        entry: usize,
        /// Byte offset of the start of the entry.
        offset: usize,
        /// Description of the corruption.
        message: String,
    },

    /// A snapshot file could not be decoded.
    #[error("snapshot corruption: {message}")]
    SnapshotCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// The document has been closed.
    #[error("document is closed")]
    DocumentClosed,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(entry: usize, offset: usize, message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            entry,
            offset,
            message: message.into(),
        }
    }

    /// Creates a snapshot corruption error.
    pub fn snapshot_corruption(message: impl Into<String>) -> Self {
        Self::SnapshotCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the error comes from a rejected mutation rather than
    /// from storage or decoding.
    #[must_use]
    pub fn is_rejected_mutation(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch { .. } | Self::IndexOutOfRange { .. } | Self::InvalidPath { .. }
        )
    }
}
