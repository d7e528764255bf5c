//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A write did not fit in the remaining capacity of a bounded buffer.
    ///
    /// Nothing was written when this is returned.
    #[error("buffer overflow: {requested} bytes requested, {remaining} bytes remaining")]
    BufferOverflow {
        /// The number of bytes the caller tried to write.
        requested: usize,
        /// The number of bytes still available.
        remaining: usize,
    },

    /// The requested buffer capacity cannot be mapped.
    #[error("invalid buffer capacity: {0}")]
    InvalidCapacity(usize),
}

impl StorageError {
    /// Returns true if this error is a [`StorageError::BufferOverflow`].
    #[must_use]
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::BufferOverflow { .. })
    }
}
