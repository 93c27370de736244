//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The volume cannot be reached (missing directory, unmounted media).
    #[error("volume unavailable at {}: {reason}", path.display())]
    Unavailable {
        /// Root of the unreachable volume.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The file does not exist on the volume.
    #[error("file not found: {}", path.display())]
    NotFound {
        /// The missing file.
        path: PathBuf,
    },

    /// The file exists but could not be removed.
    #[error("cannot remove {}: {reason}", path.display())]
    RemoveDenied {
        /// The file that stayed behind.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
}

impl StorageError {
    /// Creates a volume unavailable error.
    pub fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Unavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the whole volume is unreachable, as opposed to a
    /// single file misbehaving.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
