//! Error types for LoopRec core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while recording and retaining segments.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage error that is not a volume-level outage.
    #[error("storage error: {0}")]
    Storage(looprec_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The volume cannot be reached. Recording into it is pointless.
    #[error("storage unavailable at {}: {reason}", path.display())]
    StorageUnavailable {
        /// Root of the volume.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Every sealed segment was evicted and free space is still short.
    #[error(
        "insufficient space: {free_bytes} bytes free, threshold {threshold_bytes} \
         ({evicted} segments evicted, none left)"
    )]
    InsufficientSpace {
        /// Segments evicted before the retention set ran dry.
        evicted: usize,
        /// Free space after the last eviction.
        free_bytes: u64,
        /// Configured minimum free space.
        threshold_bytes: u64,
    },

    /// A single segment file could not be deleted.
    #[error("eviction of {} failed: {reason}", path.display())]
    EvictionFailed {
        /// The file that could not be deleted.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The capture source aborted mid-segment.
    #[error("capture failed: {message}")]
    CaptureFailed {
        /// Description of the failure.
        message: String,
    },

    /// Captures failed back to back too many times.
    #[error("{attempts} consecutive capture failures, last: {last}")]
    RepeatedCaptureFailure {
        /// Number of consecutive failures.
        attempts: u32,
        /// The most recent failure message.
        last: String,
    },

    /// A freshly issued segment name already exists on disk.
    #[error("segment name collision: {} already exists", path.display())]
    NamingCollision {
        /// The path that should not have existed.
        path: PathBuf,
    },

    /// Another recorder holds the volume lock.
    #[error("volume locked: another recorder is writing to {}", path.display())]
    VolumeLocked {
        /// Root of the locked volume.
        path: PathBuf,
    },

    /// Configuration was rejected.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a capture failed error.
    pub fn capture_failed(message: impl Into<String>) -> Self {
        Self::CaptureFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if the error must end an orchestrator run.
    ///
    /// Per-segment problems (`InsufficientSpace`, `EvictionFailed`,
    /// `CaptureFailed`) are recovered inside the loop.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::InsufficientSpace { .. } | Self::EvictionFailed { .. } | Self::CaptureFailed { .. }
        )
    }
}

impl From<looprec_storage::StorageError> for CoreError {
    fn from(err: looprec_storage::StorageError) -> Self {
        match err {
            looprec_storage::StorageError::Unavailable { path, reason } => {
                Self::StorageUnavailable { path, reason }
            }
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use looprec_storage::StorageError;

    #[test]
    fn unavailable_storage_maps_to_storage_unavailable() {
        let err: CoreError = StorageError::unavailable("/mnt/sd", "gone").into();
        assert!(matches!(err, CoreError::StorageUnavailable { .. }));
        assert!(err.is_fatal());

        let err: CoreError = StorageError::NotFound {
            path: PathBuf::from("/mnt/sd/x"),
        }
        .into();
        assert!(matches!(err, CoreError::Storage(_)));
    }

    #[test]
    fn per_segment_errors_are_not_fatal() {
        assert!(!CoreError::capture_failed("encoder crashed").is_fatal());
        assert!(!CoreError::InsufficientSpace {
            evicted: 0,
            free_bytes: 1,
            threshold_bytes: 2,
        }
        .is_fatal());
        assert!(CoreError::NamingCollision {
            path: PathBuf::from("/x"),
        }
        .is_fatal());
        assert!(CoreError::RepeatedCaptureFailure {
            attempts: 3,
            last: "boom".into(),
        }
        .is_fatal());
    }

    #[test]
    fn error_display() {
        let err = CoreError::InsufficientSpace {
            evicted: 2,
            free_bytes: 100,
            threshold_bytes: 500,
        };
        let text = err.to_string();
        assert!(text.contains("100"));
        assert!(text.contains("500"));
        assert!(text.contains("2 segments"));
    }
}
