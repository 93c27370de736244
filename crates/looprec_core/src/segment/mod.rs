//! Recorded segments.
//!
//! A segment is one time-bounded recording written to a single file.
//!
//! ## Lifecycle
//!
//! ```text
//! Recording ──seal──▶ Sealed ──evict──▶ Evicted
//!     │
//!     └── capture failed: dropped, never sealed
//! ```
//!
//! While recording, the file has a hidden in-progress name (see
//! [`SegmentNamer::partial_file_name`]). Sealing moves it to its managed
//! name. Only the orchestrator seals. Only the retention manager evicts.

mod naming;

pub use naming::{SegmentId, SegmentNamer};

use crate::error::{CoreError, CoreResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Lifecycle state of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentState {
    /// The capture source is writing the file.
    Recording,
    /// Capture completed and the file is closed. Eligible for eviction.
    Sealed,
    /// The file was deleted. Terminal.
    Evicted,
}

/// A single recorded unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    id: SegmentId,
    path: PathBuf,
    state: SegmentState,
    created_at: SystemTime,
    size_bytes: Option<u64>,
}

impl Segment {
    /// Creates a segment that is about to be captured.
    #[must_use]
    pub fn recording(id: SegmentId, path: PathBuf, created_at: SystemTime) -> Self {
        Self {
            id,
            path,
            state: SegmentState::Recording,
            created_at,
            size_bytes: None,
        }
    }

    /// Creates an already sealed segment, e.g. one recovered from disk.
    #[must_use]
    pub fn sealed(id: SegmentId, path: PathBuf, created_at: SystemTime, size_bytes: u64) -> Self {
        Self {
            id,
            path,
            state: SegmentState::Sealed,
            created_at,
            size_bytes: Some(size_bytes),
        }
    }

    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> &SegmentId {
        &self.id
    }

    /// Returns the file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> SegmentState {
        self.state
    }

    /// Returns when capture started.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Returns the file size. `None` while recording.
    #[must_use]
    pub fn size_bytes(&self) -> Option<u64> {
        self.size_bytes
    }

    /// Finalizes a recording segment whose file now lives at `path`.
    pub(crate) fn seal(&mut self, path: PathBuf, size_bytes: u64) -> CoreResult<()> {
        if self.state != SegmentState::Recording {
            return Err(CoreError::capture_failed(format!(
                "cannot seal segment {} in state {:?}",
                self.id, self.state
            )));
        }
        self.state = SegmentState::Sealed;
        self.path = path;
        self.size_bytes = Some(size_bytes);
        Ok(())
    }

    /// Marks the segment's file as deleted.
    pub(crate) fn mark_evicted(&mut self) {
        self.state = SegmentState::Evicted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_only_from_recording() {
        let mut segment = Segment::recording(
            SegmentId::new("a"),
            PathBuf::from("/v/.a.h264"),
            SystemTime::UNIX_EPOCH,
        );
        assert_eq!(segment.state(), SegmentState::Recording);
        assert_eq!(segment.size_bytes(), None);

        segment.seal(PathBuf::from("/v/a.h264"), 1024).unwrap();
        assert_eq!(segment.state(), SegmentState::Sealed);
        assert_eq!(segment.path(), Path::new("/v/a.h264"));
        assert_eq!(segment.size_bytes(), Some(1024));

        assert!(segment.seal(PathBuf::from("/v/b.h264"), 2048).is_err());
        assert_eq!(segment.path(), Path::new("/v/a.h264"));
        assert_eq!(segment.size_bytes(), Some(1024));

        segment.mark_evicted();
        assert_eq!(segment.state(), SegmentState::Evicted);
    }
}
