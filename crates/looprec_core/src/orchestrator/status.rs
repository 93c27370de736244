//! Operator-facing recorder status.

use crate::error::CoreError;
use crate::segment::SegmentId;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// State of the recording loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrchestratorState {
    /// Not started yet.
    Idle,
    /// Making room on the volume before the next segment.
    CheckingStorage,
    /// A segment is being captured.
    Recording,
    /// The captured segment is being committed to the retention set.
    Sealing,
    /// The loop has ended.
    Stopped,
}

impl OrchestratorState {
    /// Returns the state name shown to operators.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingStorage => "checking-storage",
            Self::Recording => "recording",
            Self::Sealing => "sealing",
            Self::Stopped => "stopped",
        }
    }

    /// Returns true while a segment file is open for writing.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Recording | Self::Sealing)
    }
}

/// Point-in-time snapshot of the recorder.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    /// Current loop state.
    pub state: OrchestratorState,
    /// Segment being recorded, if any.
    pub active_segment: Option<String>,
    /// Segments evicted by the most recent retention pass.
    pub last_evicted: usize,
    /// Most recent error, cleared by the next clean iteration.
    pub last_error: Option<String>,
    /// Whether the last retention pass could not meet the threshold.
    pub degraded: bool,
    /// Segments sealed since start.
    pub segments_sealed: u64,
    /// Captures that failed since start.
    pub capture_failures: u64,
    /// Segments evicted since start.
    pub total_evicted: u64,
}

impl Default for OrchestratorStatus {
    fn default() -> Self {
        Self {
            state: OrchestratorState::Idle,
            active_segment: None,
            last_evicted: 0,
            last_error: None,
            degraded: false,
            segments_sealed: 0,
            capture_failures: 0,
            total_evicted: 0,
        }
    }
}

/// Shared, cloneable view of an orchestrator's status.
///
/// The orchestrator and the background retention worker write to it; any
/// number of readers can take snapshots.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<OrchestratorStatus>>,
}

impl StatusHandle {
    /// Creates a handle in the `Idle` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current status.
    #[must_use]
    pub fn snapshot(&self) -> OrchestratorStatus {
        self.inner.read().clone()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> OrchestratorState {
        self.inner.read().state
    }

    pub(crate) fn set_state(&self, state: OrchestratorState) {
        self.inner.write().state = state;
    }

    pub(crate) fn begin_segment(&self, id: &SegmentId) {
        let mut status = self.inner.write();
        status.state = OrchestratorState::Recording;
        status.active_segment = Some(id.to_string());
    }

    pub(crate) fn record_sealed(&self) {
        let mut status = self.inner.write();
        status.active_segment = None;
        status.segments_sealed += 1;
        if !status.degraded {
            status.last_error = None;
        }
    }

    pub(crate) fn record_capture_failure(&self, error: &CoreError) {
        let mut status = self.inner.write();
        status.active_segment = None;
        status.capture_failures += 1;
        status.last_error = Some(error.to_string());
    }

    pub(crate) fn record_retention(&self, evicted: usize, shortfall: Option<&CoreError>) {
        let mut status = self.inner.write();
        status.last_evicted = evicted;
        status.total_evicted += evicted as u64;
        status.degraded = shortfall.is_some();
        if let Some(error) = shortfall {
            status.last_error = Some(error.to_string());
        }
    }

    pub(crate) fn record_error(&self, error: &CoreError) {
        self.inner.write().last_error = Some(error.to_string());
    }

    pub(crate) fn stop(&self) {
        let mut status = self.inner.write();
        status.state = OrchestratorState::Stopped;
        status.active_segment = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(OrchestratorState::Idle.name(), "idle");
        assert_eq!(OrchestratorState::CheckingStorage.name(), "checking-storage");
        assert!(OrchestratorState::Recording.is_capturing());
        assert!(!OrchestratorState::Stopped.is_capturing());
    }

    #[test]
    fn segment_bookkeeping() {
        let status = StatusHandle::new();
        assert_eq!(status.state(), OrchestratorState::Idle);

        status.begin_segment(&SegmentId::new("a"));
        let snap = status.snapshot();
        assert_eq!(snap.state, OrchestratorState::Recording);
        assert_eq!(snap.active_segment.as_deref(), Some("a"));

        status.record_capture_failure(&CoreError::capture_failed("encoder crashed"));
        let snap = status.snapshot();
        assert_eq!(snap.active_segment, None);
        assert_eq!(snap.capture_failures, 1);
        assert!(snap.last_error.unwrap().contains("encoder crashed"));

        status.record_sealed();
        let snap = status.snapshot();
        assert_eq!(snap.segments_sealed, 1);
        assert_eq!(snap.last_error, None);
    }

    #[test]
    fn degraded_retention_keeps_error_until_resolved() {
        let status = StatusHandle::new();
        let shortfall = CoreError::InsufficientSpace {
            evicted: 1,
            free_bytes: 10,
            threshold_bytes: 20,
        };

        status.record_retention(1, Some(&shortfall));
        status.record_sealed();
        let snap = status.snapshot();
        assert!(snap.degraded);
        assert!(snap.last_error.is_some());
        assert_eq!(snap.total_evicted, 1);

        status.record_retention(2, None);
        status.record_sealed();
        let snap = status.snapshot();
        assert!(!snap.degraded);
        assert_eq!(snap.last_error, None);
        assert_eq!(snap.last_evicted, 2);
        assert_eq!(snap.total_evicted, 3);
    }
}
