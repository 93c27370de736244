//! Frame/encode sources.
//!
//! The orchestrator never touches the camera or the encoder. It asks a
//! [`CaptureSource`] to write one segment to a path and polls the returned
//! [`CaptureHandle`] until the segment is complete.
//!
//! # Contract
//!
//! - `start_capture` must create the destination file. Nothing else may
//!   write to it until the handle reports completion or failure.
//! - `poll_completion` returns `Ok(None)` while the capture is in flight,
//!   `Ok(Some(outcome))` once the file is closed and flushed, and
//!   `Err(CaptureFailed)` if the capture aborted.
//! - `request_finish` asks for a graceful early end. The capture must still
//!   be polled to completion afterwards.
//! - Dropping a handle releases the capture's resources.

mod command;
mod overlay;
mod scripted;

pub use command::{CommandCapture, CommandHandle};
pub use overlay::{Frame, FrameAnnotator, OverlayClock, DEFAULT_OVERLAY_FORMAT};
pub use scripted::{CaptureLog, CaptureStep, ScriptedCapture, ScriptedHandle};

use crate::error::CoreResult;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything a source needs to record one segment.
#[derive(Clone)]
pub struct CaptureRequest {
    /// File the segment is written to.
    pub destination: PathBuf,
    /// Length after which the source should finish on its own.
    pub max_duration: Duration,
    /// Per-frame annotation hook, if overlays are enabled.
    pub overlay: Option<Overlay>,
}

impl CaptureRequest {
    /// Creates a request without an overlay.
    #[must_use]
    pub fn new(destination: PathBuf, max_duration: Duration) -> Self {
        Self {
            destination,
            max_duration,
            overlay: None,
        }
    }

    /// Runs the overlay, if any, on one frame.
    pub fn annotate(&self, frame: &mut Frame<'_>) {
        if let Some(overlay) = &self.overlay {
            overlay.apply(frame);
        }
    }
}

impl fmt::Debug for CaptureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRequest")
            .field("destination", &self.destination)
            .field("max_duration", &self.max_duration)
            .field("overlay", &self.overlay.is_some())
            .finish()
    }
}

/// A text provider paired with the annotator that draws it.
#[derive(Clone)]
pub struct Overlay {
    clock: OverlayClock,
    annotator: Arc<dyn FrameAnnotator>,
}

impl Overlay {
    /// Creates an overlay drawing `clock` text with `annotator`.
    #[must_use]
    pub fn new(clock: OverlayClock, annotator: Arc<dyn FrameAnnotator>) -> Self {
        Self { clock, annotator }
    }

    /// Returns the clock supplying the text.
    #[must_use]
    pub fn clock(&self) -> &OverlayClock {
        &self.clock
    }

    /// Annotates `frame` with the current wall-clock text.
    pub fn apply(&self, frame: &mut Frame<'_>) {
        let text = self.clock.text_at(frame.captured_at);
        self.annotator.annotate(frame, &text);
    }
}

/// Result of a completed capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Bytes the source reports having written.
    pub bytes_written: u64,
    /// Whether the capture ended on `request_finish` rather than on its own.
    pub finished_early: bool,
}

/// Something that can record segments.
pub trait CaptureSource: Send {
    /// Handle to one in-flight capture.
    type Handle: CaptureHandle;

    /// Prepares the device. Called once before the first segment.
    ///
    /// # Errors
    ///
    /// A failure here ends the run before anything is recorded.
    fn open(&mut self) -> CoreResult<()> {
        Ok(())
    }

    /// Starts recording one segment.
    ///
    /// # Errors
    ///
    /// Returns `CaptureFailed` if the capture could not be started.
    fn start_capture(&mut self, request: CaptureRequest) -> CoreResult<Self::Handle>;

    /// Releases the device. Called once on every exit path of a run.
    fn close(&mut self) {}
}

/// One in-flight capture.
pub trait CaptureHandle: Send {
    /// Waits up to `timeout` for the capture to end.
    ///
    /// # Errors
    ///
    /// Returns `CaptureFailed` if the capture aborted.
    fn poll_completion(&mut self, timeout: Duration) -> CoreResult<Option<CaptureOutcome>>;

    /// Asks the source to end the segment now and close the file cleanly.
    ///
    /// # Errors
    ///
    /// Returns `CaptureFailed` if the request could not be delivered.
    fn request_finish(&mut self) -> CoreResult<()>;
}
