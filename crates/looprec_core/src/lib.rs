//! # LoopRec Core
//!
//! Segment orchestration and space-bounded retention for loop recorders.
//!
//! This crate provides:
//! - Segment naming with sortable, collision-free identifiers
//! - A retention set of sealed segments, rebuilt from disk on start
//! - A retention manager that evicts oldest-first down to a free-space
//!   threshold, never touching the segment being recorded
//! - The orchestrator loop driving a pluggable capture source
//!
//! ## Example
//!
//! ```rust,ignore
//! use looprec_core::{CommandCapture, Orchestrator, RecorderConfig, StopSignal, VolumeDir};
//!
//! let config = RecorderConfig::new("/mnt/sd/dashcam");
//! let dir = VolumeDir::open(&config.volume_path, config.create_if_missing)?;
//! let source = CommandCapture::parse("ffmpeg -f v4l2 -i /dev/video0 -t {duration_secs} -y {output}")?;
//!
//! let stop = StopSignal::new();
//! let mut orchestrator = Orchestrator::new(config, dir.volume(), source)?;
//! orchestrator.run(&stop)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod capture;
mod config;
mod dir;
mod error;
mod orchestrator;
mod retention;
mod segment;
mod signal;

pub use capture::{
    CaptureHandle, CaptureLog, CaptureOutcome, CaptureRequest, CaptureSource, CaptureStep,
    CommandCapture, CommandHandle, Frame, FrameAnnotator, Overlay, OverlayClock, ScriptedCapture,
    ScriptedHandle, DEFAULT_OVERLAY_FORMAT,
};
pub use config::{RecorderConfig, MIB};
pub use dir::{Recovered, VolumeDir, LOCK_FILE};
pub use error::{CoreError, CoreResult};
pub use orchestrator::{
    Orchestrator, OrchestratorState, OrchestratorStatus, RunSummary, StatusHandle,
};
pub use retention::{EvictionPlan, RetentionManager, RetentionReport, RetentionSet, RetentionWorker};
pub use segment::{Segment, SegmentId, SegmentNamer, SegmentState};
pub use signal::StopSignal;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
