//! The recording loop.
//!
//! ```text
//!        ┌──────────────────────────────────────────────┐
//!        ▼                                              │
//!  CheckingStorage ──▶ Recording ──▶ Sealing ──▶ (segment gap)
//!        │                 │
//!        │                 └── capture failed: discard, count, retry
//!        └── StorageUnavailable: stop
//! ```
//!
//! The loop exits when the stop signal is triggered (the current segment is
//! finished gracefully and sealed first) or when a fatal error occurs.
//!
//! Captures write to a hidden in-progress name. Sealing renames the file to
//! its managed name, so everything under a managed name is complete.

mod status;

pub use status::{OrchestratorState, OrchestratorStatus, StatusHandle};

use crate::capture::{CaptureHandle, CaptureOutcome, CaptureRequest, CaptureSource, Overlay};
use crate::config::RecorderConfig;
use crate::dir::newest_issued_id;
use crate::error::{CoreError, CoreResult};
use crate::retention::{RetentionManager, RetentionSet, RetentionWorker};
use crate::segment::{Segment, SegmentId, SegmentNamer};
use crate::signal::StopSignal;
use looprec_storage::Volume;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, error, info, warn};

/// Totals for one call to [`Orchestrator::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Segments sealed.
    pub segments_sealed: u64,
    /// Captures that failed.
    pub capture_failures: u64,
    /// Segments evicted, including by the background worker.
    pub segments_evicted: u64,
    /// Most recently sealed segment.
    pub last_segment: Option<SegmentId>,
}

/// Drives one capture source against one volume.
///
/// The orchestrator is the only writer of the retention set apart from the
/// optional [`RetentionWorker`], which shares it through a mutex.
pub struct Orchestrator<V: Volume + ?Sized + 'static, S: CaptureSource> {
    config: RecorderConfig,
    volume: Arc<V>,
    source: S,
    namer: SegmentNamer,
    manager: RetentionManager,
    set: Arc<Mutex<RetentionSet>>,
    status: StatusHandle,
    overlay: Option<Overlay>,
}

impl<V: Volume + ?Sized + 'static, S: CaptureSource> Orchestrator<V, S> {
    /// Creates an orchestrator, recovering existing segments from `volume`.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the configuration is rejected
    /// - `StorageUnavailable` if the volume cannot be listed
    pub fn new(config: RecorderConfig, volume: Arc<V>, source: S) -> CoreResult<Self> {
        config.validate()?;

        let mut namer = SegmentNamer::new(config.file_prefix.clone(), config.file_suffix.clone());
        let set = RetentionSet::rebuild(&*volume, &namer)?;
        if let Some(newest) = newest_issued_id(&set) {
            namer.resume_after(&newest);
        }
        // Unfinished captures hold issued ids too
        for entry in volume.list_files(namer.suffix())? {
            if let Some(id) = namer.id_from_partial_name(&entry.name) {
                namer.resume_after(&id);
            }
        }
        info!(
            volume = %volume.root().display(),
            recovered = set.len(),
            retained_bytes = set.total_bytes(),
            "recovered segments"
        );

        Ok(Self {
            manager: RetentionManager::new(config.threshold_bytes),
            config,
            volume,
            source,
            namer,
            set: Arc::new(Mutex::new(set)),
            status: StatusHandle::new(),
            overlay: None,
        })
    }

    /// Burns `overlay` into every captured frame.
    #[must_use]
    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Returns a handle for observing status from other threads.
    #[must_use]
    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> OrchestratorStatus {
        self.status.snapshot()
    }

    /// Locks and returns the retention set.
    pub fn retention_set(&self) -> MutexGuard<'_, RetentionSet> {
        self.set.lock()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Returns the capture source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Records segments until `stop` is triggered or a fatal error occurs.
    ///
    /// The capture source is opened first and closed on every exit path.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the volume goes away
    /// - `RepeatedCaptureFailure` once consecutive capture failures exceed
    ///   the configured maximum
    /// - `NamingCollision` if a fresh segment path already exists
    /// - any error from opening the source or starting the worker
    pub fn run(&mut self, stop: &StopSignal) -> CoreResult<RunSummary> {
        let before = self.status.snapshot();
        info!(
            segment_duration = ?self.config.segment_duration,
            threshold_bytes = self.config.threshold_bytes,
            "recorder starting"
        );

        let mut last_segment = None;
        let result = self.run_with_worker(stop, &mut last_segment);
        self.source.close();
        self.status.stop();

        match &result {
            Ok(()) => info!("recorder stopped"),
            Err(err) => {
                error!(error = %err, "recorder stopped on error");
                self.status.record_error(err);
            }
        }

        let after = self.status.snapshot();
        result.map(|()| RunSummary {
            segments_sealed: after.segments_sealed - before.segments_sealed,
            capture_failures: after.capture_failures - before.capture_failures,
            segments_evicted: after.total_evicted - before.total_evicted,
            last_segment,
        })
    }

    fn run_with_worker(
        &mut self,
        stop: &StopSignal,
        last_segment: &mut Option<SegmentId>,
    ) -> CoreResult<()> {
        let worker = match self.config.retention_interval {
            Some(interval) => Some(RetentionWorker::spawn(
                self.manager,
                Arc::clone(&self.volume),
                Arc::clone(&self.set),
                self.status.clone(),
                interval,
            )?),
            None => None,
        };

        let result = self
            .source
            .open()
            .and_then(|()| self.record_loop(stop, last_segment));

        if let Some(worker) = worker {
            worker.stop();
        }
        result
    }

    fn record_loop(
        &mut self,
        stop: &StopSignal,
        last_segment: &mut Option<SegmentId>,
    ) -> CoreResult<()> {
        let mut consecutive_failures = 0u32;

        while !stop.is_triggered() {
            self.status.set_state(OrchestratorState::CheckingStorage);
            self.check_storage()?;

            if stop.is_triggered() {
                break;
            }

            match self.record_segment(stop) {
                Ok(id) => {
                    consecutive_failures = 0;
                    *last_segment = Some(id);
                }
                Err(err) if !err.is_fatal() => {
                    consecutive_failures += 1;
                    if consecutive_failures > self.config.max_consecutive_failures {
                        return Err(CoreError::RepeatedCaptureFailure {
                            attempts: consecutive_failures,
                            last: err.to_string(),
                        });
                    }
                }
                Err(err) => return Err(err),
            }

            if stop.wait_timeout(self.config.segment_gap) {
                break;
            }
        }
        Ok(())
    }

    /// Runs one retention pass. Only volume-level errors escape.
    fn check_storage(&self) -> CoreResult<()> {
        let result = self
            .manager
            .ensure_capacity(&*self.volume, &mut self.set.lock());
        match result {
            Ok(report) => {
                if !report.failed.is_empty() {
                    warn!(failed = report.failed.len(), "some segments could not be deleted");
                }
                self.status.record_retention(report.evicted_count(), None);
                Ok(())
            }
            Err(err @ CoreError::InsufficientSpace { evicted, .. }) => {
                warn!(error = %err, "recording with insufficient free space");
                self.status.record_retention(evicted, Some(&err));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn record_segment(&mut self, stop: &StopSignal) -> CoreResult<SegmentId> {
        let started_at = SystemTime::now();
        let id = self.namer.next_id(started_at);
        let path = self.volume.root().join(self.namer.file_name(&id));
        let partial = self.volume.root().join(self.namer.partial_file_name(&id));
        if let Some(taken) = [&path, &partial].into_iter().find(|p| self.volume.exists(p)) {
            return Err(CoreError::NamingCollision {
                path: taken.clone(),
            });
        }

        let mut segment = Segment::recording(id.clone(), partial.clone(), started_at);
        self.status.begin_segment(&id);
        info!(segment = %id, path = %partial.display(), "recording segment");

        let mut request = CaptureRequest::new(partial.clone(), self.config.segment_duration);
        request.overlay = self.overlay.clone();

        let captured = match self.source.start_capture(request) {
            Ok(mut handle) => self.await_capture(&mut handle, stop),
            Err(err) => Err(err),
        };
        let outcome = match captured {
            Ok(outcome) => outcome,
            Err(err) if !err.is_fatal() => {
                self.discard_failed(&segment, &err);
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        self.status.set_state(OrchestratorState::Sealing);
        let size = match self.volume.file_size(&partial) {
            Ok(size) => size,
            Err(err) if err.is_unavailable() => return Err(err.into()),
            Err(err) => {
                let failure = CoreError::capture_failed(format!("segment file missing: {err}"));
                self.discard_failed(&segment, &failure);
                return Err(failure);
            }
        };
        if size != outcome.bytes_written {
            debug!(
                segment = %id,
                reported = outcome.bytes_written,
                on_disk = size,
                "capture size differs from file size"
            );
        }

        match self.volume.rename_file(&partial, &path) {
            Ok(()) => {}
            Err(err) if err.is_unavailable() => return Err(err.into()),
            Err(err) => {
                let failure =
                    CoreError::capture_failed(format!("could not seal segment file: {err}"));
                self.discard_failed(&segment, &failure);
                return Err(failure);
            }
        }

        segment.seal(path, size)?;
        if let Err(rejected) = self.set.lock().insert(segment) {
            return Err(CoreError::NamingCollision {
                path: rejected.path().to_path_buf(),
            });
        }
        self.status.record_sealed();
        info!(
            segment = %id,
            size_bytes = size,
            finished_early = outcome.finished_early,
            "sealed segment"
        );
        Ok(id)
    }

    /// Polls `handle` to completion, asking it to finish on stop or once
    /// the segment duration has elapsed.
    fn await_capture(
        &self,
        handle: &mut S::Handle,
        stop: &StopSignal,
    ) -> CoreResult<CaptureOutcome> {
        let started = Instant::now();
        let mut finish_requested: Option<Instant> = None;

        loop {
            if let Some(outcome) = handle.poll_completion(self.config.poll_interval)? {
                return Ok(outcome);
            }

            match finish_requested {
                None if stop.is_triggered() || started.elapsed() >= self.config.segment_duration => {
                    debug!(stopping = stop.is_triggered(), "requesting capture finish");
                    handle.request_finish()?;
                    finish_requested = Some(Instant::now());
                }
                Some(at) if at.elapsed() >= self.config.finish_timeout => {
                    return Err(CoreError::capture_failed(format!(
                        "capture did not finish within {:?}",
                        self.config.finish_timeout
                    )));
                }
                _ => {}
            }
        }
    }

    /// Records a failed capture. The segment is never sealed, and a kept
    /// partial file stays under its in-progress name.
    fn discard_failed(&self, segment: &Segment, err: &CoreError) {
        warn!(segment = %segment.id(), error = %err, "capture failed");
        self.status.record_capture_failure(err);

        if !self.config.discard_failed_segments || !self.volume.exists(segment.path()) {
            return;
        }
        match self.volume.remove_file(segment.path()) {
            Ok(()) => debug!(segment = %segment.id(), "discarded partial segment"),
            Err(e) => warn!(segment = %segment.id(), error = %e, "failed to discard partial segment"),
        }
    }
}
