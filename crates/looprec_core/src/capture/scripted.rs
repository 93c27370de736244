//! Deterministic capture source for tests and simulations.

use crate::capture::{CaptureHandle, CaptureOutcome, CaptureRequest, CaptureSource, Frame};
use crate::error::{CoreError, CoreResult};
use crate::signal::StopSignal;
use looprec_storage::MemoryVolume;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

/// What the next capture does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStep {
    /// Completes on the first poll with a file of `bytes`.
    Complete {
        /// Final file size.
        bytes: u64,
    },
    /// Aborts on the first poll, leaving a partial file behind.
    Fail {
        /// Failure message.
        message: String,
        /// Size of the partial file.
        partial_bytes: u64,
    },
    /// Cannot even be started; no file is created.
    StartFails {
        /// Failure message.
        message: String,
    },
    /// Runs until a finish is requested, then completes with `bytes`.
    Hang {
        /// Final file size.
        bytes: u64,
    },
}

/// Everything a [`ScriptedCapture`] was asked to do.
///
/// Clones share the same log, so a test can keep one while the source is
/// moved into an orchestrator.
#[derive(Debug, Clone, Default)]
pub struct CaptureLog {
    inner: Arc<Mutex<LogState>>,
}

#[derive(Debug, Default)]
struct LogState {
    opened: u32,
    closed: u32,
    started: Vec<PathBuf>,
    finish_requests: u32,
    annotated_frames: u32,
    released: u32,
}

impl CaptureLog {
    /// Returns how often the source was opened.
    #[must_use]
    pub fn opened(&self) -> u32 {
        self.inner.lock().opened
    }

    /// Returns how often the source was closed.
    #[must_use]
    pub fn closed(&self) -> u32 {
        self.inner.lock().closed
    }

    /// Returns every destination a capture was requested for, in order.
    #[must_use]
    pub fn started(&self) -> Vec<PathBuf> {
        self.inner.lock().started.clone()
    }

    /// Returns how many graceful finishes were requested.
    #[must_use]
    pub fn finish_requests(&self) -> u32 {
        self.inner.lock().finish_requests
    }

    /// Returns how many frames went through an overlay.
    #[must_use]
    pub fn annotated_frames(&self) -> u32 {
        self.inner.lock().annotated_frames
    }

    /// Returns how many capture handles were dropped.
    #[must_use]
    pub fn released(&self) -> u32 {
        self.inner.lock().released
    }
}

/// Plays back a fixed list of [`CaptureStep`]s against a [`MemoryVolume`].
///
/// When the last step starts, the optional stop signal is triggered so a
/// run ends once the script has played out.
///
/// # Example
///
/// ```rust,ignore
/// let stop = StopSignal::new();
/// let source = ScriptedCapture::new(Arc::clone(&volume))
///     .step(CaptureStep::Complete { bytes: 50 })
///     .step(CaptureStep::Fail { message: "usb reset".into(), partial_bytes: 7 })
///     .stop_when_exhausted(stop.clone());
/// ```
#[derive(Debug)]
pub struct ScriptedCapture {
    volume: Arc<MemoryVolume>,
    steps: VecDeque<CaptureStep>,
    stop_when_exhausted: Option<StopSignal>,
    open_failure: Option<String>,
    log: CaptureLog,
}

impl ScriptedCapture {
    /// Creates a source with an empty script.
    #[must_use]
    pub fn new(volume: Arc<MemoryVolume>) -> Self {
        Self {
            volume,
            steps: VecDeque::new(),
            stop_when_exhausted: None,
            open_failure: None,
            log: CaptureLog::default(),
        }
    }

    /// Appends a step.
    #[must_use]
    pub fn step(mut self, step: CaptureStep) -> Self {
        self.steps.push_back(step);
        self
    }

    /// Appends `count` completing captures of `bytes` each.
    #[must_use]
    pub fn complete_times(mut self, count: usize, bytes: u64) -> Self {
        self.steps
            .extend(std::iter::repeat(CaptureStep::Complete { bytes }).take(count));
        self
    }

    /// Triggers `stop` when the last step starts.
    #[must_use]
    pub fn stop_when_exhausted(mut self, stop: StopSignal) -> Self {
        self.stop_when_exhausted = Some(stop);
        self
    }

    /// Makes `open` fail with `message`.
    #[must_use]
    pub fn fail_on_open(mut self, message: impl Into<String>) -> Self {
        self.open_failure = Some(message.into());
        self
    }

    /// Returns a handle on the shared log.
    #[must_use]
    pub fn log(&self) -> CaptureLog {
        self.log.clone()
    }
}

impl CaptureSource for ScriptedCapture {
    type Handle = ScriptedHandle;

    fn open(&mut self) -> CoreResult<()> {
        self.log.inner.lock().opened += 1;
        match &self.open_failure {
            Some(message) => Err(CoreError::capture_failed(message.clone())),
            None => Ok(()),
        }
    }

    fn start_capture(&mut self, request: CaptureRequest) -> CoreResult<ScriptedHandle> {
        self.log.inner.lock().started.push(request.destination.clone());

        let step = self
            .steps
            .pop_front()
            .ok_or_else(|| CoreError::capture_failed("capture script exhausted"))?;
        if self.steps.is_empty() {
            if let Some(stop) = &self.stop_when_exhausted {
                stop.trigger();
            }
        }

        if let CaptureStep::StartFails { message } = step {
            return Err(CoreError::capture_failed(message));
        }

        self.volume.write_file(&request.destination, 0);

        if request.overlay.is_some() {
            let mut pixels = [0u8; 8];
            let mut frame = Frame {
                width: 2,
                height: 1,
                pixels: &mut pixels,
                captured_at: SystemTime::now(),
            };
            request.annotate(&mut frame);
            self.log.inner.lock().annotated_frames += 1;
        }

        Ok(ScriptedHandle {
            volume: Arc::clone(&self.volume),
            destination: request.destination,
            step: Some(step),
            finish_requested: false,
            log: self.log.clone(),
        })
    }

    fn close(&mut self) {
        self.log.inner.lock().closed += 1;
    }
}

/// A capture being played back.
#[derive(Debug)]
pub struct ScriptedHandle {
    volume: Arc<MemoryVolume>,
    destination: PathBuf,
    step: Option<CaptureStep>,
    finish_requested: bool,
    log: CaptureLog,
}

impl ScriptedHandle {
    fn complete(&mut self, bytes: u64) -> CoreResult<Option<CaptureOutcome>> {
        self.step = None;
        self.volume.write_file(&self.destination, bytes);
        Ok(Some(CaptureOutcome {
            bytes_written: bytes,
            finished_early: self.finish_requested,
        }))
    }
}

impl CaptureHandle for ScriptedHandle {
    fn poll_completion(&mut self, timeout: Duration) -> CoreResult<Option<CaptureOutcome>> {
        match self.step.clone() {
            Some(CaptureStep::Complete { bytes }) => self.complete(bytes),
            Some(CaptureStep::Hang { bytes }) if self.finish_requested => self.complete(bytes),
            Some(CaptureStep::Hang { .. }) => {
                thread::sleep(timeout);
                Ok(None)
            }
            Some(CaptureStep::Fail {
                message,
                partial_bytes,
            }) => {
                self.step = None;
                self.volume.write_file(&self.destination, partial_bytes);
                Err(CoreError::capture_failed(message))
            }
            Some(CaptureStep::StartFails { message }) => {
                self.step = None;
                Err(CoreError::capture_failed(message))
            }
            None => Err(CoreError::capture_failed("capture already ended")),
        }
    }

    fn request_finish(&mut self) -> CoreResult<()> {
        self.finish_requested = true;
        self.log.inner.lock().finish_requests += 1;
        Ok(())
    }
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.log.inner.lock().released += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FrameAnnotator, Overlay, OverlayClock};
    use looprec_storage::Volume;

    struct Recorder(Mutex<Vec<String>>);

    impl FrameAnnotator for Recorder {
        fn annotate(&self, frame: &mut Frame<'_>, text: &str) {
            frame.pixels[0] = 255;
            self.0.lock().push(text.to_string());
        }
    }

    fn volume() -> Arc<MemoryVolume> {
        Arc::new(MemoryVolume::new("/cam", 10_000))
    }

    #[test]
    fn plays_steps_in_order() {
        let volume = volume();
        let mut source = ScriptedCapture::new(Arc::clone(&volume))
            .step(CaptureStep::Complete { bytes: 40 })
            .step(CaptureStep::Fail {
                message: "usb reset".into(),
                partial_bytes: 7,
            });
        let log = source.log();

        let a = PathBuf::from("/cam/a.h264");
        let mut handle = source
            .start_capture(CaptureRequest::new(a.clone(), Duration::from_secs(1)))
            .unwrap();
        assert_eq!(volume.file_size(&a).unwrap(), 0);
        let outcome = handle.poll_completion(Duration::ZERO).unwrap().unwrap();
        assert_eq!(outcome.bytes_written, 40);
        assert_eq!(volume.file_size(&a).unwrap(), 40);
        drop(handle);

        let b = PathBuf::from("/cam/b.h264");
        let mut handle = source
            .start_capture(CaptureRequest::new(b.clone(), Duration::from_secs(1)))
            .unwrap();
        let err = handle.poll_completion(Duration::ZERO).unwrap_err();
        assert!(matches!(err, CoreError::CaptureFailed { .. }));
        assert_eq!(volume.file_size(&b).unwrap(), 7);
        drop(handle);

        assert_eq!(log.started(), vec![a, b]);
        assert_eq!(log.released(), 2);
        assert!(source
            .start_capture(CaptureRequest::new("/cam/c".into(), Duration::from_secs(1)))
            .is_err());
    }

    #[test]
    fn hang_completes_after_finish_request() {
        let volume = volume();
        let stop = StopSignal::new();
        let mut source = ScriptedCapture::new(Arc::clone(&volume))
            .step(CaptureStep::Hang { bytes: 90 })
            .stop_when_exhausted(stop.clone());
        let log = source.log();

        let mut handle = source
            .start_capture(CaptureRequest::new("/cam/h.h264".into(), Duration::from_secs(1)))
            .unwrap();
        assert!(stop.is_triggered());
        assert_eq!(handle.poll_completion(Duration::from_millis(1)).unwrap(), None);

        handle.request_finish().unwrap();
        let outcome = handle.poll_completion(Duration::ZERO).unwrap().unwrap();
        assert!(outcome.finished_early);
        assert_eq!(outcome.bytes_written, 90);
        assert_eq!(log.finish_requests(), 1);
    }

    #[test]
    fn start_failure_creates_no_file() {
        let volume = volume();
        let mut source = ScriptedCapture::new(Arc::clone(&volume)).step(CaptureStep::StartFails {
            message: "no camera".into(),
        });

        let err = source
            .start_capture(CaptureRequest::new("/cam/x.h264".into(), Duration::from_secs(1)))
            .unwrap_err();
        assert!(matches!(err, CoreError::CaptureFailed { .. }));
        assert!(volume.file_names().is_empty());
    }

    #[test]
    fn overlay_runs_on_frames() {
        let volume = volume();
        let annotator = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut source = ScriptedCapture::new(Arc::clone(&volume)).complete_times(1, 10);
        let log = source.log();

        let mut request = CaptureRequest::new("/cam/o.h264".into(), Duration::from_secs(1));
        request.overlay = Some(Overlay::new(OverlayClock::default(), annotator.clone()));
        let _handle = source.start_capture(request).unwrap();

        assert_eq!(log.annotated_frames(), 1);
        let texts = annotator.0.lock();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].len(), "2024-01-01 00:00:00".len());
    }
}
