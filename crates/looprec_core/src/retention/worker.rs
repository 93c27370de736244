//! Periodic retention alongside an in-progress recording.

use crate::error::CoreError;
use crate::orchestrator::StatusHandle;
use crate::retention::{RetentionManager, RetentionSet};
use crate::signal::StopSignal;
use looprec_storage::Volume;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Runs [`RetentionManager::ensure_capacity`] on a fixed period.
///
/// The worker shares the retention set with the recording loop through a
/// mutex, so passes never interleave with a seal. The segment being
/// recorded is not in the set until it is sealed, which keeps it out of
/// reach here too.
///
/// Dropping the worker stops and joins the thread.
#[derive(Debug)]
pub struct RetentionWorker {
    stop: StopSignal,
    handle: Option<JoinHandle<()>>,
}

impl RetentionWorker {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the thread cannot be spawned.
    pub fn spawn<V: Volume + ?Sized + 'static>(
        manager: RetentionManager,
        volume: Arc<V>,
        set: Arc<Mutex<RetentionSet>>,
        status: StatusHandle,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let stop = StopSignal::new();
        let worker_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("looprec-retention".into())
            .spawn(move || {
                while !worker_stop.wait_timeout(interval) {
                    let result = manager.ensure_capacity(&*volume, &mut set.lock());
                    match result {
                        Ok(report) => {
                            if report.evicted_count() > 0 {
                                debug!(evicted = report.evicted_count(), "background retention pass");
                            }
                            status.record_retention(report.evicted_count(), None);
                        }
                        Err(err @ CoreError::InsufficientSpace { evicted, .. }) => {
                            warn!(error = %err, "background retention could not meet threshold");
                            status.record_retention(evicted, Some(&err));
                        }
                        Err(err) => {
                            // The recording loop owns fatal handling
                            error!(error = %err, "background retention pass failed");
                            status.record_error(&err);
                        }
                    }
                }
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stops the worker and waits for the current pass to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.trigger();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("retention worker panicked");
            }
        }
    }
}

impl Drop for RetentionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{Segment, SegmentId};
    use looprec_storage::MemoryVolume;
    use std::path::Path;
    use std::time::Instant;

    #[test]
    fn evicts_in_background_without_touching_recording_file() {
        let volume = Arc::new(MemoryVolume::new("/cam", 1_000));
        let old = volume.insert_file("old.h264", 100);
        let created = volume.list_files(".h264").unwrap()[0].created;
        let recording = Path::new("/cam/live.h264");
        volume.write_file(recording, 200);
        volume.set_free_space(50);

        let mut set = RetentionSet::new();
        set.insert(Segment::sealed(SegmentId::new("old"), old.clone(), created, 100))
            .unwrap();
        let set = Arc::new(Mutex::new(set));
        let status = StatusHandle::new();

        let worker = RetentionWorker::spawn(
            RetentionManager::new(500),
            Arc::clone(&volume),
            Arc::clone(&set),
            status.clone(),
            Duration::from_millis(5),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while volume.exists(&old) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        // Give the next pass a chance to report the shortfall
        thread::sleep(Duration::from_millis(30));
        worker.stop();

        assert!(!volume.exists(&old));
        assert!(volume.exists(recording));
        assert!(set.lock().is_empty());
        let snap = status.snapshot();
        assert!(snap.degraded);
        assert_eq!(snap.total_evicted, 1);
    }
}
