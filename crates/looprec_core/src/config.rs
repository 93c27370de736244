//! Recorder configuration.

use crate::error::{CoreError, CoreResult};
use std::path::PathBuf;
use std::time::Duration;

/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Configuration for a loop recorder on one volume.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory segments are written to and scanned from.
    pub volume_path: PathBuf,

    /// Capture length of each segment.
    pub segment_duration: Duration,

    /// Minimum free space to maintain on the volume.
    pub threshold_bytes: u64,

    /// Prefix of segment file names.
    pub file_prefix: String,

    /// Suffix (extension) that marks a file as a managed segment.
    pub file_suffix: String,

    /// Pause between two segments.
    pub segment_gap: Duration,

    /// How often an in-flight capture is polled for completion and stop.
    pub poll_interval: Duration,

    /// How long a capture may take to wind down after a finish request.
    pub finish_timeout: Duration,

    /// Consecutive capture failures tolerated before the run is aborted.
    pub max_consecutive_failures: u32,

    /// Whether partial files from failed captures are deleted.
    pub discard_failed_segments: bool,

    /// Period of the background retention worker (`None` = disabled).
    pub retention_interval: Option<Duration>,

    /// Whether to create the volume directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            volume_path: PathBuf::from("./dashcam_videos"),
            segment_duration: Duration::from_secs(300), // 5 minutes
            threshold_bytes: 500 * MIB,
            file_prefix: "loop_".to_string(),
            file_suffix: ".h264".to_string(),
            segment_gap: Duration::from_secs(1),
            poll_interval: Duration::from_millis(250),
            finish_timeout: Duration::from_secs(10),
            max_consecutive_failures: 3,
            discard_failed_segments: true,
            retention_interval: None,
            create_if_missing: true,
        }
    }
}

impl RecorderConfig {
    /// Creates a configuration with default values for `volume_path`.
    #[must_use]
    pub fn new(volume_path: impl Into<PathBuf>) -> Self {
        Self {
            volume_path: volume_path.into(),
            ..Self::default()
        }
    }

    /// Sets the segment duration.
    #[must_use]
    pub const fn segment_duration(mut self, duration: Duration) -> Self {
        self.segment_duration = duration;
        self
    }

    /// Sets the free space threshold in bytes.
    #[must_use]
    pub const fn threshold_bytes(mut self, bytes: u64) -> Self {
        self.threshold_bytes = bytes;
        self
    }

    /// Sets the file name prefix.
    #[must_use]
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Sets the file suffix used to recognize managed segments.
    #[must_use]
    pub fn file_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.file_suffix = suffix.into();
        self
    }

    /// Sets the pause between segments.
    #[must_use]
    pub const fn segment_gap(mut self, gap: Duration) -> Self {
        self.segment_gap = gap;
        self
    }

    /// Sets the capture poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets how long a finishing capture may take.
    #[must_use]
    pub const fn finish_timeout(mut self, timeout: Duration) -> Self {
        self.finish_timeout = timeout;
        self
    }

    /// Sets how many consecutive capture failures are tolerated.
    #[must_use]
    pub const fn max_consecutive_failures(mut self, count: u32) -> Self {
        self.max_consecutive_failures = count;
        self
    }

    /// Sets whether partial files from failed captures are deleted.
    #[must_use]
    pub const fn discard_failed_segments(mut self, value: bool) -> Self {
        self.discard_failed_segments = value;
        self
    }

    /// Enables the background retention worker.
    #[must_use]
    pub const fn retention_interval(mut self, interval: Option<Duration>) -> Self {
        self.retention_interval = interval;
        self
    }

    /// Sets whether to create the volume directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Checks the configuration for values the recorder cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> CoreResult<()> {
        if self.segment_duration.is_zero() {
            return Err(CoreError::invalid_config("segment duration must be positive"));
        }
        if self.poll_interval.is_zero() {
            return Err(CoreError::invalid_config("poll interval must be positive"));
        }
        if self.finish_timeout.is_zero() {
            return Err(CoreError::invalid_config("finish timeout must be positive"));
        }
        if self.file_suffix.is_empty() {
            return Err(CoreError::invalid_config(
                "file suffix must not be empty, it is how segments are recognized",
            ));
        }
        if self
            .file_prefix
            .chars()
            .chain(self.file_suffix.chars())
            .any(std::path::is_separator)
        {
            return Err(CoreError::invalid_config(
                "file prefix and suffix must not contain path separators",
            ));
        }
        if self.file_prefix.starts_with('.') {
            return Err(CoreError::invalid_config(
                "file prefix must not start with '.', hidden names mark unfinished captures",
            ));
        }
        if self.max_consecutive_failures == 0 {
            return Err(CoreError::invalid_config(
                "max consecutive failures must be at least 1",
            ));
        }
        if matches!(self.retention_interval, Some(interval) if interval.is_zero()) {
            return Err(CoreError::invalid_config("retention interval must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RecorderConfig::default();
        assert_eq!(config.segment_duration, Duration::from_secs(300));
        assert_eq!(config.threshold_bytes, 500 * MIB);
        assert_eq!(config.file_suffix, ".h264");
        assert!(config.discard_failed_segments);
        assert!(config.retention_interval.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = RecorderConfig::new("/media/sd")
            .segment_duration(Duration::from_secs(60))
            .threshold_bytes(1024)
            .file_suffix(".mp4")
            .retention_interval(Some(Duration::from_secs(10)));

        assert_eq!(config.volume_path, PathBuf::from("/media/sd"));
        assert_eq!(config.segment_duration, Duration::from_secs(60));
        assert_eq!(config.threshold_bytes, 1024);
        assert_eq!(config.file_suffix, ".mp4");
        assert_eq!(config.retention_interval, Some(Duration::from_secs(10)));
    }

    #[test]
    fn rejects_bad_values() {
        let base = RecorderConfig::default();

        assert!(base.clone().segment_duration(Duration::ZERO).validate().is_err());
        assert!(base.clone().finish_timeout(Duration::ZERO).validate().is_err());
        assert!(base.clone().file_suffix("").validate().is_err());
        assert!(base.clone().file_prefix("a/b").validate().is_err());
        assert!(base.clone().file_prefix(".loop_").validate().is_err());
        assert!(base.clone().max_consecutive_failures(0).validate().is_err());
        assert!(base
            .retention_interval(Some(Duration::ZERO))
            .validate()
            .is_err());
    }
}
