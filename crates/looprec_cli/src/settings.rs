//! Recorder settings file.
//!
//! Every key is optional. Values present in the file replace the built-in
//! defaults, and command-line flags replace both.
//!
//! ```toml
//! volume_path = "/mnt/sd/dashcam"
//! segment_secs = 300
//! threshold_mb = 500
//! file_suffix = ".h264"
//! capture_command = "ffmpeg -f v4l2 -i /dev/video0 -t {duration_secs} -y {output}"
//! ```

use looprec_core::{CommandCapture, RecorderConfig, MIB};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors reading a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Settings file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid settings TOML.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// Settings file path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
}

/// Contents of a settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Directory segments are written to.
    pub volume_path: Option<PathBuf>,
    /// Segment length in seconds.
    pub segment_secs: Option<u64>,
    /// Minimum free space in MiB.
    pub threshold_mb: Option<u64>,
    /// Segment file name prefix.
    pub file_prefix: Option<String>,
    /// Segment file suffix.
    pub file_suffix: Option<String>,
    /// Pause between segments in milliseconds.
    pub segment_gap_ms: Option<u64>,
    /// Capture poll interval in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Time a finishing capture may take, in seconds.
    pub finish_timeout_secs: Option<u64>,
    /// Consecutive capture failures tolerated.
    pub max_consecutive_failures: Option<u32>,
    /// Whether partial files from failed captures are deleted.
    pub discard_failed_segments: Option<bool>,
    /// Background retention period in seconds.
    pub retention_interval_secs: Option<u64>,
    /// Whether to create the volume directory.
    pub create_if_missing: Option<bool>,
    /// Encoder command template.
    pub capture_command: Option<String>,
    /// Bytes written to the encoder's stdin to finish early.
    pub finish_input: Option<String>,
    /// Seconds a finishing encoder gets before it is killed.
    pub finish_grace_secs: Option<u64>,
}

impl Settings {
    /// Reads settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Reads `path` if given, otherwise returns empty settings.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, SettingsError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Overlays the values in `other` onto these settings.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            volume_path: other.volume_path.or(self.volume_path),
            segment_secs: other.segment_secs.or(self.segment_secs),
            threshold_mb: other.threshold_mb.or(self.threshold_mb),
            file_prefix: other.file_prefix.or(self.file_prefix),
            file_suffix: other.file_suffix.or(self.file_suffix),
            segment_gap_ms: other.segment_gap_ms.or(self.segment_gap_ms),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            finish_timeout_secs: other.finish_timeout_secs.or(self.finish_timeout_secs),
            max_consecutive_failures: other
                .max_consecutive_failures
                .or(self.max_consecutive_failures),
            discard_failed_segments: other
                .discard_failed_segments
                .or(self.discard_failed_segments),
            retention_interval_secs: other
                .retention_interval_secs
                .or(self.retention_interval_secs),
            create_if_missing: other.create_if_missing.or(self.create_if_missing),
            capture_command: other.capture_command.or(self.capture_command),
            finish_input: other.finish_input.or(self.finish_input),
            finish_grace_secs: other.finish_grace_secs.or(self.finish_grace_secs),
        }
    }

    /// Builds the recorder configuration.
    #[must_use]
    pub fn recorder_config(&self) -> RecorderConfig {
        let mut config = match &self.volume_path {
            Some(path) => RecorderConfig::new(path.clone()),
            None => RecorderConfig::default(),
        };
        if let Some(secs) = self.segment_secs {
            config = config.segment_duration(Duration::from_secs(secs));
        }
        if let Some(mb) = self.threshold_mb {
            config = config.threshold_bytes(mb.saturating_mul(MIB));
        }
        if let Some(prefix) = &self.file_prefix {
            config = config.file_prefix(prefix.clone());
        }
        if let Some(suffix) = &self.file_suffix {
            config = config.file_suffix(suffix.clone());
        }
        if let Some(ms) = self.segment_gap_ms {
            config = config.segment_gap(Duration::from_millis(ms));
        }
        if let Some(ms) = self.poll_interval_ms {
            config = config.poll_interval(Duration::from_millis(ms));
        }
        if let Some(secs) = self.finish_timeout_secs {
            config = config.finish_timeout(Duration::from_secs(secs));
        }
        if let Some(count) = self.max_consecutive_failures {
            config = config.max_consecutive_failures(count);
        }
        if let Some(discard) = self.discard_failed_segments {
            config = config.discard_failed_segments(discard);
        }
        if let Some(secs) = self.retention_interval_secs {
            config = config.retention_interval(Some(Duration::from_secs(secs)));
        }
        if let Some(create) = self.create_if_missing {
            config = config.create_if_missing(create);
        }
        config
    }

    /// Builds the encoder source, if a command is configured.
    pub fn capture(&self) -> Result<Option<CommandCapture>, looprec_core::CoreError> {
        let Some(command) = &self.capture_command else {
            return Ok(None);
        };
        let mut capture = CommandCapture::parse(command)?;
        if let Some(input) = &self.finish_input {
            capture = capture.finish_input(input.clone());
        }
        if let Some(secs) = self.finish_grace_secs {
            capture = capture.finish_grace(Duration::from_secs(secs));
        }
        Ok(Some(capture))
    }
}
