//! Timestamp burn-in hook.

use chrono::{DateTime, Local};
use std::time::SystemTime;

/// Default overlay text format, e.g. `2024-01-01 08:00:00`.
pub const DEFAULT_OVERLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A mutable view of one raw frame.
#[derive(Debug)]
pub struct Frame<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Raw pixel data in the source's native layout.
    pub pixels: &'a mut [u8],
    /// When the frame was captured.
    pub captured_at: SystemTime,
}

/// Draws text onto frames.
///
/// Position, font and color are up to the implementation.
pub trait FrameAnnotator: Send + Sync {
    /// Draws `text` onto `frame`.
    fn annotate(&self, frame: &mut Frame<'_>, text: &str);
}

/// Produces the wall-clock text burned into each frame.
#[derive(Debug, Clone)]
pub struct OverlayClock {
    format: String,
}

impl Default for OverlayClock {
    fn default() -> Self {
        Self::new(DEFAULT_OVERLAY_FORMAT)
    }
}

impl OverlayClock {
    /// Creates a clock using a `strftime`-style format.
    #[must_use]
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    /// Returns the format string.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Returns the text for `at` in local time.
    #[must_use]
    pub fn text_at(&self, at: SystemTime) -> String {
        DateTime::<Local>::from(at).format(&self.format).to_string()
    }

    /// Returns the text for the current instant.
    #[must_use]
    pub fn now(&self) -> String {
        self.text_at(SystemTime::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_format_matches_local_time() {
        let clock = OverlayClock::default();
        let local = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 3).unwrap();
        let at = SystemTime::from(local);

        assert_eq!(clock.text_at(at), "2024-03-09 07:05:03");
    }

    #[test]
    fn custom_format() {
        let clock = OverlayClock::new("%H:%M");
        let local = Local.with_ymd_and_hms(2024, 3, 9, 17, 45, 0).unwrap();

        assert_eq!(clock.text_at(SystemTime::from(local)), "17:45");
        assert_eq!(clock.now().len(), 5);
    }
}
