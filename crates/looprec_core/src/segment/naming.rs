//! Segment identifiers and file naming.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sequence numbers per millisecond before the logical clock advances.
///
/// Four digits keep every token the same width, so string order equals
/// issue order.
const SEQ_LIMIT: u32 = 10_000;

/// Width of `YYYYMMDDTHHMMSS`.
const STAMP_LEN: usize = 15;

/// Leads the file name of a segment that is still being captured.
///
/// Hidden names never count as managed segments, so a capture cut short by
/// a crash is never recovered as sealed.
const PARTIAL_MARK: char = '.';

/// Identifier of a segment.
///
/// An opaque token that sorts lexicographically in creation order. Tokens
/// issued by [`SegmentNamer`] look like `20261017T093015042Z_0000`: UTC
/// time to the millisecond, then a tie-breaking sequence number. Segments
/// recovered from disk that were not named by this recorder use their file
/// stem as the token.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(String);

impl SegmentId {
    /// Wraps an existing token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `(unix_millis, sequence)` if this token was issued by a
    /// [`SegmentNamer`].
    #[must_use]
    pub fn instant(&self) -> Option<(i64, u32)> {
        let (stamp, seq) = self.0.split_once("Z_")?;
        if stamp.len() != STAMP_LEN + 3 || !stamp.is_ascii() {
            return None;
        }
        if seq.len() != 4 || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let time = NaiveDateTime::parse_from_str(&stamp[..STAMP_LEN], "%Y%m%dT%H%M%S").ok()?;
        let millis: i64 = stamp[STAMP_LEN..].parse().ok()?;
        let seq: u32 = seq.parse().ok()?;
        Some((time.and_utc().timestamp_millis() + millis, seq))
    }
}

impl fmt::Debug for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SegmentId({})", self.0)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues strictly increasing segment identifiers.
///
/// The namer remembers the last instant it issued. A call in the same
/// millisecond bumps the sequence number; a wall clock that steps backwards
/// is ignored until it catches up again. Either way, every token is greater
/// than the one before it.
///
/// Naming is pure: no I/O, no global state.
#[derive(Debug, Clone)]
pub struct SegmentNamer {
    prefix: String,
    suffix: String,
    last: Option<(i64, u32)>,
}

impl SegmentNamer {
    /// Creates a namer for files named `<prefix><token><suffix>`.
    #[must_use]
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            last: None,
        }
    }

    /// Makes every future token sort after `id`.
    ///
    /// Used after a restart with the newest recovered segment. Returns
    /// false if `id` was not issued by a namer and carries no instant.
    pub fn resume_after(&mut self, id: &SegmentId) -> bool {
        let Some(instant) = id.instant() else {
            return false;
        };
        if self.last.map_or(true, |last| instant > last) {
            self.last = Some(instant);
        }
        true
    }

    /// Returns the next identifier for a segment starting at `now`.
    pub fn next_id(&mut self, now: SystemTime) -> SegmentId {
        let now_ms = match now.duration_since(UNIX_EPOCH) {
            Ok(elapsed) => i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX - 1),
            Err(_) => 0,
        };

        let next = match self.last {
            None => (now_ms, 0),
            Some((last_ms, _)) if now_ms > last_ms => (now_ms, 0),
            Some((last_ms, last_seq)) if last_seq + 1 < SEQ_LIMIT => (last_ms, last_seq + 1),
            Some((last_ms, _)) => (last_ms + 1, 0),
        };
        self.last = Some(next);

        SegmentId(format_token(next.0, next.1))
    }

    /// Returns the file name for a segment.
    #[must_use]
    pub fn file_name(&self, id: &SegmentId) -> String {
        format!("{}{}{}", self.prefix, id, self.suffix)
    }

    /// Returns the name a segment is captured under until it is sealed.
    ///
    /// The managed suffix is kept so encoders that pick a container from
    /// the extension still work.
    #[must_use]
    pub fn partial_file_name(&self, id: &SegmentId) -> String {
        format!("{PARTIAL_MARK}{}", self.file_name(id))
    }

    /// Returns the managed suffix.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Recovers the identifier of a file found on disk.
    ///
    /// Returns `None` if the name does not carry the managed suffix or is
    /// hidden, which includes in-progress captures.
    #[must_use]
    pub fn id_from_file_name(&self, name: &str) -> Option<SegmentId> {
        if name.starts_with(PARTIAL_MARK) {
            return None;
        }
        let stem = name.strip_suffix(self.suffix.as_str())?;
        let token = stem.strip_prefix(self.prefix.as_str()).unwrap_or(stem);
        if token.is_empty() {
            return None;
        }
        Some(SegmentId::new(token))
    }

    /// Recovers the identifier of an in-progress capture left on disk.
    #[must_use]
    pub fn id_from_partial_name(&self, name: &str) -> Option<SegmentId> {
        let name = name.strip_prefix(PARTIAL_MARK)?;
        let token = name
            .strip_suffix(self.suffix.as_str())?
            .strip_prefix(self.prefix.as_str())?;
        (!token.is_empty()).then(|| SegmentId::new(token))
    }
}

fn format_token(millis: i64, seq: u32) -> String {
    let time = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default();
    format!("{}Z_{seq:04}", time.format("%Y%m%dT%H%M%S%3f"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn at(millis: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(millis)
    }

    #[test]
    fn token_format() {
        let mut namer = SegmentNamer::new("loop_", ".h264");
        // 2023-11-14T22:13:20.042Z
        let id = namer.next_id(at(1_700_000_000_042));
        assert_eq!(id.as_str(), "20231114T221320042Z_0000");
        assert_eq!(namer.file_name(&id), "loop_20231114T221320042Z_0000.h264");
        assert_eq!(id.instant(), Some((1_700_000_000_042, 0)));
    }

    #[test]
    fn same_tick_bumps_sequence() {
        let mut namer = SegmentNamer::new("", ".h264");
        let a = namer.next_id(at(5_000));
        let b = namer.next_id(at(5_000));
        let c = namer.next_id(at(5_001));

        assert!(a < b);
        assert!(b < c);
        assert_eq!(b.instant(), Some((5_000, 1)));
        assert_eq!(c.instant(), Some((5_001, 0)));
    }

    #[test]
    fn clock_going_backwards_still_increases() {
        let mut namer = SegmentNamer::new("", ".h264");
        let a = namer.next_id(at(10_000));
        let b = namer.next_id(at(2_000));
        assert!(a < b);
        assert_eq!(b.instant(), Some((10_000, 1)));
    }

    #[test]
    fn sequence_overflow_advances_clock() {
        let mut namer = SegmentNamer::new("", ".h264");
        namer.resume_after(&SegmentId::new(format_token(7_000, SEQ_LIMIT - 1)));

        let id = namer.next_id(at(7_000));
        assert_eq!(id.instant(), Some((7_001, 0)));
    }

    #[test]
    fn resume_after_recovered_segment() {
        let mut namer = SegmentNamer::new("loop_", ".h264");
        let recovered = SegmentId::new("20231114T221320042Z_0003");
        assert!(namer.resume_after(&recovered));

        // Clock reads earlier than the recovered segment
        let id = namer.next_id(at(1_600_000_000_000));
        assert!(id > recovered);

        assert!(!namer.resume_after(&SegmentId::new("seg_0001")));
    }

    #[test]
    fn file_name_recovery() {
        let namer = SegmentNamer::new("loop_", ".h264");
        assert_eq!(
            namer.id_from_file_name("loop_20231114T221320042Z_0000.h264"),
            Some(SegmentId::new("20231114T221320042Z_0000"))
        );
        assert_eq!(
            namer.id_from_file_name("seg_0001.h264"),
            Some(SegmentId::new("seg_0001"))
        );
        assert_eq!(namer.id_from_file_name("notes.txt"), None);
        assert_eq!(namer.id_from_file_name("loop_.h264"), None);
    }

    #[test]
    fn partial_names_are_never_segments() {
        let namer = SegmentNamer::new("loop_", ".h264");
        let id = SegmentId::new("20231114T221320042Z_0000");
        let partial = namer.partial_file_name(&id);

        assert_eq!(partial, ".loop_20231114T221320042Z_0000.h264");
        assert!(partial.ends_with(namer.suffix()));
        assert_eq!(namer.id_from_file_name(&partial), None);
        assert_eq!(namer.id_from_partial_name(&partial), Some(id.clone()));
        assert_eq!(namer.id_from_partial_name(&namer.file_name(&id)), None);
        assert_eq!(namer.id_from_partial_name(".hidden.h264"), None);
    }

    #[test]
    fn foreign_tokens_have_no_instant() {
        assert_eq!(SegmentId::new("seg_0001").instant(), None);
        assert_eq!(SegmentId::new("dashcam_20240101_120000").instant(), None);
        assert_eq!(SegmentId::new("20231114T221320042Z_00x0").instant(), None);
    }

    proptest! {
        #[test]
        fn ids_strictly_increase(steps in proptest::collection::vec(0u64..5_000, 1..200)) {
            // Arbitrary clock readings, including repeats and jumps backwards
            let mut namer = SegmentNamer::new("loop_", ".h264");
            let mut previous: Option<SegmentId> = None;
            for millis in steps {
                let id = namer.next_id(at(1_700_000_000_000 + millis));
                if let Some(prev) = &previous {
                    prop_assert!(*prev < id, "{} !< {}", prev, id);
                }
                previous = Some(id);
            }
        }
    }
}
