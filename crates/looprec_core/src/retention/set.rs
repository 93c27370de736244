//! The ordered index of sealed segments.

use crate::error::CoreResult;
use crate::segment::{Segment, SegmentId, SegmentNamer, SegmentState};
use looprec_storage::Volume;
use std::collections::VecDeque;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Sealed segments ordered oldest first.
///
/// The set only ever holds `Sealed` segments. The segment being recorded is
/// inserted after it is sealed, so it can never be picked for eviction.
/// Order is by creation time, ties broken by id.
#[derive(Debug, Default)]
pub struct RetentionSet {
    segments: VecDeque<Segment>,
}

impl RetentionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the set from the managed files on a volume.
    ///
    /// Every file carrying the namer's suffix becomes a sealed segment, in
    /// creation order. This is the only recovery path: segment files and
    /// their timestamps are the durable record.
    ///
    /// In-progress captures left by a crash or kept after a failure are
    /// logged and left alone. They are never sealed and never evicted.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the volume cannot be listed.
    pub fn rebuild<V: Volume + ?Sized>(volume: &V, namer: &SegmentNamer) -> CoreResult<Self> {
        let mut set = Self::new();
        for entry in volume.list_files(namer.suffix())? {
            let Some(id) = namer.id_from_file_name(&entry.name) else {
                if let Some(id) = namer.id_from_partial_name(&entry.name) {
                    warn!(
                        segment = %id,
                        path = %entry.path.display(),
                        "leaving unfinished segment out of retention"
                    );
                }
                continue;
            };
            let segment = Segment::sealed(id, entry.path, entry.created, entry.size);
            if let Err(rejected) = set.insert(segment) {
                debug!(segment = %rejected.id(), "skipping duplicate segment id on disk");
            }
        }
        Ok(set)
    }

    /// Inserts a sealed segment at its place in creation order.
    ///
    /// # Errors
    ///
    /// Hands the segment back if it is not sealed or its id is already
    /// present.
    pub fn insert(&mut self, segment: Segment) -> Result<(), Segment> {
        if segment.state() != SegmentState::Sealed || self.contains(segment.id()) {
            return Err(segment);
        }
        let key = Self::order_key(&segment);
        let at = self
            .segments
            .partition_point(|existing| Self::order_key(existing) <= key);
        self.segments.insert(at, segment);
        Ok(())
    }

    /// Returns the oldest segment without removing it.
    #[must_use]
    pub fn oldest(&self) -> Option<&Segment> {
        self.segments.front()
    }

    /// Returns the newest segment.
    #[must_use]
    pub fn newest(&self) -> Option<&Segment> {
        self.segments.back()
    }

    /// Removes the oldest segment. Eviction only ever takes from here.
    pub(crate) fn pop_oldest(&mut self) -> Option<Segment> {
        self.segments.pop_front()
    }

    /// Returns true if a segment with `id` is present.
    #[must_use]
    pub fn contains(&self, id: &SegmentId) -> bool {
        self.segments.iter().any(|s| s.id() == id)
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if there is nothing left to evict.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the summed size of all segments.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.segments.iter().filter_map(Segment::size_bytes).sum()
    }

    /// Iterates oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    fn order_key(segment: &Segment) -> (SystemTime, &SegmentId) {
        (segment.created_at(), segment.id())
    }
}
