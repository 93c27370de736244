//! Space-bounded eviction.

use crate::error::{CoreError, CoreResult};
use crate::retention::set::RetentionSet;
use crate::segment::SegmentId;
use looprec_storage::Volume;
use tracing::{debug, info, warn};

/// Outcome of a successful retention pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    /// Segments deleted, oldest first.
    pub evicted: Vec<SegmentId>,
    /// Segments dropped from the index because their file could not be
    /// deleted.
    pub failed: Vec<SegmentId>,
    /// Bytes the evicted segments occupied.
    pub freed_bytes: u64,
    /// Free space measured after the pass.
    pub free_bytes: u64,
}

impl RetentionReport {
    /// Returns the number of segments deleted.
    #[must_use]
    pub fn evicted_count(&self) -> usize {
        self.evicted.len()
    }
}

/// What a retention pass would do, computed without touching the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionPlan {
    /// Segments that would be deleted, oldest first.
    pub evict: Vec<SegmentId>,
    /// Free space expected afterwards.
    pub projected_free_bytes: u64,
    /// Whether the threshold would be met.
    pub satisfied: bool,
}

/// Deletes the oldest sealed segments until the volume has enough room.
///
/// # Algorithm
///
/// While free space is below the threshold:
///
/// 1. If the set is empty, give up with `InsufficientSpace`.
/// 2. Pop the oldest segment and delete its file.
/// 3. If the delete fails, log it and drop the entry anyway. A file that
///    cannot be removed must not wedge the loop.
/// 4. Measure free space again.
///
/// Free space is re-measured after every single deletion, so no more
/// segments are deleted than necessary.
#[derive(Debug, Clone, Copy)]
pub struct RetentionManager {
    threshold_bytes: u64,
}

impl RetentionManager {
    /// Creates a manager keeping at least `threshold_bytes` free.
    #[must_use]
    pub const fn new(threshold_bytes: u64) -> Self {
        Self { threshold_bytes }
    }

    /// Returns the configured threshold.
    #[must_use]
    pub const fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    /// Evicts oldest-first until the volume clears the threshold.
    ///
    /// Calling this when there is already enough room deletes nothing.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the volume cannot be measured
    /// - `InsufficientSpace` if the set ran dry before the threshold was met
    pub fn ensure_capacity<V: Volume + ?Sized>(
        &self,
        volume: &V,
        set: &mut RetentionSet,
    ) -> CoreResult<RetentionReport> {
        let mut report = RetentionReport::default();
        let mut free = volume.free_space()?;
        debug!(
            free_bytes = free,
            threshold_bytes = self.threshold_bytes,
            retained = set.len(),
            "checking capacity"
        );

        while free < self.threshold_bytes {
            let Some(mut segment) = set.pop_oldest() else {
                warn!(
                    free_bytes = free,
                    threshold_bytes = self.threshold_bytes,
                    evicted = report.evicted.len(),
                    "nothing left to evict"
                );
                return Err(CoreError::InsufficientSpace {
                    evicted: report.evicted.len(),
                    free_bytes: free,
                    threshold_bytes: self.threshold_bytes,
                });
            };

            match volume.remove_file(segment.path()) {
                Ok(()) => {
                    segment.mark_evicted();
                    let size = segment.size_bytes().unwrap_or(0);
                    info!(
                        segment = %segment.id(),
                        size_bytes = size,
                        "evicted segment"
                    );
                    report.freed_bytes += size;
                    report.evicted.push(segment.id().clone());
                }
                Err(err) if err.is_unavailable() => {
                    // The media went away mid-pass; the entry is still valid
                    if let Err(segment) = set.insert(segment) {
                        debug!(segment = %segment.id(), "could not restore segment to index");
                    }
                    return Err(err.into());
                }
                Err(err) => {
                    let failure = CoreError::EvictionFailed {
                        path: segment.path().to_path_buf(),
                        reason: err.to_string(),
                    };
                    warn!(segment = %segment.id(), error = %failure, "dropping segment from index");
                    report.failed.push(segment.id().clone());
                }
            }

            free = volume.free_space()?;
        }

        report.free_bytes = free;
        Ok(report)
    }

    /// Predicts which segments a pass would evict if the volume currently
    /// had `free_bytes` free and every deletion freed exactly the segment's
    /// recorded size.
    #[must_use]
    pub fn plan(&self, free_bytes: u64, set: &RetentionSet) -> EvictionPlan {
        let mut projected = free_bytes;
        let mut evict = Vec::new();

        for segment in set.iter() {
            if projected >= self.threshold_bytes {
                break;
            }
            projected = projected.saturating_add(segment.size_bytes().unwrap_or(0));
            evict.push(segment.id().clone());
        }

        EvictionPlan {
            evict,
            projected_free_bytes: projected,
            satisfied: projected >= self.threshold_bytes,
        }
    }
}
