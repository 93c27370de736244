//! Recording volume directory management.
//!
//! Layout of a volume:
//!
//! ```text
//! <volume_path>/
//! ├─ .looprec.lock                       # Advisory lock for single-writer
//! ├─ loop_20240101T080000000Z_0000.h264  # Sealed segments
//! └─ ...
//! ```
//!
//! The lock file ensures only one recorder evicts from and writes into a
//! volume at a time. Segment files and their creation timestamps are the
//! only persisted state.

use crate::error::{CoreError, CoreResult};
use crate::retention::RetentionSet;
use crate::segment::{SegmentId, SegmentNamer};
use fs2::FileExt;
use looprec_storage::DiskVolume;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Name of the lock file inside the volume directory.
pub const LOCK_FILE: &str = ".looprec.lock";

/// State recovered from the segment files of a volume.
#[derive(Debug)]
pub struct Recovered {
    /// Sealed segments found on disk, oldest first.
    pub set: RetentionSet,
    /// Newest id that carries a namer timestamp, used to seed a namer.
    pub newest_id: Option<SegmentId>,
}

/// An exclusively locked recording volume.
///
/// The lock is released when the `VolumeDir` is dropped.
///
/// # Example
///
/// ```rust,ignore
/// let dir = VolumeDir::open(Path::new("/mnt/sd/dashcam"), true)?;
/// let orchestrator = Orchestrator::new(config, dir.volume(), source)?;
/// ```
#[derive(Debug)]
pub struct VolumeDir {
    path: PathBuf,
    volume: Arc<DiskVolume>,
    _lock_file: File,
}

impl VolumeDir {
    /// Opens or creates a volume directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the directory is missing and
    ///   `create_if_missing` is false, or the path is not a directory
    /// - `VolumeLocked` if another recorder holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
                info!(path = %path.display(), "created volume directory");
            } else {
                return Err(CoreError::StorageUnavailable {
                    path: path.to_path_buf(),
                    reason: "directory does not exist".to_string(),
                });
            }
        }

        if !path.is_dir() {
            return Err(CoreError::StorageUnavailable {
                path: path.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::VolumeLocked {
                path: path.to_path_buf(),
            });
        }

        let volume = DiskVolume::open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            volume: Arc::new(volume),
            _lock_file: lock_file,
        })
    }

    /// Returns the volume directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the disk volume rooted at this directory.
    #[must_use]
    pub fn volume(&self) -> Arc<DiskVolume> {
        Arc::clone(&self.volume)
    }

    /// Returns where a segment with `id` lives.
    #[must_use]
    pub fn segment_path(&self, namer: &SegmentNamer, id: &SegmentId) -> PathBuf {
        self.path.join(namer.file_name(id))
    }

    /// Rebuilds the retention set from the files on disk.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the directory cannot be listed.
    pub fn recover(&self, namer: &SegmentNamer) -> CoreResult<Recovered> {
        let set = RetentionSet::rebuild(&*self.volume, namer)?;
        let newest_id = newest_issued_id(&set);
        Ok(Recovered { set, newest_id })
    }
}

/// Returns the id with the latest namer timestamp in `set`.
///
/// Creation order and id order can disagree after clock adjustments, so
/// this looks at every id rather than the newest segment.
pub(crate) fn newest_issued_id(set: &RetentionSet) -> Option<SegmentId> {
    set.iter()
        .filter_map(|segment| segment.id().instant().map(|at| (at, segment.id())))
        .max_by_key(|(at, _)| *at)
        .map(|(_, id)| id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::tempdir;

    #[test]
    fn create_new_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("videos");

        let dir = VolumeDir::open(&path, true).unwrap();
        assert!(path.is_dir());
        assert!(path.join(LOCK_FILE).exists());
        assert_eq!(dir.path(), path);
    }

    #[test]
    fn missing_directory_without_create() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing");

        let err = VolumeDir::open(&path, false).unwrap_err();
        assert!(matches!(err, CoreError::StorageUnavailable { .. }));
    }

    #[test]
    fn file_is_not_a_volume() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("plain");
        fs::write(&path, b"x").unwrap();

        let err = VolumeDir::open(&path, true).unwrap_err();
        assert!(matches!(err, CoreError::StorageUnavailable { .. }));
    }

    #[test]
    fn lock_prevents_second_recorder() {
        let temp = tempdir().unwrap();

        let _first = VolumeDir::open(temp.path(), true).unwrap();
        let err = VolumeDir::open(temp.path(), true).unwrap_err();
        assert!(matches!(err, CoreError::VolumeLocked { .. }));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();

        {
            let _dir = VolumeDir::open(temp.path(), true).unwrap();
        }
        assert!(VolumeDir::open(temp.path(), true).is_ok());
    }

    #[test]
    fn recover_ignores_lock_and_foreign_files() {
        let temp = tempdir().unwrap();
        let dir = VolumeDir::open(temp.path(), true).unwrap();
        let mut namer = SegmentNamer::new("loop_", ".h264");

        let first = namer.next_id(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let second = namer.next_id(UNIX_EPOCH + Duration::from_secs(1_700_000_300));
        fs::write(dir.segment_path(&namer, &first), vec![0u8; 10]).unwrap();
        fs::write(dir.segment_path(&namer, &second), vec![0u8; 20]).unwrap();
        fs::write(temp.path().join("notes.txt"), b"hello").unwrap();

        let recovered = dir.recover(&namer).unwrap();
        assert_eq!(recovered.set.len(), 2);
        assert_eq!(recovered.set.total_bytes(), 30);
        assert_eq!(recovered.newest_id, Some(second));
    }
}
