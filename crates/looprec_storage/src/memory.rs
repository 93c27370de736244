//! In-memory volume for testing.

use crate::error::{StorageError, StorageResult};
use crate::volume::{sort_oldest_first, FileEntry, Volume};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// A simulated volume with a fixed capacity.
///
/// Free space is derived from the files it holds, so removing a file
/// immediately frees its bytes, just like a real disk. This makes retention
/// scenarios ("480 MB free, evict the 50 MB clip, now 530 MB free")
/// deterministic.
///
/// Creation times come from an internal clock that advances one second per
/// inserted file unless an explicit time is given.
///
/// # Thread Safety
///
/// This volume is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use looprec_storage::{MemoryVolume, Volume};
///
/// let volume = MemoryVolume::new("/cam", 1_000);
/// let path = volume.insert_file("a.h264", 400);
/// volume.set_external_usage(100);
/// assert_eq!(volume.free_space().unwrap(), 500);
///
/// volume.remove_file(&path).unwrap();
/// assert_eq!(volume.free_space().unwrap(), 900);
/// ```
#[derive(Debug)]
pub struct MemoryVolume {
    root: PathBuf,
    total: u64,
    state: RwLock<MemoryState>,
}

#[derive(Debug)]
struct MemoryState {
    files: BTreeMap<PathBuf, MemoryFile>,
    external_usage: u64,
    unavailable: bool,
    stuck: HashSet<PathBuf>,
    clock: SystemTime,
    removals: u64,
}

#[derive(Debug, Clone, Copy)]
struct MemoryFile {
    size: u64,
    created: SystemTime,
}

impl MemoryVolume {
    /// Creates an empty volume of `total` bytes rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, total: u64) -> Self {
        Self {
            root: root.into(),
            total,
            state: RwLock::new(MemoryState {
                files: BTreeMap::new(),
                external_usage: 0,
                unavailable: false,
                stuck: HashSet::new(),
                clock: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
                removals: 0,
            }),
        }
    }

    /// Sets bytes consumed by data this recorder does not manage.
    pub fn set_external_usage(&self, bytes: u64) {
        self.state.write().external_usage = bytes;
    }

    /// Adjusts external usage so that free space is exactly `free` bytes.
    ///
    /// Useful for setting up threshold scenarios after files are in place.
    pub fn set_free_space(&self, free: u64) {
        let mut state = self.state.write();
        let used: u64 = state.files.values().map(|f| f.size).sum();
        state.external_usage = self.total.saturating_sub(used).saturating_sub(free);
    }

    /// Adds a file stamped with the next tick of the internal clock.
    pub fn insert_file(&self, name: &str, size: u64) -> PathBuf {
        let mut state = self.state.write();
        state.clock += Duration::from_secs(1);
        let created = state.clock;
        let path = self.root.join(name);
        state.files.insert(path.clone(), MemoryFile { size, created });
        path
    }

    /// Adds a file with an explicit creation time.
    pub fn insert_file_at(&self, name: &str, size: u64, created: SystemTime) -> PathBuf {
        let path = self.root.join(name);
        self.state
            .write()
            .files
            .insert(path.clone(), MemoryFile { size, created });
        path
    }

    /// Creates or resizes the file at `path`, keeping its creation time if
    /// it already exists.
    pub fn write_file(&self, path: &Path, size: u64) {
        let mut state = self.state.write();
        if let Some(file) = state.files.get_mut(path) {
            file.size = size;
            return;
        }
        state.clock += Duration::from_secs(1);
        let created = state.clock;
        state
            .files
            .insert(path.to_path_buf(), MemoryFile { size, created });
    }

    /// Simulates unmounting (or remounting) the media.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unavailable = unavailable;
    }

    /// Makes every removal of `path` fail, like a read-only file.
    pub fn refuse_removal(&self, path: &Path) {
        self.state.write().stuck.insert(path.to_path_buf());
    }

    /// Returns the names of all files, oldest first.
    #[must_use]
    pub fn file_names(&self) -> Vec<String> {
        let state = self.state.read();
        let mut entries = Self::entries(&state, "");
        sort_oldest_first(&mut entries);
        entries.into_iter().map(|e| e.name).collect()
    }

    /// Returns how many files have been removed so far.
    #[must_use]
    pub fn removals(&self) -> u64 {
        self.state.read().removals
    }

    fn entries(state: &MemoryState, suffix: &str) -> Vec<FileEntry> {
        state
            .files
            .iter()
            .filter_map(|(path, file)| {
                let name = path.file_name()?.to_string_lossy().into_owned();
                (name.len() > suffix.len() && name.ends_with(suffix)).then(|| FileEntry {
                    path: path.clone(),
                    name,
                    size: file.size,
                    created: file.created,
                })
            })
            .collect()
    }

    fn check_reachable(&self, state: &MemoryState) -> StorageResult<()> {
        if state.unavailable {
            return Err(StorageError::unavailable(&self.root, "media not mounted"));
        }
        Ok(())
    }
}

impl Volume for MemoryVolume {
    fn root(&self) -> &Path {
        &self.root
    }

    fn free_space(&self) -> StorageResult<u64> {
        let state = self.state.read();
        self.check_reachable(&state)?;
        let used: u64 = state.files.values().map(|f| f.size).sum();
        Ok(self
            .total
            .saturating_sub(used)
            .saturating_sub(state.external_usage))
    }

    fn total_space(&self) -> StorageResult<u64> {
        let state = self.state.read();
        self.check_reachable(&state)?;
        Ok(self.total)
    }

    fn list_files(&self, suffix: &str) -> StorageResult<Vec<FileEntry>> {
        let state = self.state.read();
        self.check_reachable(&state)?;
        let mut entries = Self::entries(&state, suffix);
        sort_oldest_first(&mut entries);
        Ok(entries)
    }

    fn file_size(&self, path: &Path) -> StorageResult<u64> {
        self.state
            .read()
            .files
            .get(path)
            .map(|f| f.size)
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn exists(&self, path: &Path) -> bool {
        self.state.read().files.contains_key(path)
    }

    fn remove_file(&self, path: &Path) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.stuck.contains(path) {
            return Err(StorageError::RemoveDenied {
                path: path.to_path_buf(),
                reason: "permission denied".into(),
            });
        }
        if state.files.remove(path).is_none() {
            return Err(StorageError::NotFound {
                path: path.to_path_buf(),
            });
        }
        state.removals += 1;
        Ok(())
    }

    fn rename_file(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let mut state = self.state.write();
        self.check_reachable(&state)?;
        if state.files.contains_key(to) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", to.display()),
            )));
        }
        let file = state.files.remove(from).ok_or_else(|| StorageError::NotFound {
            path: from.to_path_buf(),
        })?;
        state.files.insert(to.to_path_buf(), file);
        Ok(())
    }
}
