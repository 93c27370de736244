//! Storage volume trait definition.

use crate::error::StorageResult;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A file found on a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Full path of the file.
    pub path: PathBuf,
    /// File name without the directory.
    pub name: String,
    /// Size in bytes at listing time.
    pub size: u64,
    /// Creation time, or modification time where the platform does not
    /// record creation.
    pub created: SystemTime,
}

/// The volume a loop recorder writes segments to.
///
/// Volumes are **measurement and deletion primitives**. They do not
/// interpret file names and do not track recording state. The filesystem
/// is the source of truth, so nothing here may cache space figures.
///
/// # Invariants
///
/// - `free_space` re-queries the volume on every call
/// - `list_files` returns entries oldest first (see [`sort_oldest_first`])
/// - an unreachable volume yields [`crate::StorageError::Unavailable`]
///   from `free_space`, `total_space` and `list_files`
/// - volumes must be `Send + Sync` so a background retention pass can share
///   them with the recording loop
///
/// # Implementors
///
/// - [`super::DiskVolume`] - For real directories
/// - [`super::MemoryVolume`] - For testing
pub trait Volume: Send + Sync {
    /// Returns the directory segments live in.
    fn root(&self) -> &Path;

    /// Returns the bytes currently available to this process.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the volume cannot be reached.
    fn free_space(&self) -> StorageResult<u64>;

    /// Returns the total size of the volume in bytes.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the volume cannot be reached.
    fn total_space(&self) -> StorageResult<u64>;

    /// Lists regular files in the root whose name ends with `suffix`,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the root cannot be read.
    fn list_files(&self, suffix: &str) -> StorageResult<Vec<FileEntry>>;

    /// Returns the current size of a file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    fn file_size(&self, path: &Path) -> StorageResult<u64>;

    /// Returns true if a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Permanently removes a file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file is already gone, `RemoveDenied` or
    /// `Io` if it cannot be deleted.
    fn remove_file(&self, path: &Path) -> StorageResult<()>;

    /// Moves a file to a new name within the volume, replacing nothing.
    ///
    /// The move is durable when this returns.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `from` does not exist, `Unavailable` if the
    /// volume cannot be reached, `Io` for any other failure.
    fn rename_file(&self, from: &Path, to: &Path) -> StorageResult<()>;
}

/// Sorts entries by creation time, breaking ties by name.
///
/// Name tie-breaking keeps the order stable on filesystems with coarse
/// timestamps, where several files can share one creation instant.
pub fn sort_oldest_first(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));
}
