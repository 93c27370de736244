//! Directory-backed volume for real filesystems.

use crate::error::{StorageError, StorageResult};
use crate::volume::{sort_oldest_first, FileEntry, Volume};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// A volume rooted at a directory on a mounted filesystem.
///
/// Space figures come from the filesystem the directory lives on, so they
/// include files written by other processes.
///
/// # Durability
///
/// After a file is removed or renamed the root directory is fsynced on Unix
/// so the change survives a power cut.
///
/// # Example
///
/// ```no_run
/// use looprec_storage::{DiskVolume, Volume};
/// use std::path::Path;
///
/// let volume = DiskVolume::open(Path::new("/media/sd/dashcam")).unwrap();
/// println!("{} bytes free", volume.free_space().unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct DiskVolume {
    root: PathBuf,
}

impl DiskVolume {
    /// Opens a volume rooted at an existing directory.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the path is missing or not a directory.
    pub fn open(root: &Path) -> StorageResult<Self> {
        let volume = Self {
            root: root.to_path_buf(),
        };
        volume.check_reachable()?;
        Ok(volume)
    }

    /// Opens a volume, creating the root directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open_with_create_dirs(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Self::open(root)
    }

    fn check_reachable(&self) -> StorageResult<()> {
        match fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StorageError::unavailable(&self.root, "not a directory")),
            Err(e) => Err(StorageError::unavailable(&self.root, e)),
        }
    }

    #[cfg(unix)]
    fn sync_root(&self) -> StorageResult<()> {
        File::open(&self.root)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_root(&self) -> StorageResult<()> {
        // NTFS journals metadata; directories cannot be fsynced there
        Ok(())
    }
}

impl Volume for DiskVolume {
    fn root(&self) -> &Path {
        &self.root
    }

    fn free_space(&self) -> StorageResult<u64> {
        self.check_reachable()?;
        fs2::available_space(&self.root).map_err(|e| StorageError::unavailable(&self.root, e))
    }

    fn total_space(&self) -> StorageResult<u64> {
        self.check_reachable()?;
        fs2::total_space(&self.root).map_err(|e| StorageError::unavailable(&self.root, e))
    }

    fn list_files(&self, suffix: &str) -> StorageResult<Vec<FileEntry>> {
        let dir = fs::read_dir(&self.root).map_err(|e| StorageError::unavailable(&self.root, e))?;

        let mut entries = Vec::new();
        for item in dir {
            let item = item?;
            let name = item.file_name().to_string_lossy().into_owned();
            if name.len() <= suffix.len() || !name.ends_with(suffix) {
                continue;
            }

            // Files can vanish between readdir and stat
            let meta = match item.metadata() {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !meta.is_file() {
                continue;
            }

            let created = meta.created().or_else(|_| meta.modified())?;
            entries.push(FileEntry {
                path: item.path(),
                name,
                size: meta.len(),
                created,
            });
        }

        sort_oldest_first(&mut entries);
        Ok(entries)
    }

    fn file_size(&self, path: &Path) -> StorageResult<u64> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove_file(&self, path: &Path) -> StorageResult<()> {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(StorageError::RemoveDenied {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }

        self.sync_root()
    }

    fn rename_file(&self, from: &Path, to: &Path) -> StorageResult<()> {
        if to.exists() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", to.display()),
            )));
        }
        match fs::rename(from, to) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.check_reachable()?;
                return Err(StorageError::NotFound {
                    path: from.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        self.sync_root()
    }
}
