//! # LoopRec Storage
//!
//! Storage volume trait and implementations for LoopRec.
//!
//! This crate provides the lowest-level view of the disk a loop recorder
//! writes to. A volume answers exactly the questions retention needs:
//!
//! - how much space is free right now (never cached)
//! - which managed files exist, oldest first
//! - how large a file is
//! - remove this file
//! - move this file to its final name
//!
//! Volumes know nothing about segment names, recording state or thresholds.
//! LoopRec core owns all of that.
//!
//! ## Available Volumes
//!
//! - [`DiskVolume`] - A directory on a mounted filesystem
//! - [`MemoryVolume`] - A simulated volume with a fixed capacity, for tests
//!
//! ## Example
//!
//! ```rust
//! use looprec_storage::{MemoryVolume, Volume};
//!
//! let volume = MemoryVolume::new("/media/cam", 1_000);
//! volume.insert_file("a.h264", 100);
//! assert_eq!(volume.free_space().unwrap(), 900);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod disk;
mod error;
mod memory;
mod volume;

pub use disk::DiskVolume;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryVolume;
pub use volume::{sort_oldest_first, FileEntry, Volume};
