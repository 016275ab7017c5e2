//! Filesystem capability surface consumed by the storage layers.
//!
//! Every higher layer (CAS, repository core, workspace operations) goes
//! through the [`FileSystem`] trait instead of `std::fs`, so the whole stack
//! can run against the real filesystem ([`OsFileSystem`]) or against an
//! in-memory tree ([`MemoryFs`]) in tests.
//!
//! All trait methods report failures as [`FridgeError::Io`] carrying the
//! POSIX error kind and the offending path.

pub mod local;
pub mod memory;

use std::{
    io::{Read, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::errors::FridgeError;

pub use local::OsFileSystem;
pub use memory::MemoryFs;

/// File metadata as captured in snapshots: the full `st_mode` (file type
/// bits plus permission bits), size in bytes, and access/modification times
/// in seconds since the epoch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileStatus {
    pub mode: u32,
    pub size: u64,
    pub atime: f64,
    pub mtime: f64,
}

/// Capability surface over a host filesystem.
///
/// Handles returned by `open_read`/`open_write` release their resources when
/// dropped; writers additionally commit buffered content on `flush`.
pub trait FileSystem {
    /// Create a single directory. Fails if it already exists or the parent
    /// is missing.
    fn mkdir(&self, path: &Path) -> Result<(), FridgeError>;

    /// Create a directory chain. Fails with `AlreadyExists` if the full
    /// path is already present.
    fn makedirs(&self, path: &Path) -> Result<(), FridgeError>;

    /// Open a file for reading.
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read>, FridgeError>;

    /// Open a file for writing, truncating existing content. Fails with
    /// `PermissionDenied` when the target is write-protected.
    fn open_write(&self, path: &Path) -> Result<Box<dyn Write>, FridgeError>;

    /// Rename within the filesystem. Fails if `dst` already exists.
    fn rename(&self, src: &Path, dst: &Path) -> Result<(), FridgeError>;

    /// Remove a file. Fails if it is missing.
    fn unlink(&self, path: &Path) -> Result<(), FridgeError>;

    /// Replace the permission bits, keeping the file type bits.
    fn chmod(&self, path: &Path, mode: u32) -> Result<(), FridgeError>;

    /// Set access and modification times, in seconds since the epoch.
    fn utime(&self, path: &Path, atime: f64, mtime: f64) -> Result<(), FridgeError>;

    /// Return mode, size and times for a path.
    fn stat(&self, path: &Path) -> Result<FileStatus, FridgeError>;

    /// Preferred I/O block size for the filesystem holding `path`, when the
    /// host reports one. Callers fall back to
    /// [`crate::hash::FALLBACK_READ_SIZE`].
    fn block_size(&self, path: &Path) -> Option<usize>;

    /// Presence check.
    fn exists(&self, path: &Path) -> bool;

    /// Whether two paths name the same underlying file.
    fn samefile(&self, a: &Path, b: &Path) -> Result<bool, FridgeError>;

    /// Copy file content. The destination mode is not taken from the source.
    fn copy(&self, src: &Path, dst: &Path) -> Result<(), FridgeError>;

    /// Create a link at `link` pointing at `src`.
    fn symlink(&self, src: &Path, link: &Path) -> Result<(), FridgeError>;

    /// Names of the subdirectories and files directly under `path`, each
    /// sorted ascending.
    fn list_dir(&self, path: &Path) -> Result<(Vec<String>, Vec<String>), FridgeError>;

    /// Walk the tree rooted at `path` top-down. The visitor receives the
    /// directory path, its subdirectory names and its file names; removing
    /// entries from the subdirectory list prunes descent into them.
    fn walk(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&Path, &mut Vec<String>, &[String]) -> Result<(), FridgeError>,
    ) -> Result<(), FridgeError> {
        let (mut subdirs, files) = self.list_dir(path)?;
        visit(path, &mut subdirs, &files)?;
        for name in subdirs {
            self.walk(&path.join(name), visit)?;
        }
        Ok(())
    }
}

/// Read a whole file into memory.
pub fn read_file(fs: &dyn FileSystem, path: &Path) -> Result<Vec<u8>, FridgeError> {
    let mut reader = fs.open_read(path)?;
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|e| FridgeError::io(path, e))?;
    Ok(buf)
}

/// Read a whole file as UTF-8 text.
pub fn read_file_text(fs: &dyn FileSystem, path: &Path) -> Result<String, FridgeError> {
    String::from_utf8(read_file(fs, path)?).map_err(|_| {
        FridgeError::Deserialization(format!("{} is not valid UTF-8", path.display()))
    })
}

/// Write `data` to `path`, truncating existing content.
pub fn write_file(fs: &dyn FileSystem, path: &Path, data: &[u8]) -> Result<(), FridgeError> {
    let mut writer = fs.open_write(path)?;
    writer
        .write_all(data)
        .and_then(|()| writer.flush())
        .map_err(|e| FridgeError::io(path, e))
}
