//! Real-filesystem adapter built on `std::fs`, with `libc` filling the gaps
//! std leaves open (`statvfs`, path-based `utimensat`).

use std::{
    ffi::CString,
    fs,
    io::{self, Read, Write},
    os::unix::{
        ffi::OsStrExt,
        fs::{MetadataExt, PermissionsExt},
    },
    path::Path,
};

use super::{FileStatus, FileSystem};
use crate::errors::FridgeError;

/// [`FileSystem`] implementation backed by the host filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsFileSystem;

impl OsFileSystem {
    pub fn new() -> OsFileSystem {
        OsFileSystem
    }
}

fn c_path(path: &Path) -> Result<CString, FridgeError> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        FridgeError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"),
        )
    })
}

fn timespec(seconds: f64) -> libc::timespec {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as i64;
    libc::timespec {
        tv_sec: whole as libc::time_t,
        tv_nsec: nanos.min(999_999_999) as _,
    }
}

impl FileSystem for OsFileSystem {
    fn mkdir(&self, path: &Path) -> Result<(), FridgeError> {
        fs::create_dir(path).map_err(|e| FridgeError::io(path, e))
    }

    fn makedirs(&self, path: &Path) -> Result<(), FridgeError> {
        if path.exists() {
            return Err(FridgeError::io(
                path,
                io::Error::from(io::ErrorKind::AlreadyExists),
            ));
        }
        fs::create_dir_all(path).map_err(|e| FridgeError::io(path, e))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read>, FridgeError> {
        let file = fs::File::open(path).map_err(|e| FridgeError::io(path, e))?;
        Ok(Box::new(file))
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn Write>, FridgeError> {
        let file = fs::File::create(path).map_err(|e| FridgeError::io(path, e))?;
        Ok(Box::new(file))
    }

    fn rename(&self, src: &Path, dst: &Path) -> Result<(), FridgeError> {
        if dst.exists() {
            return Err(FridgeError::io(
                dst,
                io::Error::from(io::ErrorKind::AlreadyExists),
            ));
        }
        fs::rename(src, dst).map_err(|e| FridgeError::io(src, e))
    }

    fn unlink(&self, path: &Path) -> Result<(), FridgeError> {
        fs::remove_file(path).map_err(|e| FridgeError::io(path, e))
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<(), FridgeError> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|e| FridgeError::io(path, e))
    }

    fn utime(&self, path: &Path, atime: f64, mtime: f64) -> Result<(), FridgeError> {
        let c = c_path(path)?;
        let times = [timespec(atime), timespec(mtime)];
        let rc = unsafe { libc::utimensat(libc::AT_FDCWD, c.as_ptr(), times.as_ptr(), 0) };
        if rc == 0 {
            Ok(())
        } else {
            Err(FridgeError::io(path, io::Error::last_os_error()))
        }
    }

    fn stat(&self, path: &Path) -> Result<FileStatus, FridgeError> {
        let md = fs::metadata(path).map_err(|e| FridgeError::io(path, e))?;
        Ok(FileStatus {
            mode: md.mode(),
            size: md.size(),
            atime: md.atime() as f64 + md.atime_nsec() as f64 / 1e9,
            mtime: md.mtime() as f64 + md.mtime_nsec() as f64 / 1e9,
        })
    }

    fn block_size(&self, path: &Path) -> Option<usize> {
        let c = c_path(path).ok()?;
        let mut out: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c.as_ptr(), &mut out) };
        (rc == 0 && out.f_frsize > 0).then(|| out.f_frsize as usize)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn samefile(&self, a: &Path, b: &Path) -> Result<bool, FridgeError> {
        let ma = fs::metadata(a).map_err(|e| FridgeError::io(a, e))?;
        let mb = fs::metadata(b).map_err(|e| FridgeError::io(b, e))?;
        Ok(ma.dev() == mb.dev() && ma.ino() == mb.ino())
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<(), FridgeError> {
        // std::fs::copy would carry the source permission bits over; the
        // destination mode is the caller's business.
        let mut from = fs::File::open(src).map_err(|e| FridgeError::io(src, e))?;
        let mut to = fs::File::create(dst).map_err(|e| FridgeError::io(dst, e))?;
        io::copy(&mut from, &mut to).map_err(|e| FridgeError::io(dst, e))?;
        Ok(())
    }

    fn symlink(&self, src: &Path, link: &Path) -> Result<(), FridgeError> {
        std::os::unix::fs::symlink(src, link).map_err(|e| FridgeError::io(link, e))
    }

    fn list_dir(&self, path: &Path) -> Result<(Vec<String>, Vec<String>), FridgeError> {
        let mut subdirs = Vec::new();
        let mut files = Vec::new();
        let entries = fs::read_dir(path).map_err(|e| FridgeError::io(path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| FridgeError::io(path, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let kind = entry.file_type().map_err(|e| FridgeError::io(path, e))?;
            if kind.is_dir() {
                subdirs.push(name);
            } else {
                files.push(name);
            }
        }
        subdirs.sort();
        files.sort();
        Ok((subdirs, files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{read_file, write_file};

    #[test]
    fn test_rename_refuses_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let fs = OsFileSystem::new();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        write_file(&fs, &a, b"a").unwrap();
        write_file(&fs, &b, b"b").unwrap();
        let err = fs.rename(&a, &b).unwrap_err();
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_copy_does_not_preserve_mode() {
        let dir = tempfile::tempdir().unwrap();
        let fs = OsFileSystem::new();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        write_file(&fs, &src, b"content").unwrap();
        fs.chmod(&src, 0o400).unwrap();
        fs.copy(&src, &dst).unwrap();
        assert_eq!(read_file(&fs, &dst).unwrap(), b"content");
        assert_ne!(fs.stat(&dst).unwrap().mode & 0o7777, 0o400);
    }

    #[test]
    fn test_utime_applies_to_read_only_files() {
        let dir = tempfile::tempdir().unwrap();
        let fs = OsFileSystem::new();
        let path = dir.path().join("f");
        write_file(&fs, &path, b"x").unwrap();
        fs.chmod(&path, 0o444).unwrap();
        fs.utime(&path, 4.5, 7.25).unwrap();
        let status = fs.stat(&path).unwrap();
        assert!((status.atime - 4.5).abs() < 1e-6);
        assert!((status.mtime - 7.25).abs() < 1e-6);
    }

    #[test]
    fn test_list_dir_partitions_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let fs = OsFileSystem::new();
        fs.mkdir(&dir.path().join("sub")).unwrap();
        write_file(&fs, &dir.path().join("b"), b"").unwrap();
        write_file(&fs, &dir.path().join("a"), b"").unwrap();
        let (subdirs, files) = fs.list_dir(dir.path()).unwrap();
        assert_eq!(subdirs, vec!["sub"]);
        assert_eq!(files, vec!["a", "b"]);
    }
}
