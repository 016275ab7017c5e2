//! Content-addressable storage.
//!
//! Maps file content to an immutable, write-protected artifact keyed by the
//! hex digest of the content. The artifact path is sharded two characters
//! deep (`<root>/<hex[0:2]>/<hex[2:]>`) so no single directory accumulates
//! every object. Storing is idempotent: identical content yields the same
//! key, and a second store of already-present content is a no-op.

use std::{
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::errors::FridgeError;
use crate::fs::FileSystem;
use crate::hash::{Checksum, FALLBACK_READ_SIZE};

/// One CAS namespace rooted at a directory.
pub struct ContentAddressableStorage {
    root: PathBuf,
    fs: Rc<dyn FileSystem>,
}

impl ContentAddressableStorage {
    pub fn new(root: PathBuf, fs: Rc<dyn FileSystem>) -> ContentAddressableStorage {
        ContentAddressableStorage { root, fs }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute the content digest of a file without storing it.
    ///
    /// Reads with a buffer sized to the filesystem's preferred block size,
    /// falling back to [`FALLBACK_READ_SIZE`].
    pub fn digest(&self, path: &Path) -> Result<String, FridgeError> {
        let buf_size = self.fs.block_size(path).unwrap_or(FALLBACK_READ_SIZE);
        let mut reader = self.fs.open_read(path)?;
        let checksum = Checksum::of_reader(&mut reader, buf_size)
            .map_err(|e| FridgeError::io(path, e))?;
        Ok(checksum.to_string())
    }

    /// Move the file at `path` into the store and return its key.
    ///
    /// If the key is already present the store is left untouched and the
    /// source file stays in place. Otherwise the source is renamed under the
    /// store root and write-protected (permissions masked to read-only).
    pub fn store(&self, path: &Path) -> Result<String, FridgeError> {
        let key = self.digest(path)?;
        let target = self.get_path(&key);
        if self.fs.exists(&target) {
            tracing::debug!(key = %key, "content already stored");
            return Ok(key);
        }

        let shard = self.root.join(&key[..2]);
        if let Err(err) = self.fs.makedirs(&shard) {
            if !err.is_already_exists() {
                return Err(err);
            }
        }

        let mode = self.fs.stat(path)?.mode;
        self.fs.rename(path, &target)?;
        self.fs.chmod(&target, mode & 0o444)?;
        Ok(key)
    }

    /// Path of the artifact for `key`. Purely deterministic; does not touch
    /// the filesystem.
    pub fn get_path(&self, key: &str) -> PathBuf {
        let (shard, rest) = key.split_at(2.min(key.len()));
        self.root.join(shard).join(rest)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::fs::{MemoryFs, read_file, write_file};

    fn create_cas(fs: &MemoryFs) -> ContentAddressableStorage {
        ContentAddressableStorage::new(PathBuf::from("cas"), Rc::new(fs.clone()))
    }

    #[test]
    fn test_store_and_retrieve() {
        let fs = MemoryFs::new();
        let cas = create_cas(&fs);
        write_file(&fs, Path::new("testfile"), b"dummy content").unwrap();
        let key = cas.store(Path::new("testfile")).unwrap();
        assert_eq!(read_file(&fs, &cas.get_path(&key)).unwrap(), b"dummy content");
    }

    #[test]
    fn test_sharded_layout() {
        let cas = create_cas(&MemoryFs::new());
        assert_eq!(
            cas.get_path("ab12cd"),
            Path::new("cas").join("ab").join("12cd")
        );
    }

    /// After a store, the source is renamed away and the artifact is
    /// write-protected.
    #[test]
    fn test_store_moves_source_and_write_protects() {
        let fs = MemoryFs::new();
        let cas = create_cas(&fs);
        write_file(&fs, Path::new("testfile"), b"dummy content").unwrap();
        fs.chmod(Path::new("testfile"), 0o764).unwrap();
        let key = cas.store(Path::new("testfile")).unwrap();

        assert!(!fs.exists(Path::new("testfile")));
        let target = cas.get_path(&key);
        assert!(fs.open_write(&target).is_err());
        assert_eq!(fs.stat(&target).unwrap().mode & 0o7777, 0o444);
    }

    /// Identical content yields identical keys; the second store is a no-op
    /// that leaves its source in place.
    #[test]
    fn test_store_is_idempotent() {
        let fs = MemoryFs::new();
        let cas = create_cas(&fs);
        write_file(&fs, Path::new("f1"), b"content").unwrap();
        write_file(&fs, Path::new("f2"), b"content").unwrap();

        let key1 = cas.store(Path::new("f1")).unwrap();
        let key2 = cas.store(Path::new("f2")).unwrap();
        assert_eq!(key1, key2);
        assert!(fs.exists(&cas.get_path(&key1)));
        assert!(fs.exists(Path::new("f2")));
    }

    #[test]
    fn test_digest_leaves_file_in_place() {
        let fs = MemoryFs::new();
        let cas = create_cas(&fs);
        write_file(&fs, Path::new("f"), b"content").unwrap();
        let digest = cas.digest(Path::new("f")).unwrap();
        assert_eq!(digest.len(), 40);
        assert!(fs.exists(Path::new("f")));
    }

    #[test]
    fn test_store_missing_file_reports_not_found() {
        let cas = create_cas(&MemoryFs::new());
        assert!(cas.store(Path::new("nope")).unwrap_err().is_not_found());
    }
}
