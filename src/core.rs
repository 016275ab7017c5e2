//! Repository core: the `.fridge` directory.
//!
//! [`FridgeCore`] owns the three CAS namespaces (blobs, snapshots, commits),
//! the branch directory and the HEAD pointer, and provides the add/read
//! operations for each object kind plus reference resolution. It knows
//! nothing about the working tree; that is [`crate::fridge::Fridge`]'s job.
//!
//! Repository layout:
//!
//! ```text
//! <root>/.fridge/
//!   head                            serialized Reference
//!   tmp                             transient staging file
//!   blobs/<hex[0:2]>/<hex[2:]>      read-only file contents
//!   snapshots/<hex[0:2]>/<hex[2:]>  serialized snapshot
//!   commits/<hex[0:2]>/<hex[2:]>    serialized commit
//!   branches/<name>                 branch file (content = commit key)
//! ```

use std::{
    path::{Path, PathBuf},
    rc::Rc,
};

use chrono::Utc;

use crate::cas::ContentAddressableStorage;
use crate::errors::FridgeError;
use crate::fs::{FileSystem, read_file_text, write_file};
use crate::internal::record::{
    Branch, Commit, Record, Reference, SnapshotItem, parse_snapshot, serialize_snapshot,
};

/// Name of the repository directory inside the workspace.
pub const FRIDGE_DIR: &str = ".fridge";

/// Name of the default branch created by `init`.
pub const DEFAULT_BRANCH: &str = "master";

/// The storage core of one repository.
pub struct FridgeCore {
    fs: Rc<dyn FileSystem>,
    blobs: ContentAddressableStorage,
    snapshots: ContentAddressableStorage,
    commits: ContentAddressableStorage,
    branches: PathBuf,
    head_file: PathBuf,
    tmp_file: PathBuf,
}

impl FridgeCore {
    /// Create a fresh repository under `path`.
    ///
    /// Creates `.fridge/` with an empty `master` branch and points HEAD at
    /// it. Fails with [`FridgeError::AlreadyInitialized`] when `.fridge`
    /// already exists.
    pub fn init(path: &Path, fs: Rc<dyn FileSystem>) -> Result<FridgeCore, FridgeError> {
        let fridge_dir = path.join(FRIDGE_DIR);
        if fs.exists(&fridge_dir) {
            return Err(FridgeError::AlreadyInitialized(path.to_path_buf()));
        }
        fs.mkdir(&fridge_dir)?;
        let core = FridgeCore::attach(path, fs);
        core.fs.mkdir(&core.branches)?;
        core.set_branch(DEFAULT_BRANCH, "")?;
        core.set_head(&Reference::Branch(DEFAULT_BRANCH.to_string()))?;
        tracing::debug!(path = %path.display(), "initialized repository");
        Ok(core)
    }

    /// Open an existing repository under `path`.
    ///
    /// Fails with [`FridgeError::NotInitialized`] when `.fridge` is missing.
    pub fn open(path: &Path, fs: Rc<dyn FileSystem>) -> Result<FridgeCore, FridgeError> {
        if !fs.exists(&path.join(FRIDGE_DIR)) {
            return Err(FridgeError::NotInitialized(path.to_path_buf()));
        }
        Ok(FridgeCore::attach(path, fs))
    }

    fn attach(path: &Path, fs: Rc<dyn FileSystem>) -> FridgeCore {
        let fridge_dir = path.join(FRIDGE_DIR);
        FridgeCore {
            blobs: ContentAddressableStorage::new(fridge_dir.join("blobs"), Rc::clone(&fs)),
            snapshots: ContentAddressableStorage::new(fridge_dir.join("snapshots"), Rc::clone(&fs)),
            commits: ContentAddressableStorage::new(fridge_dir.join("commits"), Rc::clone(&fs)),
            branches: fridge_dir.join("branches"),
            head_file: fridge_dir.join("head"),
            tmp_file: fridge_dir.join("tmp"),
            fs,
        }
    }

    /// Move the file at `path` into the blob store, returning its key.
    pub fn add_blob(&self, path: &Path) -> Result<String, FridgeError> {
        self.blobs.store(path)
    }

    /// Content digest of a file, without storing it.
    pub fn blob_digest(&self, path: &Path) -> Result<String, FridgeError> {
        self.blobs.digest(path)
    }

    /// Serialize and store a snapshot, returning its key.
    pub fn add_snapshot(&self, items: &[SnapshotItem]) -> Result<String, FridgeError> {
        self.store_record(serialize_snapshot(items), &self.snapshots)
    }

    /// Build and store a commit for `snapshot_key`.
    ///
    /// The timestamp is the current UTC time; the parent is the commit the
    /// current HEAD resolves to (empty when the branch has never committed).
    pub fn add_commit(&self, snapshot_key: &str, message: &str) -> Result<String, FridgeError> {
        let commit = Commit {
            timestamp: Utc::now().timestamp_micros() as f64 / 1e6,
            snapshot: snapshot_key.to_string(),
            message: message.to_string(),
            parent: self.get_head_key()?,
        };
        self.store_record(commit.to_text(), &self.commits)
    }

    // Serialized records go through the staging file: write to tmp, then let
    // the CAS rename it into place. A tmp left over from a crashed run is
    // simply overwritten here.
    fn store_record(
        &self,
        text: String,
        cas: &ContentAddressableStorage,
    ) -> Result<String, FridgeError> {
        write_file(self.fs.as_ref(), &self.tmp_file, text.as_bytes())?;
        cas.store(&self.tmp_file)
    }

    pub fn read_snapshot(&self, key: &str) -> Result<Vec<SnapshotItem>, FridgeError> {
        let text = read_file_text(self.fs.as_ref(), &self.snapshots.get_path(key))?;
        parse_snapshot(&text)
    }

    pub fn read_commit(&self, key: &str) -> Result<Commit, FridgeError> {
        let text = read_file_text(self.fs.as_ref(), &self.commits.get_path(key))?;
        Commit::from_text(&text)
    }

    pub fn set_head(&self, reference: &Reference) -> Result<(), FridgeError> {
        write_file(self.fs.as_ref(), &self.head_file, reference.to_text().as_bytes())
    }

    pub fn get_head(&self) -> Result<Reference, FridgeError> {
        Reference::from_text(&read_file_text(self.fs.as_ref(), &self.head_file)?)
    }

    /// The commit key HEAD resolves to; empty when the current branch has no
    /// commit yet.
    ///
    /// HEAD naming a branch that does not exist violates the repository
    /// invariants and is reported as [`FridgeError::CorruptRepository`].
    pub fn get_head_key(&self) -> Result<String, FridgeError> {
        match self.resolve_ref(&self.get_head()?) {
            Err(FridgeError::UnknownReference(name)) => Err(FridgeError::CorruptRepository(
                format!("HEAD points at missing branch: {name}"),
            )),
            resolved => resolved,
        }
    }

    pub fn set_branch(&self, name: &str, commit_key: &str) -> Result<(), FridgeError> {
        let branch = Branch {
            head: commit_key.to_string(),
        };
        write_file(
            self.fs.as_ref(),
            &self.branches.join(name),
            branch.to_text().as_bytes(),
        )
    }

    pub fn is_branch(&self, name: &str) -> bool {
        self.fs.exists(&self.branches.join(name))
    }

    /// The commit key a branch points at; empty when it has never committed.
    pub fn resolve_branch(&self, name: &str) -> Result<String, FridgeError> {
        if !self.is_branch(name) {
            return Err(FridgeError::UnknownReference(name.to_string()));
        }
        let branch = Branch::from_text(&read_file_text(
            self.fs.as_ref(),
            &self.branches.join(name),
        )?)?;
        Ok(branch.head)
    }

    /// Whether `key` names a stored commit.
    pub fn is_commit(&self, key: &str) -> bool {
        !key.is_empty() && self.fs.exists(&self.commits.get_path(key))
    }

    /// Resolve a reference to a commit key: identity for commit references,
    /// branch lookup otherwise.
    pub fn resolve_ref(&self, reference: &Reference) -> Result<String, FridgeError> {
        match reference {
            Reference::Commit(key) => Ok(key.clone()),
            Reference::Branch(name) => self.resolve_branch(name),
        }
    }

    /// Copy the blob for `key` out of the store to `path`.
    ///
    /// Content-only copy; mode and times are applied by the caller. A target
    /// that already points at the stored content is tolerated.
    pub fn checkout_blob(&self, key: &str, path: &Path) -> Result<(), FridgeError> {
        let stored = self.blobs.get_path(key);
        if self.fs.exists(path) && self.fs.samefile(&stored, path)? {
            return Ok(());
        }
        self.fs.copy(&stored, path)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::fs::{FileStatus, MemoryFs, read_file};

    fn status() -> FileStatus {
        FileStatus {
            mode: libc::S_IFREG as u32 | 0o644,
            size: 123,
            atime: 4.56,
            mtime: 7.89,
        }
    }

    fn snapshot_fixture() -> Vec<SnapshotItem> {
        vec![
            SnapshotItem {
                checksum: "a1b2".to_string(),
                path: "a".to_string(),
                status: status(),
            },
            SnapshotItem {
                checksum: "cd34".to_string(),
                path: "b".to_string(),
                status: status(),
            },
        ]
    }

    fn init_core(fs: &MemoryFs) -> FridgeCore {
        FridgeCore::init(Path::new("."), Rc::new(fs.clone())).unwrap()
    }

    #[test]
    fn test_init_creates_master_pointing_head() {
        let fs = MemoryFs::new();
        let core = init_core(&fs);
        assert_eq!(
            core.get_head().unwrap(),
            Reference::Branch("master".to_string())
        );
        assert!(core.is_branch("master"));
        assert_eq!(core.get_head_key().unwrap(), "");
    }

    #[test]
    fn test_init_twice_fails() {
        let fs = MemoryFs::new();
        init_core(&fs);
        assert!(matches!(
            FridgeCore::init(Path::new("."), Rc::new(fs.clone())),
            Err(FridgeError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_open_requires_initialized_repository() {
        let fs = MemoryFs::new();
        assert!(matches!(
            FridgeCore::open(Path::new("."), Rc::new(fs.clone())),
            Err(FridgeError::NotInitialized(_))
        ));
        init_core(&fs);
        assert!(FridgeCore::open(Path::new("."), Rc::new(fs)).is_ok());
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let fs = MemoryFs::new();
        let items = snapshot_fixture();
        let key = init_core(&fs).add_snapshot(&items).unwrap();

        let core = FridgeCore::open(Path::new("."), Rc::new(fs)).unwrap();
        assert_eq!(core.read_snapshot(&key).unwrap(), items);
    }

    #[test]
    fn test_two_snapshots_coexist() {
        let fs = MemoryFs::new();
        let core = init_core(&fs);
        let s1 = snapshot_fixture();
        let s2 = vec![SnapshotItem {
            checksum: "key".to_string(),
            path: "xyz".to_string(),
            status: status(),
        }];
        let key1 = core.add_snapshot(&s1).unwrap();
        let key2 = core.add_snapshot(&s2).unwrap();
        assert_eq!(core.read_snapshot(&key1).unwrap(), s1);
        assert_eq!(core.read_snapshot(&key2).unwrap(), s2);
    }

    #[test]
    fn test_commit_roundtrip_and_parent_chain() {
        let fs = MemoryFs::new();
        let core = init_core(&fs);
        let snapshot = core.add_snapshot(&snapshot_fixture()).unwrap();

        let k0 = core.add_commit(&snapshot, "first").unwrap();
        let c0 = core.read_commit(&k0).unwrap();
        assert_eq!(c0.snapshot, snapshot);
        assert_eq!(c0.message, "first");
        assert_eq!(c0.parent, "");

        // Advance the branch, then the next commit chains onto it.
        core.set_branch("master", &k0).unwrap();
        let k1 = core.add_commit(&snapshot, "second").unwrap();
        assert_eq!(core.read_commit(&k1).unwrap().parent, k0);
    }

    #[test]
    fn test_head_set_and_get_survives_reopen() {
        let fs = MemoryFs::new();
        init_core(&fs)
            .set_head(&Reference::Commit("ab12cd".to_string()))
            .unwrap();
        let core = FridgeCore::open(Path::new("."), Rc::new(fs)).unwrap();
        assert_eq!(
            core.get_head().unwrap(),
            Reference::Commit("ab12cd".to_string())
        );
        assert_eq!(core.get_head_key().unwrap(), "ab12cd");
    }

    #[test]
    fn test_head_on_missing_branch_is_corrupt() {
        let fs = MemoryFs::new();
        let core = init_core(&fs);
        core.set_head(&Reference::Branch("gone".to_string())).unwrap();
        assert!(matches!(
            core.get_head_key(),
            Err(FridgeError::CorruptRepository(_))
        ));
    }

    #[test]
    fn test_resolve_branch_unknown() {
        let fs = MemoryFs::new();
        let core = init_core(&fs);
        assert!(matches!(
            core.resolve_branch("nope"),
            Err(FridgeError::UnknownReference(_))
        ));
    }

    #[test]
    fn test_is_commit() {
        let fs = MemoryFs::new();
        let core = init_core(&fs);
        let snapshot = core.add_snapshot(&[]).unwrap();
        let key = core.add_commit(&snapshot, "m").unwrap();
        assert!(core.is_commit(&key));
        assert!(!core.is_commit("0000000000000000000000000000000000000000"));
        assert!(!core.is_commit(""));
    }

    #[test]
    fn test_checkout_blob_copies_content() {
        let fs = MemoryFs::new();
        let core = init_core(&fs);
        crate::fs::write_file(&fs, Path::new("f"), b"content").unwrap();
        let key = core.add_blob(Path::new("f")).unwrap();

        core.checkout_blob(&key, Path::new("target")).unwrap();
        assert_eq!(read_file(&fs, Path::new("target")).unwrap(), b"content");
    }

    /// A target already aliasing the stored blob is left alone.
    #[test]
    fn test_checkout_blob_tolerates_checked_out_target() {
        let fs = MemoryFs::new();
        let core = init_core(&fs);
        crate::fs::write_file(&fs, Path::new("f"), b"content").unwrap();
        let key = core.add_blob(Path::new("f")).unwrap();

        fs.symlink(&core.blobs.get_path(&key), Path::new("target"))
            .unwrap();
        core.checkout_blob(&key, Path::new("target")).unwrap();
        assert_eq!(read_file(&fs, Path::new("target")).unwrap(), b"content");
    }

    /// A leftover staging file from a crashed run is overwritten by the next
    /// record write.
    #[test]
    fn test_stale_tmp_file_is_tolerated() {
        let fs = MemoryFs::new();
        let core = init_core(&fs);
        crate::fs::write_file(&fs, Path::new("./.fridge/tmp"), b"stale").unwrap();
        let key = core.add_snapshot(&snapshot_fixture()).unwrap();
        assert_eq!(core.read_snapshot(&key).unwrap(), snapshot_fixture());
    }
}
