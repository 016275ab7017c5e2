//! Workspace operations.
//!
//! [`Fridge`] couples a [`FridgeCore`] to the directory it lives in: it
//! walks the working tree to form snapshots, creates commits chained by
//! parent, moves HEAD and branches, restores prior states (content, modes
//! and times), lists history and computes working-tree diffs.
//!
//! Within a single commit the ordering is strict: blobs, then the snapshot,
//! then the commit, then the branch/HEAD update, then a checkout that
//! normalizes the working files to the stored snapshot. A crash in between
//! leaves at worst orphaned objects; the repository stays consistent.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::core::{FRIDGE_DIR, FridgeCore};
use crate::errors::FridgeError;
use crate::fs::FileSystem;
use crate::internal::record::{Commit, Reference, SnapshotItem};

/// Working-tree paths that differ from the HEAD snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// In the tree but not in the snapshot.
    pub added: Vec<String>,
    /// In the snapshot but not in the tree.
    pub removed: Vec<String>,
    /// Present in both with differing content.
    pub updated: Vec<String>,
}

impl DiffSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// A repository together with the workspace directory it captures.
pub struct Fridge {
    core: FridgeCore,
    fs: Rc<dyn FileSystem>,
    path: PathBuf,
}

impl Fridge {
    /// Initialize a new repository in `path` and open it.
    pub fn init(path: impl Into<PathBuf>, fs: Rc<dyn FileSystem>) -> Result<Fridge, FridgeError> {
        let path = path.into();
        let core = FridgeCore::init(&path, Rc::clone(&fs))?;
        Ok(Fridge { core, fs, path })
    }

    /// Open the repository in `path`.
    pub fn open(path: impl Into<PathBuf>, fs: Rc<dyn FileSystem>) -> Result<Fridge, FridgeError> {
        let path = path.into();
        let core = FridgeCore::open(&path, Rc::clone(&fs))?;
        Ok(Fridge { core, fs, path })
    }

    pub fn core(&self) -> &FridgeCore {
        &self.core
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Capture the working tree as a new commit and return its key.
    ///
    /// Walks the tree (pruning `.fridge`), stores a blob and records a
    /// snapshot item per file, stores the snapshot and a commit pointing at
    /// it, advances HEAD (directly, or through the current branch), then
    /// checks the new state out so the working files match the stored
    /// snapshot exactly.
    pub fn commit(&self, message: &str) -> Result<String, FridgeError> {
        let mut items = Vec::new();
        self.fs.walk(&self.path, &mut |dir, subdirs, files| {
            subdirs.retain(|name| name != FRIDGE_DIR);
            for name in files {
                let file = dir.join(name);
                let status = self.fs.stat(&file)?;
                let checksum = self.core.add_blob(&file)?;
                items.push(SnapshotItem {
                    checksum,
                    path: self.relative(&file),
                    status,
                });
            }
            Ok(())
        })?;

        let snapshot_key = self.core.add_snapshot(&items)?;
        let commit_key = self.core.add_commit(&snapshot_key, message)?;

        match self.core.get_head()? {
            Reference::Commit(_) => {
                self.core.set_head(&Reference::Commit(commit_key.clone()))?;
            }
            Reference::Branch(name) => {
                self.core.set_branch(&name, &commit_key)?;
            }
        }

        tracing::debug!(key = %commit_key, files = items.len(), "created commit");
        self.checkout(None)?;
        Ok(commit_key)
    }

    /// Restore the working tree to a commit.
    ///
    /// With a reference, resolves it (see [`Fridge::parse_ref`]) and moves
    /// HEAD there first; without one, HEAD stays put. Files named in the
    /// previously checked-out snapshot are removed (missing ones are
    /// tolerated), then every file of the target snapshot is materialized
    /// from its blob and given the snapshot's permission bits and times.
    pub fn checkout(&self, reference: Option<&str>) -> Result<(), FridgeError> {
        let previous = self.core.get_head_key()?;
        if let Some(text) = reference {
            let reference = self.parse_ref(text)?;
            self.core.set_head(&reference)?;
        }
        let target = self.core.get_head_key()?;
        tracing::debug!(from = %previous, to = %target, "checkout");

        if !previous.is_empty() {
            for item in self.snapshot_of(&previous)? {
                let path = self.path.join(&item.path);
                if let Err(err) = self.fs.unlink(&path) {
                    if !err.is_not_found() {
                        return Err(err);
                    }
                }
            }
        }

        if !target.is_empty() {
            for item in self.snapshot_of(&target)? {
                let path = self.path.join(&item.path);
                if let Some(parent) = path.parent() {
                    if !self.fs.exists(parent) {
                        self.fs.makedirs(parent)?;
                    }
                }
                self.core.checkout_blob(&item.checksum, &path)?;
                self.fs.chmod(&path, item.status.mode & 0o7777)?;
                self.fs
                    .utime(&path, item.status.atime, item.status.mtime)?;
            }
        }
        Ok(())
    }

    /// Create branch `name` at the current HEAD commit and switch to it.
    pub fn branch(&self, name: &str) -> Result<(), FridgeError> {
        if self.core.is_branch(name) {
            return Err(FridgeError::BranchExists(name.to_string()));
        }
        let key = self.core.get_head_key()?;
        self.core.set_branch(name, &key)?;
        self.core.set_head(&Reference::Branch(name.to_string()))?;
        tracing::debug!(name, at = %key, "created branch");
        Ok(())
    }

    /// Resolve user-supplied reference text to a [`Reference`].
    ///
    /// Text naming both a branch and a commit is ambiguous; text naming
    /// neither is unknown. Both are reported to the caller, never retried.
    pub fn parse_ref(&self, text: &str) -> Result<Reference, FridgeError> {
        match (self.core.is_branch(text), self.core.is_commit(text)) {
            (true, true) => Err(FridgeError::AmbiguousReference(text.to_string())),
            (true, false) => Ok(Reference::Branch(text.to_string())),
            (false, true) => Ok(Reference::Commit(text.to_string())),
            (false, false) => Err(FridgeError::UnknownReference(text.to_string())),
        }
    }

    /// History from the current HEAD commit along the parent chain, most
    /// recent first.
    pub fn log(&self) -> Result<Vec<(String, Commit)>, FridgeError> {
        let mut history = Vec::new();
        let mut key = self.core.get_head_key()?;
        while !key.is_empty() {
            let commit = self.core.read_commit(&key)?;
            let parent = commit.parent.clone();
            history.push((key, commit));
            key = parent;
        }
        Ok(history)
    }

    /// Set differences between the HEAD snapshot and the working tree.
    pub fn diff(&self) -> Result<DiffSummary, FridgeError> {
        let head = self.core.get_head_key()?;
        let mut snapshot: BTreeMap<String, String> = BTreeMap::new();
        if !head.is_empty() {
            for item in self.snapshot_of(&head)? {
                snapshot.insert(item.path, item.checksum);
            }
        }

        let mut tree: Vec<String> = Vec::new();
        self.fs.walk(&self.path, &mut |dir, subdirs, files| {
            subdirs.retain(|name| name != FRIDGE_DIR);
            for name in files {
                tree.push(self.relative(&dir.join(name)));
            }
            Ok(())
        })?;

        let mut summary = DiffSummary::default();
        for path in &tree {
            match snapshot.get(path) {
                None => summary.added.push(path.clone()),
                Some(checksum) => {
                    let current = self.core.blob_digest(&self.path.join(path))?;
                    if current != *checksum {
                        summary.updated.push(path.clone());
                    }
                }
            }
        }
        for path in snapshot.keys() {
            if !tree.contains(path) {
                summary.removed.push(path.clone());
            }
        }
        Ok(summary)
    }

    fn snapshot_of(&self, commit_key: &str) -> Result<Vec<SnapshotItem>, FridgeError> {
        let commit = self.core.read_commit(commit_key)?;
        self.core.read_snapshot(&commit.snapshot)
    }

    fn relative(&self, file: &Path) -> String {
        file.strip_prefix(&self.path)
            .unwrap_or(file)
            .to_string_lossy()
            .into_owned()
    }
}
