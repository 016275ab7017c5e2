//! In-memory [`FileSystem`] adapter.
//!
//! Maintains a tree of directory and file nodes with per-node mode, size and
//! times, plus a synthetic inode number so `samefile` and `symlink` behave
//! like their host-filesystem counterparts. Cloning a `MemoryFs` clones a
//! handle to the same tree, which lets tests keep a handle while the
//! repository owns another.
//!
//! Write handles buffer their content and commit it back into the tree on
//! `flush` (or on drop). Write-protected nodes refuse `open_write`, which is
//! what keeps stored CAS objects immutable in tests.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    io::{self, Cursor, Read, Write},
    path::{Component, Path},
    rc::Rc,
    time::{SystemTime, UNIX_EPOCH},
};

use super::{FileStatus, FileSystem};
use crate::errors::FridgeError;

const DEFAULT_FILE_MODE: u32 = libc::S_IFREG as u32 | 0o644;
const DIR_MODE: u32 = libc::S_IFDIR as u32 | 0o755;

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[derive(Debug)]
struct FileNode {
    content: Vec<u8>,
    mode: u32,
    atime: f64,
    mtime: f64,
    ino: u64,
}

#[derive(Debug)]
enum Node {
    Dir(BTreeMap<String, Node>),
    File(Rc<RefCell<FileNode>>),
}

#[derive(Debug)]
struct Tree {
    root: BTreeMap<String, Node>,
    next_ino: u64,
}

impl Tree {
    fn new_file(&mut self, content: Vec<u8>, mode: u32) -> Node {
        let ino = self.next_ino;
        self.next_ino += 1;
        let stamp = now();
        Node::File(Rc::new(RefCell::new(FileNode {
            content,
            mode,
            atime: stamp,
            mtime: stamp,
            ino,
        })))
    }
}

/// [`FileSystem`] implementation holding all state in memory.
#[derive(Clone, Debug)]
pub struct MemoryFs {
    tree: Rc<RefCell<Tree>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

fn parts(path: &Path) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => out.push(name.to_string_lossy().into_owned()),
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

fn split_last(parts: &[String]) -> io::Result<(&[String], &String)> {
    match parts.split_last() {
        Some((name, dir)) => Ok((dir, name)),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path names the filesystem root",
        )),
    }
}

fn dir_ref<'t>(
    root: &'t BTreeMap<String, Node>,
    parts: &[String],
) -> io::Result<&'t BTreeMap<String, Node>> {
    let mut cur = root;
    for part in parts {
        match cur.get(part) {
            Some(Node::Dir(map)) => cur = map,
            Some(Node::File(_)) => return Err(io::ErrorKind::NotADirectory.into()),
            None => return Err(io::ErrorKind::NotFound.into()),
        }
    }
    Ok(cur)
}

fn dir_mut<'t>(
    root: &'t mut BTreeMap<String, Node>,
    parts: &[String],
) -> io::Result<&'t mut BTreeMap<String, Node>> {
    let mut cur = root;
    for part in parts {
        match cur.get_mut(part) {
            Some(Node::Dir(map)) => cur = map,
            Some(Node::File(_)) => return Err(io::ErrorKind::NotADirectory.into()),
            None => return Err(io::ErrorKind::NotFound.into()),
        }
    }
    Ok(cur)
}

fn file_ref(root: &BTreeMap<String, Node>, parts: &[String]) -> io::Result<Rc<RefCell<FileNode>>> {
    let (dir, name) = split_last(parts)?;
    match dir_ref(root, dir)?.get(name) {
        Some(Node::File(node)) => Ok(Rc::clone(node)),
        Some(Node::Dir(_)) => Err(io::ErrorKind::IsADirectory.into()),
        None => Err(io::ErrorKind::NotFound.into()),
    }
}

impl MemoryFs {
    pub fn new() -> MemoryFs {
        MemoryFs {
            tree: Rc::new(RefCell::new(Tree {
                root: BTreeMap::new(),
                next_ino: 1,
            })),
        }
    }

    fn run<T>(
        &self,
        path: &Path,
        op: impl FnOnce(&mut Tree, &[String]) -> io::Result<T>,
    ) -> Result<T, FridgeError> {
        let parts = parts(path);
        let mut tree = self.tree.borrow_mut();
        op(&mut tree, &parts).map_err(|e| FridgeError::io(path, e))
    }
}

struct MemWriter {
    tree: Rc<RefCell<Tree>>,
    parts: Vec<String>,
    buf: Vec<u8>,
    committed: bool,
}

impl MemWriter {
    fn commit(&mut self) -> io::Result<()> {
        if self.committed {
            return Ok(());
        }
        self.committed = true;
        let mut tree = self.tree.borrow_mut();
        let (dir, name) = split_last(&self.parts)?;
        let (dir, name) = (dir.to_vec(), name.clone());
        match dir_ref(&tree.root, &dir)?.get(&name) {
            Some(Node::File(node)) => {
                let node = Rc::clone(node);
                let mut node = node.borrow_mut();
                node.content = std::mem::take(&mut self.buf);
                node.mtime = now();
                Ok(())
            }
            Some(Node::Dir(_)) => Err(io::ErrorKind::IsADirectory.into()),
            None => {
                let node = tree.new_file(std::mem::take(&mut self.buf), DEFAULT_FILE_MODE);
                dir_mut(&mut tree.root, &dir)?.insert(name, node);
                Ok(())
            }
        }
    }
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit()
    }
}

impl Drop for MemWriter {
    fn drop(&mut self) {
        let _ = self.commit();
    }
}

impl FileSystem for MemoryFs {
    fn mkdir(&self, path: &Path) -> Result<(), FridgeError> {
        self.run(path, |tree, parts| {
            let (dir, name) = split_last(parts)?;
            let dir = dir_mut(&mut tree.root, dir)?;
            if dir.contains_key(name) {
                return Err(io::ErrorKind::AlreadyExists.into());
            }
            dir.insert(name.clone(), Node::Dir(BTreeMap::new()));
            Ok(())
        })
    }

    fn makedirs(&self, path: &Path) -> Result<(), FridgeError> {
        self.run(path, |tree, parts| {
            if dir_ref(&tree.root, parts).is_ok() {
                return Err(io::ErrorKind::AlreadyExists.into());
            }
            let mut cur = &mut tree.root;
            for part in parts {
                cur = match cur
                    .entry(part.clone())
                    .or_insert_with(|| Node::Dir(BTreeMap::new()))
                {
                    Node::Dir(map) => map,
                    Node::File(_) => return Err(io::ErrorKind::NotADirectory.into()),
                };
            }
            Ok(())
        })
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read>, FridgeError> {
        self.run(path, |tree, parts| {
            let node = file_ref(&tree.root, parts)?;
            let content = node.borrow().content.clone();
            Ok(Box::new(Cursor::new(content)) as Box<dyn Read>)
        })
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn Write>, FridgeError> {
        let owned = parts(path);
        self.run(path, |tree, parts| {
            let (dir, name) = split_last(parts)?;
            match dir_ref(&tree.root, dir)?.get(name) {
                Some(Node::File(node)) => {
                    if node.borrow().mode & 0o200 == 0 {
                        return Err(io::ErrorKind::PermissionDenied.into());
                    }
                }
                Some(Node::Dir(_)) => return Err(io::ErrorKind::IsADirectory.into()),
                None => {}
            }
            Ok(())
        })?;
        Ok(Box::new(MemWriter {
            tree: Rc::clone(&self.tree),
            parts: owned,
            buf: Vec::new(),
            committed: false,
        }))
    }

    fn rename(&self, src: &Path, dst: &Path) -> Result<(), FridgeError> {
        let dst_parts = parts(dst);
        self.run(src, |tree, src_parts| {
            {
                let (dir, name) = split_last(&dst_parts)?;
                if dir_ref(&tree.root, dir)?.contains_key(name) {
                    return Err(io::ErrorKind::AlreadyExists.into());
                }
            }
            let node = {
                let (dir, name) = split_last(src_parts)?;
                dir_mut(&mut tree.root, dir)?
                    .remove(name)
                    .ok_or(io::ErrorKind::NotFound)?
            };
            let (dir, name) = split_last(&dst_parts)?;
            dir_mut(&mut tree.root, dir)?.insert(name.clone(), node);
            Ok(())
        })
    }

    fn unlink(&self, path: &Path) -> Result<(), FridgeError> {
        self.run(path, |tree, parts| {
            let (dir, name) = split_last(parts)?;
            let dir = dir_mut(&mut tree.root, dir)?;
            match dir.get(name) {
                Some(Node::File(_)) => {
                    dir.remove(name);
                    Ok(())
                }
                Some(Node::Dir(_)) => Err(io::ErrorKind::IsADirectory.into()),
                None => Err(io::ErrorKind::NotFound.into()),
            }
        })
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<(), FridgeError> {
        self.run(path, |tree, parts| {
            let node = file_ref(&tree.root, parts)?;
            let mut node = node.borrow_mut();
            node.mode = (node.mode & !0o7777) | (mode & 0o7777);
            Ok(())
        })
    }

    fn utime(&self, path: &Path, atime: f64, mtime: f64) -> Result<(), FridgeError> {
        self.run(path, |tree, parts| {
            let node = file_ref(&tree.root, parts)?;
            let mut node = node.borrow_mut();
            node.atime = atime;
            node.mtime = mtime;
            Ok(())
        })
    }

    fn stat(&self, path: &Path) -> Result<FileStatus, FridgeError> {
        self.run(path, |tree, parts| {
            if let Ok(node) = file_ref(&tree.root, parts) {
                let node = node.borrow();
                return Ok(FileStatus {
                    mode: node.mode,
                    size: node.content.len() as u64,
                    atime: node.atime,
                    mtime: node.mtime,
                });
            }
            dir_ref(&tree.root, parts)?;
            Ok(FileStatus {
                mode: DIR_MODE,
                size: 0,
                atime: 0.0,
                mtime: 0.0,
            })
        })
    }

    fn block_size(&self, _path: &Path) -> Option<usize> {
        None
    }

    fn exists(&self, path: &Path) -> bool {
        let parts = parts(path);
        let tree = self.tree.borrow();
        file_ref(&tree.root, &parts).is_ok() || dir_ref(&tree.root, &parts).is_ok()
    }

    fn samefile(&self, a: &Path, b: &Path) -> Result<bool, FridgeError> {
        let other = parts(b);
        self.run(a, |tree, parts| {
            let left = file_ref(&tree.root, parts)?;
            let right = file_ref(&tree.root, &other)?;
            Ok(left.borrow().ino == right.borrow().ino)
        })
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<(), FridgeError> {
        let dst_parts = parts(dst);
        self.run(src, |tree, src_parts| {
            let content = file_ref(&tree.root, src_parts)?.borrow().content.clone();
            let (dir, name) = split_last(&dst_parts)?;
            let (dir, name) = (dir.to_vec(), name.clone());
            match dir_ref(&tree.root, &dir)?.get(&name) {
                Some(Node::File(node)) => {
                    let node = Rc::clone(node);
                    let mut node = node.borrow_mut();
                    if node.mode & 0o200 == 0 {
                        return Err(io::ErrorKind::PermissionDenied.into());
                    }
                    node.content = content;
                    node.mtime = now();
                    Ok(())
                }
                Some(Node::Dir(_)) => Err(io::ErrorKind::IsADirectory.into()),
                None => {
                    let node = tree.new_file(content, DEFAULT_FILE_MODE);
                    dir_mut(&mut tree.root, &dir)?.insert(name, node);
                    Ok(())
                }
            }
        })
    }

    fn symlink(&self, src: &Path, link: &Path) -> Result<(), FridgeError> {
        // Modeled as an aliasing link: both names share one node, so
        // `samefile` holds and content stays in sync.
        let link_parts = parts(link);
        self.run(src, |tree, src_parts| {
            let node = file_ref(&tree.root, src_parts)?;
            let (dir, name) = split_last(&link_parts)?;
            let dir = dir_mut(&mut tree.root, dir)?;
            if dir.contains_key(name) {
                return Err(io::ErrorKind::AlreadyExists.into());
            }
            dir.insert(name.clone(), Node::File(node));
            Ok(())
        })
    }

    fn list_dir(&self, path: &Path) -> Result<(Vec<String>, Vec<String>), FridgeError> {
        self.run(path, |tree, parts| {
            let dir = dir_ref(&tree.root, parts)?;
            let mut subdirs = Vec::new();
            let mut files = Vec::new();
            for (name, node) in dir {
                match node {
                    Node::Dir(_) => subdirs.push(name.clone()),
                    Node::File(_) => files.push(name.clone()),
                }
            }
            Ok((subdirs, files))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::MemoryFs;
    use crate::fs::{FileSystem, read_file, write_file};

    #[test]
    fn test_write_and_read_roundtrip() {
        let fs = MemoryFs::new();
        write_file(&fs, Path::new("f"), b"some content").unwrap();
        assert_eq!(read_file(&fs, Path::new("f")).unwrap(), b"some content");
    }

    #[test]
    fn test_write_into_subdirectory() {
        let fs = MemoryFs::new();
        fs.mkdir(Path::new("sub")).unwrap();
        write_file(&fs, Path::new("sub/f"), b"x").unwrap();
        assert!(fs.exists(Path::new("sub/f")));
    }

    #[test]
    fn test_open_write_requires_parent_directory() {
        let fs = MemoryFs::new();
        assert!(fs.open_write(Path::new("missing/f")).is_err());
    }

    #[test]
    fn test_mkdir_fails_on_existing() {
        let fs = MemoryFs::new();
        fs.mkdir(Path::new("d")).unwrap();
        assert!(fs.mkdir(Path::new("d")).unwrap_err().is_already_exists());
    }

    #[test]
    fn test_makedirs_creates_chain_and_fails_on_existing() {
        let fs = MemoryFs::new();
        fs.makedirs(Path::new("a/b/c")).unwrap();
        assert!(fs.exists(Path::new("a/b/c")));
        assert!(
            fs.makedirs(Path::new("a/b/c"))
                .unwrap_err()
                .is_already_exists()
        );
    }

    #[test]
    fn test_rename_moves_node_and_refuses_existing_destination() {
        let fs = MemoryFs::new();
        write_file(&fs, Path::new("a"), b"a").unwrap();
        fs.rename(Path::new("a"), Path::new("b")).unwrap();
        assert!(!fs.exists(Path::new("a")));
        assert_eq!(read_file(&fs, Path::new("b")).unwrap(), b"a");

        write_file(&fs, Path::new("a"), b"again").unwrap();
        assert!(
            fs.rename(Path::new("a"), Path::new("b"))
                .unwrap_err()
                .is_already_exists()
        );
    }

    #[test]
    fn test_unlink_missing_file_reports_not_found() {
        let fs = MemoryFs::new();
        assert!(fs.unlink(Path::new("nope")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_chmod_write_protection_blocks_open_write() {
        let fs = MemoryFs::new();
        write_file(&fs, Path::new("f"), b"x").unwrap();
        fs.chmod(Path::new("f"), 0o444).unwrap();
        assert!(fs.open_write(Path::new("f")).is_err());
        // Reading stays possible.
        assert_eq!(read_file(&fs, Path::new("f")).unwrap(), b"x");
    }

    #[test]
    fn test_utime_and_stat() {
        let fs = MemoryFs::new();
        write_file(&fs, Path::new("f"), b"abc").unwrap();
        fs.utime(Path::new("f"), 4.56, 7.89).unwrap();
        let status = fs.stat(Path::new("f")).unwrap();
        assert_eq!(status.size, 3);
        assert_eq!(status.atime, 4.56);
        assert_eq!(status.mtime, 7.89);
        assert_eq!(status.mode & libc::S_IFREG as u32, libc::S_IFREG as u32);
    }

    #[test]
    fn test_samefile_through_symlink() {
        let fs = MemoryFs::new();
        write_file(&fs, Path::new("f"), b"x").unwrap();
        fs.symlink(Path::new("f"), Path::new("link")).unwrap();
        assert!(fs.samefile(Path::new("f"), Path::new("link")).unwrap());

        write_file(&fs, Path::new("g"), b"x").unwrap();
        assert!(!fs.samefile(Path::new("f"), Path::new("g")).unwrap());
    }

    #[test]
    fn test_walk_visits_topdown_and_supports_pruning() {
        let fs = MemoryFs::new();
        fs.mkdir(Path::new("keep")).unwrap();
        fs.mkdir(Path::new("skip")).unwrap();
        write_file(&fs, Path::new("top"), b"").unwrap();
        write_file(&fs, Path::new("keep/inner"), b"").unwrap();
        write_file(&fs, Path::new("skip/hidden"), b"").unwrap();

        let mut seen: Vec<(PathBuf, Vec<String>)> = Vec::new();
        fs.walk(Path::new("."), &mut |dir, subdirs, files| {
            subdirs.retain(|d| d != "skip");
            seen.push((dir.to_path_buf(), files.to_vec()));
            Ok(())
        })
        .unwrap();

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, vec!["top"]);
        assert_eq!(seen[1].1, vec!["inner"]);
    }
}
