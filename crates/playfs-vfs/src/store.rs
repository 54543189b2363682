use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    error::{Errno, Result},
    path,
};

/// Storage capacity assumed for an empty file on its first write.
pub const INITIAL_CAPACITY: usize = 1024;
/// The largest size a file may grow to through writes.
pub const MAX_FILE_SIZE: usize = 1 << 30;

/// A single entry in the [`Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Directory,
    File(FileData),
}

impl Node {
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory)
    }

    /// The logical size of the node. Directories have size zero.
    pub fn size(&self) -> usize {
        match self {
            Node::Directory => 0,
            Node::File(data) => data.len(),
        }
    }
}

/// The contents of a regular file.
///
/// The allocated storage and the logical length are tracked separately: storage grows by doubling,
/// so a run of small appends copies O(final size) bytes in total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileData {
    storage: Box<[u8]>,
    len: usize,
}

impl FileData {
    /// Create file contents holding exactly `bytes`.
    pub fn with_contents(bytes: impl Into<Vec<u8>>) -> Self {
        let storage = bytes.into().into_boxed_slice();
        Self {
            len: storage.len(),
            storage,
        }
    }

    /// The bytes actually written.
    pub fn bytes(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The currently allocated storage, which is always at least [`FileData::len`].
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Copy bytes starting at `offset` into `buf`, returning how many were copied.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let available = self.len.saturating_sub(offset);
        let n = buf.len().min(available);
        if n > 0 {
            buf[..n].copy_from_slice(&self.storage[offset..offset + n]);
        }
        n
    }

    /// Write `buf` at `offset`, growing the storage as needed. Returns the new end offset.
    ///
    /// This will return:
    /// - Errno::FileTooBig if the write would end beyond [`MAX_FILE_SIZE`]
    pub fn write_at(&mut self, offset: usize, buf: &[u8]) -> Result<usize> {
        let end = offset
            .checked_add(buf.len())
            .filter(|&end| end <= MAX_FILE_SIZE)
            .ok_or(Errno::FileTooBig)?;
        self.reserve(end);
        if offset > self.len {
            self.storage[self.len..offset].fill(0);
        }
        self.storage[offset..end].copy_from_slice(buf);
        self.len = self.len.max(end);
        Ok(end)
    }

    // `end` never exceeds MAX_FILE_SIZE, so doubling cannot overflow.
    fn reserve(&mut self, end: usize) {
        let mut capacity = self.storage.len();
        if capacity == 0 {
            capacity = INITIAL_CAPACITY;
        }
        while capacity < end {
            capacity *= 2;
        }
        if capacity == self.storage.len() {
            return;
        }

        let mut storage = vec![0; capacity].into_boxed_slice();
        storage[..self.len].copy_from_slice(&self.storage[..self.len]);
        self.storage = storage;
    }
}

/// The authoritative mapping from absolute path to [`Node`].
///
/// The hierarchy is implicit in the keys: children are found by prefix scan rather than through
/// parent/child links. Every ancestor of a stored path is itself a stored directory, and the root
/// always exists.
#[derive(Debug, Clone)]
pub struct Store {
    nodes: BTreeMap<String, Node>,
}

impl Store {
    /// Create a store containing only the root directory.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_owned(), Node::Directory);
        Self { nodes }
    }

    pub fn get(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Node> {
        self.nodes.get_mut(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    /// Number of entries, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A store always holds the root, so this is never `true`.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if `path` exists and is a directory.
    pub fn is_dir(&self, path: &str) -> bool {
        self.get(path).is_some_and(Node::is_dir)
    }

    /// Create a single directory whose parent chain already exists.
    ///
    /// This will return:
    /// - Errno::AlreadyExists if any ancestor is missing or is not a directory
    /// - Errno::AlreadyExists if `path` already exists
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let chain = path::ancestors(path);
        let (last, parents) = chain.split_last().ok_or(Errno::Inval)?;
        if !parents.iter().all(|dir| self.is_dir(dir)) {
            return Err(Errno::AlreadyExists);
        }
        if self.exists(last) {
            return Err(Errno::AlreadyExists);
        }
        self.nodes.insert(last.clone(), Node::Directory);
        Ok(())
    }

    /// Create `path` and any missing ancestors.
    ///
    /// Directories that already exist are left alone. Returns Errno::AlreadyExists if anything in
    /// the chain is a regular file.
    pub fn mkdirp(&mut self, path: &str) -> Result<()> {
        for dir in path::ancestors(path) {
            match self.nodes.get(&dir) {
                Some(Node::Directory) => continue,
                Some(Node::File(_)) => return Err(Errno::AlreadyExists),
                None => {
                    self.nodes.insert(dir, Node::Directory);
                }
            }
        }
        Ok(())
    }

    /// Install a regular file at `path`, replacing any file already there.
    ///
    /// The parent must be an existing directory.
    pub fn create_file(&mut self, path: &str, data: FileData) -> Result<()> {
        let parent = path::parent(path).ok_or(Errno::IsDir)?;
        match self.nodes.get(parent) {
            Some(Node::Directory) => {}
            Some(Node::File(_)) => return Err(Errno::NotDir),
            None => return Err(Errno::NotFound),
        }
        if self.is_dir(path) {
            return Err(Errno::IsDir);
        }
        self.nodes.insert(path.to_owned(), Node::File(data));
        Ok(())
    }

    /// The names of the immediate children of `path`.
    pub fn readdir(&self, path: &str) -> Result<Vec<String>> {
        match self.nodes.get(path) {
            Some(Node::Directory) => {}
            Some(Node::File(_)) => return Err(Errno::NotDir),
            None => return Err(Errno::NotFound),
        }
        Ok(self
            .descendants(path)
            .filter_map(|(key, _)| path::child_name(path, key))
            .map(str::to_owned)
            .collect())
    }

    /// Remove the regular file at `path`.
    ///
    /// This will return:
    /// - Errno::NotFound if nothing exists at `path`
    /// - Errno::IsDir if `path` is a directory
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        match self.nodes.get(path) {
            Some(Node::File(_)) => {
                self.nodes.remove(path);
                Ok(())
            }
            Some(Node::Directory) => Err(Errno::IsDir),
            None => Err(Errno::NotFound),
        }
    }

    /// Seed a file, creating its ancestor directories.
    pub fn seed(&mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Result<()> {
        if let Some(parent) = path::parent(path) {
            self.mkdirp(parent)?;
        }
        self.create_file(path, FileData::with_contents(bytes))
    }

    /// Seed `dir` and a set of files relative to it.
    pub fn seed_dir<I, P, B>(&mut self, dir: &str, files: I) -> Result<()>
    where
        I: IntoIterator<Item = (P, B)>,
        P: AsRef<str>,
        B: Into<Vec<u8>>,
    {
        self.mkdirp(dir)?;
        for (name, bytes) in files {
            let path = path::resolve(dir, name.as_ref());
            if !path::is_within(dir, &path) || path == dir {
                return Err(Errno::Inval);
            }
            self.seed(&path, bytes)?;
        }
        debug!(dir, entries = self.descendants(dir).count(), "seeded directory");
        Ok(())
    }

    /// Remove `dir` and everything beneath it. The root cannot be removed.
    pub fn remove_tree(&mut self, dir: &str) -> Result<()> {
        if dir == "/" {
            return Err(Errno::Inval);
        }
        if !self.exists(dir) {
            return Err(Errno::NotFound);
        }
        let doomed: Vec<String> = self.descendants(dir).map(|(key, _)| key.clone()).collect();
        for key in &doomed {
            self.nodes.remove(key);
        }
        self.nodes.remove(dir);
        debug!(dir, removed = doomed.len() + 1, "removed tree");
        Ok(())
    }

    /// Iterate over every stored path and node, in byte-wise path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.nodes.iter().map(|(key, node)| (key.as_str(), node))
    }

    /// Every entry strictly beneath `dir`.
    fn descendants<'a>(&'a self, dir: &str) -> impl Iterator<Item = (&'a String, &'a Node)> {
        let prefix = if dir == "/" {
            "/".to_owned()
        } else {
            format!("{dir}/")
        };
        self.nodes
            .range(prefix.clone()..)
            .take_while(move |(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| key.as_str() != "/")
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn root_always_exists() {
        let store = Store::new();
        assert!(store.is_dir("/"));
        assert_eq!(1, store.len());
    }

    #[test]
    fn mkdir_one_level() {
        let mut store = Store::new();
        store.mkdir("/a").unwrap();
        store.mkdir("/a/b").unwrap();
        assert!(store.is_dir("/a/b"));
        assert_eq!(vec!["b"], store.readdir("/a").unwrap());
    }

    #[test]
    fn mkdir_existing_fails() {
        let mut store = Store::new();
        store.mkdir("/a").unwrap();
        assert_eq!(Err(Errno::AlreadyExists), store.mkdir("/a"));
        assert_eq!(Err(Errno::AlreadyExists), store.mkdir("/"));
        assert_eq!(2, store.len());
    }

    #[test]
    fn mkdir_missing_parent_fails() {
        let mut store = Store::new();
        assert_eq!(Err(Errno::AlreadyExists), store.mkdir("/a/b"));
        assert!(!store.exists("/a"));
        assert!(!store.exists("/a/b"));
    }

    #[test]
    fn mkdir_under_file_fails() {
        let mut store = Store::new();
        store.seed("/f", "x").unwrap();
        assert_eq!(Err(Errno::AlreadyExists), store.mkdir("/f/sub"));
        assert_eq!(Err(Errno::AlreadyExists), store.mkdir("/f"));
    }

    #[test]
    fn mkdirp_creates_chain() {
        let mut store = Store::new();
        store.mkdirp("/a/b/c").unwrap();
        store.mkdirp("/a/b/c").unwrap();
        assert!(store.is_dir("/a"));
        assert!(store.is_dir("/a/b"));
        assert!(store.is_dir("/a/b/c"));
        store.seed("/a/file", "x").unwrap();
        assert_eq!(Err(Errno::AlreadyExists), store.mkdirp("/a/file/d"));
    }

    #[test]
    fn readdir_lists_only_immediate_children() {
        let mut store = Store::new();
        store.seed("/go/src/fmt/print.go", "package fmt").unwrap();
        store.seed("/go/src/errors/errors.go", "package errors").unwrap();
        store.seed("/gopher", "not a child of /go").unwrap();
        assert_eq!(vec!["errors", "fmt"], store.readdir("/go/src").unwrap());
        assert_eq!(vec!["src"], store.readdir("/go").unwrap());
        assert_eq!(vec!["go", "gopher"], store.readdir("/").unwrap());
        assert!(store.readdir("/go/src/fmt/print.go").is_err());
        assert_eq!(Err(Errno::NotFound), store.readdir("/nope"));
    }

    #[test]
    fn unlink_removes_files_only() {
        let mut store = Store::new();
        store.seed("/a/f", "x").unwrap();
        assert_eq!(Err(Errno::IsDir), store.unlink("/a"));
        store.unlink("/a/f").unwrap();
        assert!(store.get("/a/f").is_none());
        assert_eq!(Err(Errno::NotFound), store.unlink("/a/f"));
    }

    #[test]
    fn create_file_requires_parent() {
        let mut store = Store::new();
        assert_eq!(
            Err(Errno::NotFound),
            store.create_file("/missing/f", FileData::default())
        );
        store.seed("/f", "x").unwrap();
        assert_eq!(
            Err(Errno::NotDir),
            store.create_file("/f/g", FileData::default())
        );
    }

    #[test]
    fn seed_dir_allows_nested_names() {
        let mut store = Store::new();
        store
            .seed_dir("/tmp/wd", [("main.go", "package main"), ("sub/x.go", "package sub")])
            .unwrap();
        assert_eq!(vec!["main.go", "sub"], store.readdir("/tmp/wd").unwrap());
        assert!(store.is_dir("/tmp/wd/sub"));
        assert_eq!(
            Err(Errno::Inval),
            store.seed_dir("/tmp/wd", [("../escape", "x")])
        );
    }

    #[test]
    fn remove_tree_removes_descendants() {
        let mut store = Store::new();
        store.seed("/tmp/wd/a/b.txt", "b").unwrap();
        store.seed("/tmp/wd2/c.txt", "c").unwrap();
        store.remove_tree("/tmp/wd").unwrap();
        assert!(!store.exists("/tmp/wd"));
        assert!(!store.exists("/tmp/wd/a"));
        assert!(store.exists("/tmp/wd2/c.txt"));
        assert_eq!(Err(Errno::Inval), store.remove_tree("/"));
    }

    #[test]
    fn growth_preserves_contents() {
        let mut data = FileData::default();
        let mut expected = vec![];
        let mut offset = 0;
        for i in 0..3000u32 {
            let chunk = i.to_le_bytes();
            offset = data.write_at(offset, &chunk).unwrap();
            expected.extend_from_slice(&chunk);
        }
        assert_eq!(expected.len(), data.len());
        assert_eq!(expected.as_slice(), data.bytes());
        assert_eq!(16384, data.capacity());
    }

    #[test]
    fn capacity_doubles_from_baseline() {
        let mut data = FileData::default();
        data.write_at(0, b"x").unwrap();
        assert_eq!(INITIAL_CAPACITY, data.capacity());
        data.write_at(1, &[0; INITIAL_CAPACITY]).unwrap();
        assert_eq!(INITIAL_CAPACITY * 2, data.capacity());
        data.write_at(0, &[0; 5000]).unwrap();
        assert_eq!(INITIAL_CAPACITY * 8, data.capacity());
    }

    #[test]
    fn oversized_writes_fail_cleanly() {
        let mut data = FileData::with_contents("ab");
        assert_eq!(Err(Errno::FileTooBig), data.write_at(usize::MAX, b"x"));
        assert_eq!(Err(Errno::FileTooBig), data.write_at(MAX_FILE_SIZE, b"x"));
        assert_eq!(b"ab", data.bytes());
        assert_eq!(2, data.capacity());
    }

    #[test]
    fn overwrite_in_the_middle_keeps_length() {
        let mut data = FileData::with_contents("hello world");
        data.write_at(0, b"HELLO").unwrap();
        assert_eq!(b"HELLO world", data.bytes());
    }

    #[test]
    fn write_past_end_zero_fills() {
        let mut data = FileData::with_contents("ab");
        data.write_at(4, b"cd").unwrap();
        assert_eq!(b"ab\0\0cd", data.bytes());
    }

    #[test]
    fn read_at_clamps() {
        let data = FileData::with_contents("hello");
        let mut buf = [0; 10];
        assert_eq!(3, data.read_at(2, &mut buf));
        assert_eq!(b"llo", &buf[..3]);
        assert_eq!(0, data.read_at(5, &mut buf));
        assert_eq!(0, data.read_at(50, &mut buf));
    }
}
