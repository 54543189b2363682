use playfs_bundle::Bundle;
use tracing::debug;

use crate::{
    error::{Errno, Result},
    fd::{Fd, FdTable, STDERR, STDOUT},
    layout::Layout,
    path,
    process::Process,
    stat::{OpenFlags, Stat},
    stdio::{Sink, Stdio, Stream},
    store::{FileData, Node, Store},
};

/// The in-memory filesystem as the guest sees it.
///
/// Every guest-facing method reports exactly one outcome, either a value or an [`Errno`]. Relative
/// paths are resolved against the working directory held in [`Process`].
#[derive(Debug)]
pub struct Fs {
    store: Store,
    fds: FdTable,
    process: Process,
    stdio: Stdio,
    layout: Layout,
}

impl Fs {
    /// Create a filesystem holding the directories of `layout`, with the home directory as the
    /// working directory.
    pub fn new(layout: Layout) -> Result<Self> {
        let mut store = Store::new();
        for dir in layout.directories() {
            store.mkdirp(&path::resolve("/", dir))?;
        }
        Ok(Self {
            store,
            fds: FdTable::new(),
            process: Process::new(&layout.home),
            stdio: Stdio::default(),
            layout,
        })
    }

    /// Replace the sink receiving the guest's standard output and error.
    pub fn with_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.stdio.flush();
        self.stdio = Stdio::new(sink);
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn process(&self) -> &Process {
        &self.process
    }

    pub fn process_mut(&mut self) -> &mut Process {
        &mut self.process
    }

    /// The number of descriptors currently open, excluding the standard streams.
    pub fn open_fds(&self) -> usize {
        self.fds.len()
    }

    // Initialization primitives. These are never reachable from the guest.

    /// Seed every entry of `bundle` beneath the support sources directory.
    pub fn load_bundle(&mut self, bundle: &Bundle) -> Result<()> {
        let root = path::resolve("/", &self.layout.support_sources());
        self.store.seed_dir(&root, bundle.iter())?;
        debug!(%root, files = bundle.len(), "loaded support bundle");
        Ok(())
    }

    /// Install a file with fixed contents, creating its ancestors.
    pub fn seed(&mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Result<()> {
        let path = self.process.resolve(path);
        self.store.seed(&path, bytes)
    }

    /// Create `dir` and install `files` (named relative to it) beneath it.
    pub fn seed_dir<I, P, B>(&mut self, dir: &str, files: I) -> Result<()>
    where
        I: IntoIterator<Item = (P, B)>,
        P: AsRef<str>,
        B: Into<Vec<u8>>,
    {
        let dir = self.process.resolve(dir);
        self.store.seed_dir(&dir, files)
    }

    /// Create a directory and all of its missing ancestors.
    pub fn mkdirp(&mut self, dir: &str) -> Result<()> {
        let dir = self.process.resolve(dir);
        self.store.mkdirp(&dir)
    }

    /// Remove a directory and everything beneath it.
    pub fn remove_tree(&mut self, dir: &str) -> Result<()> {
        let dir = self.process.resolve(dir);
        self.store.remove_tree(&dir)
    }

    /// Emit any unterminated output line still buffered for the guest's standard streams.
    pub fn flush_stdio(&mut self) {
        self.stdio.flush();
    }

    // Guest-facing operations.

    pub fn cwd(&self) -> &str {
        self.process.cwd()
    }

    /// Change the working directory. The target must be an existing directory.
    pub fn chdir(&mut self, path: &str) -> Result<()> {
        let path = self.process.resolve(path);
        match self.store.get(&path) {
            Some(Node::Directory) => {}
            Some(Node::File(_)) => return Err(Errno::NotDir),
            None => return Err(Errno::NotFound),
        }
        self.process.change_dir(&path);
        Ok(())
    }

    /// Open `path` and return a new descriptor positioned at the start of the file.
    ///
    /// This will return:
    /// - Errno::NotFound if the path does not exist and `CREATE` is not set
    /// - Errno::AlreadyExists if the path exists and both `CREATE` and `EXCL` are set
    /// - Errno::IsDir if a directory is opened for writing or truncation
    ///
    /// Directories may be opened read-only so they can be inspected through `fstat`.
    pub fn open(&mut self, path: &str, flags: OpenFlags, _mode: u32) -> Result<Fd> {
        let path = self.process.resolve(path);
        let exclusive = flags.contains(OpenFlags::CREATE | OpenFlags::EXCL);
        match self.store.get(&path) {
            None if flags.contains(OpenFlags::CREATE) => {
                self.store.create_file(&path, FileData::default())?;
            }
            None => return Err(Errno::NotFound),
            Some(_) if exclusive => return Err(Errno::AlreadyExists),
            Some(Node::Directory) => {
                if flags.writable() || flags.contains(OpenFlags::TRUNC) {
                    return Err(Errno::IsDir);
                }
            }
            Some(Node::File(_)) => {
                if flags.contains(OpenFlags::TRUNC) {
                    self.store.create_file(&path, FileData::default())?;
                }
            }
        }
        Ok(self.fds.open(path, flags))
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        self.fds.close(fd)
    }

    /// Read up to `length` bytes into `buf[offset..]` from the descriptor's cursor.
    ///
    /// If `position` is given, the cursor is moved there first. Returns the number of bytes
    /// copied, which is zero at end of file.
    pub fn read(
        &mut self,
        fd: Fd,
        buf: &mut [u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    ) -> Result<usize> {
        let handle = self.fds.get_mut(fd)?;
        if !handle.can_read() {
            return Err(Errno::BadFd);
        }
        if offset > buf.len() {
            return Err(Errno::Inval);
        }
        let data = match self.store.get(&handle.path) {
            Some(Node::File(data)) => data,
            Some(Node::Directory) => return Err(Errno::IsDir),
            None => return Err(Errno::NotFound),
        };
        if let Some(position) = position {
            handle.offset = usize::try_from(position).ok().ok_or(Errno::Inval)?;
        }

        let end = offset + length.min(buf.len() - offset);
        let n = data.read_at(handle.offset, &mut buf[offset..end]);
        handle.offset += n;
        Ok(n)
    }

    /// Write an entire buffer at the descriptor's cursor.
    ///
    /// Only whole-buffer writes at the current cursor are supported; any other combination of
    /// arguments reports Errno::NotImplemented and leaves everything untouched.
    pub fn write(
        &mut self,
        fd: Fd,
        buf: &[u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    ) -> Result<usize> {
        if offset != 0 || length != buf.len() || position.is_some() {
            return Err(Errno::NotImplemented);
        }
        self.write_all(fd, buf)
    }

    /// Write `buf` at the descriptor's cursor (or at end of file for `APPEND` descriptors) and
    /// advance the cursor past it.
    ///
    /// Descriptors 1 and 2 bypass the store and go to the standard stream sink.
    pub fn write_all(&mut self, fd: Fd, buf: &[u8]) -> Result<usize> {
        match fd {
            STDOUT => {
                self.stdio.write(Stream::Stdout, buf);
                return Ok(buf.len());
            }
            STDERR => {
                self.stdio.write(Stream::Stderr, buf);
                return Ok(buf.len());
            }
            _ => {}
        }

        let handle = self.fds.get_mut(fd)?;
        if !handle.can_write() {
            return Err(Errno::BadFd);
        }
        let data = match self.store.get_mut(&handle.path) {
            Some(Node::File(data)) => data,
            Some(Node::Directory) => return Err(Errno::IsDir),
            None => return Err(Errno::NotFound),
        };
        let offset = if handle.is_append() {
            data.len()
        } else {
            handle.offset
        };
        handle.offset = data.write_at(offset, buf)?;
        Ok(buf.len())
    }

    /// Create a single directory. Its parent must already exist.
    pub fn mkdir(&mut self, path: &str, _mode: u32) -> Result<()> {
        let path = self.process.resolve(path);
        self.store.mkdir(&path)
    }

    /// List the names directly beneath a directory, in no particular order.
    pub fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let path = self.process.resolve(path);
        self.store.readdir(&path)
    }

    pub fn stat(&self, path: &str) -> Result<Stat> {
        let path = self.process.resolve(path);
        self.stat_resolved(&path)
    }

    /// Identical to [`Fs::stat`]; there are no symbolic links to distinguish.
    pub fn lstat(&self, path: &str) -> Result<Stat> {
        self.stat(path)
    }

    pub fn fstat(&self, fd: Fd) -> Result<Stat> {
        let handle = self.fds.get(fd)?;
        self.stat_resolved(&handle.path)
    }

    pub fn fsync(&self, fd: Fd) -> Result<()> {
        self.check_fd(fd)
    }

    /// Remove a regular file. Later lookups of `path` fail with Errno::NotFound, including reads
    /// and writes through descriptors that were open on it.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let path = self.process.resolve(path);
        self.store.unlink(&path)
    }

    // There is no permission model, so these succeed without doing anything.

    pub fn chmod(&mut self, _path: &str, _mode: u32) -> Result<()> {
        Ok(())
    }

    pub fn chown(&mut self, _path: &str, _uid: u32, _gid: u32) -> Result<()> {
        Ok(())
    }

    pub fn lchown(&mut self, _path: &str, _uid: u32, _gid: u32) -> Result<()> {
        Ok(())
    }

    pub fn fchmod(&mut self, fd: Fd, _mode: u32) -> Result<()> {
        self.check_fd(fd)
    }

    pub fn fchown(&mut self, fd: Fd, _uid: u32, _gid: u32) -> Result<()> {
        self.check_fd(fd)
    }

    // Unsupported operations.

    pub fn rename(&mut self, _from: &str, _to: &str) -> Result<()> {
        Err(Errno::NotImplemented)
    }

    pub fn rmdir(&mut self, _path: &str) -> Result<()> {
        Err(Errno::NotImplemented)
    }

    pub fn truncate(&mut self, _path: &str, _len: u64) -> Result<()> {
        Err(Errno::NotImplemented)
    }

    pub fn ftruncate(&mut self, _fd: Fd, _len: u64) -> Result<()> {
        Err(Errno::NotImplemented)
    }

    pub fn symlink(&mut self, _target: &str, _link: &str) -> Result<()> {
        Err(Errno::NotImplemented)
    }

    pub fn readlink(&self, _path: &str) -> Result<String> {
        Err(Errno::NotImplemented)
    }

    pub fn link(&mut self, _path: &str, _link: &str) -> Result<()> {
        Err(Errno::NotImplemented)
    }

    pub fn utimes(&mut self, _path: &str, _atime_ms: u64, _mtime_ms: u64) -> Result<()> {
        Err(Errno::NotImplemented)
    }

    fn stat_resolved(&self, path: &str) -> Result<Stat> {
        let node = self.store.get(path).ok_or(Errno::NotFound)?;
        Ok(Stat::new(node.is_dir(), node.size()))
    }

    fn check_fd(&self, fd: Fd) -> Result<()> {
        if fd <= STDERR {
            return Ok(());
        }
        self.fds.get(fd).map(|_| ())
    }
}
