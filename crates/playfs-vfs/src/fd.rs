use std::collections::HashMap;

use crate::{
    error::{Errno, Result},
    stat::OpenFlags,
};

/// A descriptor id handed to the guest.
pub type Fd = u32;

pub const STDIN: Fd = 0;
pub const STDOUT: Fd = 1;
pub const STDERR: Fd = 2;

/// The first id allocated for an opened file.
pub const FIRST_FD: Fd = 1000;

/// An open file: a path to look up in the store and a cursor into it.
///
/// Handles never hold file contents, so every handle on a path sees the writes of every other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub path: String,
    pub offset: usize,
    pub flags: OpenFlags,
}

impl Handle {
    pub fn can_read(&self) -> bool {
        self.flags.readable()
    }

    pub fn can_write(&self) -> bool {
        self.flags.writable()
    }

    pub fn is_append(&self) -> bool {
        self.flags.contains(OpenFlags::APPEND)
    }
}

/// Maps descriptor ids to open [`Handle`]s.
///
/// Ids increase monotonically and are never reused, so a stale descriptor can never alias a newer
/// open.
#[derive(Debug)]
pub struct FdTable {
    handles: HashMap<Fd, Handle>,
    next: Fd,
}

impl FdTable {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
            next: FIRST_FD,
        }
    }

    /// Register a handle at cursor 0 and return its id.
    pub fn open(&mut self, path: String, flags: OpenFlags) -> Fd {
        let fd = self.next;
        self.next += 1;
        self.handles.insert(
            fd,
            Handle {
                path,
                offset: 0,
                flags,
            },
        );
        fd
    }

    pub fn get(&self, fd: Fd) -> Result<&Handle> {
        self.handles.get(&fd).ok_or(Errno::BadFd)
    }

    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut Handle> {
        self.handles.get_mut(&fd).ok_or(Errno::BadFd)
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        self.handles.remove(&fd).map(|_| ()).ok_or(Errno::BadFd)
    }

    /// The number of currently open descriptors.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}
