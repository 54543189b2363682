//! The fixed call interface between the guest loader and [`Fs`].
//!
//! The loader turns each filesystem-shaped import into a [`Syscall`] and receives exactly one
//! [`Outcome`] back, in the order calls were issued.

use std::fmt;

use itertools::Itertools;
use tracing::trace;

use crate::{
    error::Errno,
    fd::Fd,
    fs::Fs,
    stat::{OpenFlags, Stat},
};

/// A single filesystem request from the guest.
#[derive(Debug)]
pub enum Syscall<'a> {
    Open {
        path: &'a str,
        flags: OpenFlags,
        mode: u32,
    },
    Close {
        fd: Fd,
    },
    Read {
        fd: Fd,
        buf: &'a mut [u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    },
    Write {
        fd: Fd,
        buf: &'a [u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    },
    Mkdir {
        path: &'a str,
        mode: u32,
    },
    Readdir {
        path: &'a str,
    },
    Stat {
        path: &'a str,
    },
    Lstat {
        path: &'a str,
    },
    Fstat {
        fd: Fd,
    },
    Fsync {
        fd: Fd,
    },
    Unlink {
        path: &'a str,
    },
    Chdir {
        path: &'a str,
    },
    Chmod {
        path: &'a str,
        mode: u32,
    },
    Chown {
        path: &'a str,
        uid: u32,
        gid: u32,
    },
    Lchown {
        path: &'a str,
        uid: u32,
        gid: u32,
    },
    Fchmod {
        fd: Fd,
        mode: u32,
    },
    Fchown {
        fd: Fd,
        uid: u32,
        gid: u32,
    },
    Rename {
        from: &'a str,
        to: &'a str,
    },
    Rmdir {
        path: &'a str,
    },
    Truncate {
        path: &'a str,
        len: u64,
    },
    Ftruncate {
        fd: Fd,
        len: u64,
    },
    Symlink {
        target: &'a str,
        link: &'a str,
    },
    Readlink {
        path: &'a str,
    },
    Link {
        path: &'a str,
        link: &'a str,
    },
    Utimes {
        path: &'a str,
        atime_ms: u64,
        mtime_ms: u64,
    },
    Getuid,
    Getgid,
    Geteuid,
    Getegid,
    Getpid,
    Getppid,
    Getgroups,
    Umask {
        mask: u32,
    },
}

impl Syscall<'_> {
    /// The name the guest runtime uses for this call.
    pub fn name(&self) -> &'static str {
        match self {
            Syscall::Open { .. } => "open",
            Syscall::Close { .. } => "close",
            Syscall::Read { .. } => "read",
            Syscall::Write { .. } => "write",
            Syscall::Mkdir { .. } => "mkdir",
            Syscall::Readdir { .. } => "readdir",
            Syscall::Stat { .. } => "stat",
            Syscall::Lstat { .. } => "lstat",
            Syscall::Fstat { .. } => "fstat",
            Syscall::Fsync { .. } => "fsync",
            Syscall::Unlink { .. } => "unlink",
            Syscall::Chdir { .. } => "chdir",
            Syscall::Chmod { .. } => "chmod",
            Syscall::Chown { .. } => "chown",
            Syscall::Lchown { .. } => "lchown",
            Syscall::Fchmod { .. } => "fchmod",
            Syscall::Fchown { .. } => "fchown",
            Syscall::Rename { .. } => "rename",
            Syscall::Rmdir { .. } => "rmdir",
            Syscall::Truncate { .. } => "truncate",
            Syscall::Ftruncate { .. } => "ftruncate",
            Syscall::Symlink { .. } => "symlink",
            Syscall::Readlink { .. } => "readlink",
            Syscall::Link { .. } => "link",
            Syscall::Utimes { .. } => "utimes",
            Syscall::Getuid => "getuid",
            Syscall::Getgid => "getgid",
            Syscall::Geteuid => "geteuid",
            Syscall::Getegid => "getegid",
            Syscall::Getpid => "getpid",
            Syscall::Getppid => "getppid",
            Syscall::Getgroups => "getgroups",
            Syscall::Umask { .. } => "umask",
        }
    }
}

/// The success value of a [`Syscall`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Unit,
    Fd(Fd),
    Count(usize),
    Names(Vec<String>),
    Stat(Stat),
    Path(String),
    /// A user, group or process id.
    Id(i32),
    Groups(Vec<u32>),
    /// The previous file mode creation mask.
    Mask(u32),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "ok"),
            Value::Fd(fd) => write!(f, "fd {fd}"),
            Value::Count(n) => write!(f, "{n} bytes"),
            Value::Names(names) => write!(f, "{}", names.join(" ")),
            Value::Stat(stat) => write!(
                f,
                "{} mode={:o} size={}",
                if stat.is_dir() { "directory" } else { "file" },
                stat.mode,
                stat.size
            ),
            Value::Path(path) => write!(f, "{path}"),
            Value::Id(id) => write!(f, "{id}"),
            Value::Groups(groups) => write!(f, "{}", groups.iter().join(" ")),
            Value::Mask(mask) => write!(f, "{mask:04o}"),
        }
    }
}

/// What a [`Syscall`] reports back: exactly one per call.
pub type Outcome = Result<Value, Errno>;

impl Fs {
    /// Run a single call to completion and report its outcome.
    pub fn dispatch(&mut self, call: Syscall<'_>) -> Outcome {
        let name = call.name();
        let outcome = self.run(call);
        match &outcome {
            Ok(value) => trace!(call = name, %value, "syscall"),
            Err(errno) => trace!(call = name, code = errno.code(), "syscall failed"),
        }
        outcome
    }

    /// Run a single call, delivering its outcome to `callback`.
    ///
    /// The callback runs exactly once, before this returns.
    pub fn dispatch_with<F>(&mut self, call: Syscall<'_>, callback: F)
    where
        F: FnOnce(Outcome),
    {
        callback(self.dispatch(call));
    }

    fn run(&mut self, call: Syscall<'_>) -> Outcome {
        let unit = |result: Result<(), Errno>| result.map(|()| Value::Unit);
        match call {
            Syscall::Open { path, flags, mode } => self.open(path, flags, mode).map(Value::Fd),
            Syscall::Close { fd } => unit(self.close(fd)),
            Syscall::Read {
                fd,
                buf,
                offset,
                length,
                position,
            } => self
                .read(fd, buf, offset, length, position)
                .map(Value::Count),
            Syscall::Write {
                fd,
                buf,
                offset,
                length,
                position,
            } => self
                .write(fd, buf, offset, length, position)
                .map(Value::Count),
            Syscall::Mkdir { path, mode } => unit(self.mkdir(path, mode)),
            Syscall::Readdir { path } => self.readdir(path).map(Value::Names),
            Syscall::Stat { path } => self.stat(path).map(Value::Stat),
            Syscall::Lstat { path } => self.lstat(path).map(Value::Stat),
            Syscall::Fstat { fd } => self.fstat(fd).map(Value::Stat),
            Syscall::Fsync { fd } => unit(self.fsync(fd)),
            Syscall::Unlink { path } => unit(self.unlink(path)),
            Syscall::Chdir { path } => unit(self.chdir(path)),
            Syscall::Chmod { path, mode } => unit(self.chmod(path, mode)),
            Syscall::Chown { path, uid, gid } => unit(self.chown(path, uid, gid)),
            Syscall::Lchown { path, uid, gid } => unit(self.lchown(path, uid, gid)),
            Syscall::Fchmod { fd, mode } => unit(self.fchmod(fd, mode)),
            Syscall::Fchown { fd, uid, gid } => unit(self.fchown(fd, uid, gid)),
            Syscall::Rename { from, to } => unit(self.rename(from, to)),
            Syscall::Rmdir { path } => unit(self.rmdir(path)),
            Syscall::Truncate { path, len } => unit(self.truncate(path, len)),
            Syscall::Ftruncate { fd, len } => unit(self.ftruncate(fd, len)),
            Syscall::Symlink { target, link } => unit(self.symlink(target, link)),
            Syscall::Readlink { path } => self.readlink(path).map(Value::Path),
            Syscall::Link { path, link } => unit(self.link(path, link)),
            Syscall::Utimes {
                path,
                atime_ms,
                mtime_ms,
            } => unit(self.utimes(path, atime_ms, mtime_ms)),
            Syscall::Getuid => Ok(Value::Id(self.process().uid())),
            Syscall::Getgid => Ok(Value::Id(self.process().gid())),
            Syscall::Geteuid => Ok(Value::Id(self.process().euid())),
            Syscall::Getegid => Ok(Value::Id(self.process().egid())),
            Syscall::Getpid => Ok(Value::Id(self.process().pid())),
            Syscall::Getppid => Ok(Value::Id(self.process().ppid())),
            Syscall::Getgroups => self.process().groups().map(Value::Groups),
            Syscall::Umask { mask } => self.process_mut().umask(mask).map(Value::Mask),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use pretty_assertions::assert_eq;
    use test_log::test;

    fn fs() -> Fs {
        Fs::new(Layout::default()).unwrap()
    }

    macro_rules! not_implemented {
        ($($name:ident => $call:expr;)*) => {
            $(
                paste::paste! {
                    #[test]
                    fn [<$name _is_not_implemented>]() {
                        let mut fs = fs();
                        fs.seed("/root/file", "contents").unwrap();
                        assert_eq!(Err(Errno::NotImplemented), fs.dispatch($call));
                        assert_eq!(8, fs.stat("/root/file").unwrap().size);
                    }
                }
            )*
        };
    }

    not_implemented! {
        rename => Syscall::Rename { from: "file", to: "other" };
        rmdir => Syscall::Rmdir { path: "/tmp" };
        truncate => Syscall::Truncate { path: "file", len: 0 };
        ftruncate => Syscall::Ftruncate { fd: 1000, len: 0 };
        symlink => Syscall::Symlink { target: "file", link: "link" };
        readlink => Syscall::Readlink { path: "file" };
        link => Syscall::Link { path: "file", link: "hard" };
        utimes => Syscall::Utimes { path: "file", atime_ms: 0, mtime_ms: 0 };
    }

    #[test]
    fn dispatch_open_write_read() {
        let mut fs = fs();
        let Ok(Value::Fd(fd)) = fs.dispatch(Syscall::Open {
            path: "hello.txt",
            flags: OpenFlags::RDWR | OpenFlags::CREATE,
            mode: 0o644,
        }) else {
            panic!("open should succeed");
        };
        let data = b"hello";
        assert_eq!(
            Ok(Value::Count(5)),
            fs.dispatch(Syscall::Write {
                fd,
                buf: data,
                offset: 0,
                length: data.len(),
                position: None,
            })
        );
        let mut buf = [0; 16];
        assert_eq!(
            Ok(Value::Count(5)),
            fs.dispatch(Syscall::Read {
                fd,
                buf: &mut buf,
                offset: 0,
                length: 16,
                position: Some(0),
            })
        );
        assert_eq!(b"hello", &buf[..5]);
        assert_eq!(Ok(Value::Unit), fs.dispatch(Syscall::Close { fd }));
        assert_eq!(Err(Errno::BadFd), fs.dispatch(Syscall::Close { fd }));
    }

    #[test]
    fn dispatch_with_reports_once() {
        let mut fs = fs();
        let mut outcomes = vec![];
        fs.dispatch_with(Syscall::Stat { path: "/missing" }, |outcome| {
            outcomes.push(outcome);
        });
        fs.dispatch_with(Syscall::Mkdir { path: "/tmp/x", mode: 0o755 }, |outcome| {
            outcomes.push(outcome);
        });
        fs.dispatch_with(Syscall::Readdir { path: "/tmp" }, |outcome| {
            outcomes.push(outcome);
        });
        assert_eq!(
            vec![
                Err(Errno::NotFound),
                Ok(Value::Unit),
                Ok(Value::Names(vec!["x".to_owned()])),
            ],
            outcomes
        );
    }

    #[test]
    fn permission_calls_succeed() {
        let mut fs = fs();
        assert_eq!(
            Ok(Value::Unit),
            fs.dispatch(Syscall::Chmod { path: "/nowhere", mode: 0o777 })
        );
        assert_eq!(
            Ok(Value::Unit),
            fs.dispatch(Syscall::Lchown { path: "/", uid: 0, gid: 0 })
        );
        assert_eq!(
            Ok(Value::Unit),
            fs.dispatch(Syscall::Fchown { fd: 1, uid: 0, gid: 0 })
        );
    }

    #[test]
    fn process_identity_is_unknown() {
        let mut fs = fs();
        for call in [
            Syscall::Getuid,
            Syscall::Getgid,
            Syscall::Geteuid,
            Syscall::Getegid,
            Syscall::Getpid,
            Syscall::Getppid,
        ] {
            assert_eq!(Ok(Value::Id(-1)), fs.dispatch(call));
        }
        assert_eq!(Err(Errno::NotImplemented), fs.dispatch(Syscall::Getgroups));
        assert_eq!(
            Err(Errno::NotImplemented),
            fs.dispatch(Syscall::Umask { mask: 0o022 })
        );
    }

    #[test]
    fn stat_values_display() {
        let mut fs = fs();
        let stat = fs.dispatch(Syscall::Lstat { path: "/go" }).unwrap();
        insta::assert_snapshot!(stat, @"directory mode=40000 size=0");
        fs.seed("/root/a.txt", "abc").unwrap();
        let stat = fs.dispatch(Syscall::Stat { path: "a.txt" }).unwrap();
        insta::assert_snapshot!(stat, @"file mode=100000 size=3");
    }
}
