use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// An error reported by a filesystem operation.
///
/// Each variant corresponds to one POSIX errno. The numeric value (via `u16::from`) and the
/// symbolic name (via [`Errno::code`]) are stable, so guest code that matches on either behaves
/// the same way it would against a real filesystem.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Errno {
    #[error("no such file or directory")]
    NotFound = 2,
    #[error("bad file descriptor")]
    BadFd = 9,
    #[error("file exists")]
    AlreadyExists = 17,
    #[error("not a directory")]
    NotDir = 20,
    #[error("is a directory")]
    IsDir = 21,
    #[error("invalid argument")]
    Inval = 22,
    #[error("file too large")]
    FileTooBig = 27,
    #[error("not implemented")]
    NotImplemented = 38,
}

impl Errno {
    /// The symbolic error code, e.g. `ENOENT`.
    pub fn code(self) -> &'static str {
        match self {
            Errno::NotFound => "ENOENT",
            Errno::BadFd => "EBADF",
            Errno::AlreadyExists => "EEXIST",
            Errno::NotDir => "ENOTDIR",
            Errno::IsDir => "EISDIR",
            Errno::Inval => "EINVAL",
            Errno::FileTooBig => "EFBIG",
            Errno::NotImplemented => "ENOSYS",
        }
    }
}

/// A convenience type alias for `Result<T, Errno>`.
pub type Result<T> = std::result::Result<T, Errno>;
