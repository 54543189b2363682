use bitflags::bitflags;

bitflags! {
    /// Flags accepted by [`Fs::open`](crate::Fs::open).
    ///
    /// The bit values are the ones the guest runtime expects. An empty set opens read-only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        const WRONLY = 1 << 0;
        const RDWR = 1 << 1;
        const CREATE = 1 << 2;
        const TRUNC = 1 << 3;
        const APPEND = 1 << 4;
        const EXCL = 1 << 5;
    }
}

impl OpenFlags {
    pub fn readable(self) -> bool {
        !self.contains(Self::WRONLY)
    }

    pub fn writable(self) -> bool {
        self.intersects(Self::WRONLY | Self::RDWR)
    }
}

/// Bit mask for the file type bit field of [`Stat::mode`].
pub const S_IFMT: u32 = 0o170000;
/// Directory file type.
pub const S_IFDIR: u32 = 0o040000;
/// Regular file type.
pub const S_IFREG: u32 = 0o100000;

/// Attributes reported by `stat`, `lstat` and `fstat`.
///
/// Only `mode` and `size` carry information; the remaining fields exist because the guest reads
/// them, and are always zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    pub mode: u32,
    pub size: u64,
    pub dev: u64,
    pub ino: u64,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime_ms: u64,
    pub mtime_ms: u64,
    pub ctime_ms: u64,
}

impl Stat {
    pub(crate) fn new(is_dir: bool, size: usize) -> Self {
        Self {
            mode: if is_dir { S_IFDIR } else { S_IFREG },
            size: size as u64,
            ..Default::default()
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_modes() {
        assert!(OpenFlags::empty().readable());
        assert!(!OpenFlags::empty().writable());
        assert!(!OpenFlags::WRONLY.readable());
        assert!(OpenFlags::WRONLY.writable());
        assert!(OpenFlags::RDWR.readable());
        assert!(OpenFlags::RDWR.writable());
        assert_eq!(
            Some(OpenFlags::WRONLY | OpenFlags::CREATE | OpenFlags::TRUNC),
            OpenFlags::from_bits(0b1101)
        );
    }

    #[test]
    fn mode_bits() {
        let dir = Stat::new(true, 0);
        assert!(dir.is_dir());
        assert!(!dir.is_file());
        assert_eq!(0o040000, dir.mode);
        let file = Stat::new(false, 12);
        assert!(file.is_file());
        assert_eq!(12, file.size);
        assert_eq!(0, file.nlink);
    }
}
