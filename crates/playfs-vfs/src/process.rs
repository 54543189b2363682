use crate::{
    error::{Errno, Result},
    path,
};

/// Process-wide state the guest observes alongside the filesystem.
///
/// There is no real process behind the guest, so every identity query reports `-1`.
#[derive(Debug, Clone)]
pub struct Process {
    cwd: String,
}

impl Process {
    /// Create a process whose working directory is `home`.
    pub fn new(home: &str) -> Self {
        Self {
            cwd: path::resolve("/", home),
        }
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Move the working directory. The target is not checked for existence.
    pub fn change_dir(&mut self, path: &str) {
        self.cwd = path::resolve(&self.cwd, path);
    }

    /// Resolve `path` against the working directory.
    pub fn resolve(&self, path: &str) -> String {
        path::resolve(&self.cwd, path)
    }

    pub fn uid(&self) -> i32 {
        -1
    }

    pub fn gid(&self) -> i32 {
        -1
    }

    pub fn euid(&self) -> i32 {
        -1
    }

    pub fn egid(&self) -> i32 {
        -1
    }

    pub fn pid(&self) -> i32 {
        -1
    }

    pub fn ppid(&self) -> i32 {
        -1
    }

    pub fn groups(&self) -> Result<Vec<u32>> {
        Err(Errno::NotImplemented)
    }

    pub fn umask(&mut self, _mask: u32) -> Result<u32> {
        Err(Errno::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_dir_is_permissive() {
        let mut process = Process::new("/root");
        assert_eq!("/root", process.cwd());
        process.change_dir("does/not/exist");
        assert_eq!("/root/does/not/exist", process.cwd());
        process.change_dir("../../..");
        assert_eq!("/root", process.cwd());
        process.change_dir("/tmp");
        assert_eq!("/tmp/x", process.resolve("x"));
    }

    #[test]
    fn identity_is_unknown() {
        let mut process = Process::new("/root");
        assert_eq!(-1, process.uid());
        assert_eq!(-1, process.pid());
        assert_eq!(Err(Errno::NotImplemented), process.groups());
        assert_eq!(Err(Errno::NotImplemented), process.umask(0o22));
    }
}
