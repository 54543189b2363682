use rand::Rng;
use tracing::debug;

use crate::{error::Result, fs::Fs, path};

const TOKEN_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const TOKEN_LEN: usize = 12;

/// A scratch working directory for one guest invocation.
///
/// The directory is created beneath the layout's tmp directory, seeded with the caller's files, and
/// becomes the working directory until [`Session::end`] tears it down.
#[derive(Debug)]
#[must_use = "a session must be ended to remove its working directory"]
pub struct Session {
    dir: String,
    previous_cwd: String,
}

impl Session {
    /// Create a fresh working directory containing `files` and move into it.
    pub fn begin<I, P, B>(fs: &mut Fs, files: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, B)>,
        P: AsRef<str>,
        B: Into<Vec<u8>>,
    {
        let tmp = path::resolve("/", &fs.layout().tmp);
        let mut rng = rand::thread_rng();
        let dir = loop {
            let token: String = (0..TOKEN_LEN)
                .map(|_| char::from(TOKEN_CHARS[rng.gen_range(0..TOKEN_CHARS.len())]))
                .collect();
            let dir = path::join(&tmp, &format!("wd-{token}"));
            if !fs.store().exists(&dir) {
                break dir;
            }
        };

        if let Err(errno) = fs.seed_dir(&dir, files) {
            // A partially seeded directory has no session left to remove it
            let _ = fs.remove_tree(&dir);
            return Err(errno);
        }
        let previous_cwd = fs.cwd().to_owned();
        fs.process_mut().change_dir(&dir);
        debug!(%dir, "started session");
        Ok(Self { dir, previous_cwd })
    }

    /// The session's working directory.
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Flush the guest's output, restore the previous working directory, and remove the session's
    /// directory along with everything the guest wrote into it.
    pub fn end(self, fs: &mut Fs) -> Result<()> {
        fs.flush_stdio();
        fs.process_mut().change_dir(&self.previous_cwd);
        fs.remove_tree(&self.dir)?;
        debug!(dir = %self.dir, "ended session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Errno, layout::Layout, stat::OpenFlags};
    use pretty_assertions::assert_eq;
    use test_log::test;

    #[test]
    fn session_lifecycle() {
        let mut fs = Fs::new(Layout::default()).unwrap();
        let session = Session::begin(&mut fs, [("main.go", "package main")]).unwrap();
        let dir = session.dir().to_owned();

        assert!(dir.starts_with("/tmp/wd-"));
        assert_eq!("/tmp/wd-".len() + TOKEN_LEN, dir.len());
        assert_eq!(dir, fs.cwd());
        assert_eq!(vec!["main.go"], fs.readdir(".").unwrap());

        let fd = fs
            .open("out.txt", OpenFlags::WRONLY | OpenFlags::CREATE, 0o644)
            .unwrap();
        fs.write_all(fd, b"built").unwrap();
        fs.close(fd).unwrap();

        session.end(&mut fs).unwrap();
        assert_eq!("/root", fs.cwd());
        assert!(fs.stat(&dir).is_err());
        assert!(fs.readdir("/tmp").unwrap().is_empty());
    }

    #[test]
    fn failed_seeding_leaves_nothing_behind() {
        let mut fs = Fs::new(Layout::default()).unwrap();
        let files = [("pkg", "a file"), ("pkg/inner.go", "package pkg")];
        assert_eq!(
            Errno::AlreadyExists,
            Session::begin(&mut fs, files).unwrap_err()
        );
        assert!(fs.readdir("/tmp").unwrap().is_empty());
        assert_eq!("/root", fs.cwd());

        let escaping = [("../outside.go", "package main")];
        assert_eq!(Errno::Inval, Session::begin(&mut fs, escaping).unwrap_err());
        assert!(fs.readdir("/tmp").unwrap().is_empty());
    }

    #[test]
    fn sessions_do_not_collide() {
        let mut fs = Fs::new(Layout::default()).unwrap();
        let files: [(&str, &str); 0] = [];
        let a = Session::begin(&mut fs, files).unwrap();
        let b = Session::begin(&mut fs, files).unwrap();
        assert_ne!(a.dir(), b.dir());
        assert_eq!(2, fs.readdir("/tmp").unwrap().len());
        b.end(&mut fs).unwrap();
        assert_eq!(a.dir(), fs.cwd());
        a.end(&mut fs).unwrap();
        assert_eq!("/root", fs.cwd());
    }
}
