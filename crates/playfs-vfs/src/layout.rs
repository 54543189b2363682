/// The fixed directories an [`Fs`](crate::Fs) is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Scratch space; guest sessions live beneath it.
    pub tmp: String,
    /// The guest's home directory and initial working directory.
    pub home: String,
    /// Where the guest keeps downloaded modules.
    pub module_cache: String,
    /// Root of the support-library tree.
    pub support_root: String,
}

impl Layout {
    /// The directory bundle entries are seeded into.
    pub fn support_sources(&self) -> String {
        format!("{}/src", self.support_root.trim_end_matches('/'))
    }

    /// Every directory that must exist before the guest starts.
    pub fn directories(&self) -> [&str; 4] {
        [
            &self.tmp,
            &self.home,
            &self.module_cache,
            &self.support_root,
        ]
    }

    pub fn with_home(mut self, home: impl Into<String>) -> Self {
        self.home = home.into();
        self
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            tmp: "/tmp".to_owned(),
            home: "/root".to_owned(),
            module_cache: "/root/go".to_owned(),
            support_root: "/go".to_owned(),
        }
    }
}
