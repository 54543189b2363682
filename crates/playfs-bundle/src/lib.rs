//! The compact encoding of the read-only support tree.
//!
//! A bundle is a JSON object mapping `/`-separated relative file names to base64-encoded file
//! contents:
//!
//! ```json
//! {"errors/errors.go": "cGFja2FnZSBlcnJvcnM="}
//! ```
//!
//! It is embedded in the host at compile time and decoded once at startup.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("malformed bundle: {0}")]
    Json(#[from] serde_json::Error),
    #[error("entry `{name}` is not valid base64: {source}")]
    Base64 {
        name: String,
        source: base64::DecodeError,
    },
    #[error("invalid entry name `{0}`")]
    InvalidName(String),
}

/// A convenience type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// A set of named files, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    entries: BTreeMap<String, Vec<u8>>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a bundle from its JSON form.
    pub fn decode(input: &str) -> Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_str(input)?;
        let mut bundle = Self::new();
        for (name, encoded) in raw {
            let bytes = match STANDARD.decode(encoded.as_bytes()) {
                Ok(bytes) => bytes,
                Err(source) => return Err(Error::Base64 { name, source }),
            };
            bundle.insert(name, bytes)?;
        }
        Ok(bundle)
    }

    /// Encode the bundle to its JSON form.
    pub fn encode(&self) -> Result<String> {
        let raw: BTreeMap<&str, String> = self
            .entries
            .iter()
            .map(|(name, bytes)| (name.as_str(), STANDARD.encode(bytes)))
            .collect();
        Ok(serde_json::to_string_pretty(&raw)?)
    }

    /// Collect every regular file beneath `root`, named relative to it.
    pub fn from_dir(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut bundle = Self::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if fs::metadata(&path)?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let name = relative_name(root, &path)?;
                bundle.insert(name, fs::read(&path)?)?;
            }
        }
        debug!(root = %root.display(), files = bundle.len(), "collected bundle");
        Ok(bundle)
    }

    /// Add a file, replacing any previous entry with the same name.
    ///
    /// Names must be relative and must not contain empty, `.` or `..` segments.
    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<()> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .split('/')
                .all(|segment| !matches!(segment, "" | "." | ".."));
        if !valid {
            return Err(Error::InvalidName(name));
        }
        self.entries.insert(name, bytes.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Iterate over `(name, contents)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let invalid = || Error::InvalidName(path.display().to_string());
    let relative: PathBuf = path.strip_prefix(root).ok().ok_or_else(invalid)?.into();
    let segments = relative
        .components()
        .map(|component| component.as_os_str().to_str().ok_or_else(invalid))
        .collect::<Result<Vec<_>>>()?;
    Ok(segments.join("/"))
}
