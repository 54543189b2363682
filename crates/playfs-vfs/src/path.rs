//! Pure path arithmetic over `/`-separated strings.
//!
//! Paths in the store are always absolute, normalized, and carry no trailing slash (except for the
//! root itself). Nothing here touches the store.

/// Canonicalize `path` against the working directory `cwd`.
///
/// Absolute paths ignore `cwd`. Empty and `.` segments are dropped, and `..` pops the last
/// retained segment; popping past the root is a no-op.
pub fn resolve(cwd: &str, path: &str) -> String {
    let mut segments: Vec<&str> = vec![];
    let base = if path.starts_with('/') { "" } else { cwd };
    for segment in base.split('/').chain(path.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    let mut resolved = String::with_capacity(path.len() + cwd.len() + 1);
    for segment in segments {
        resolved.push('/');
        resolved.push_str(segment);
    }
    if resolved.is_empty() {
        resolved.push('/');
    }
    resolved
}

/// Every directory from the root down to and including `path`.
///
/// `path` must already be normalized.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut result = vec!["/".to_owned()];
    let mut current = String::with_capacity(path.len());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        result.push(current.clone());
    }
    result
}

/// The parent directory of a normalized path, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// The final segment of a normalized path. The root has an empty basename.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

/// Join a child name onto a normalized directory path.
pub(crate) fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Returns the name of `path` relative to `dir` if it is an immediate child of `dir`.
pub(crate) fn child_name<'a>(dir: &str, path: &'a str) -> Option<&'a str> {
    let rest = if dir == "/" {
        path.strip_prefix('/')?
    } else {
        path.strip_prefix(dir)?.strip_prefix('/')?
    };
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

/// Returns `true` if `path` is `dir` or lies anywhere beneath it.
pub(crate) fn is_within(dir: &str, path: &str) -> bool {
    if dir == "/" {
        return true;
    }
    path.strip_prefix(dir)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
