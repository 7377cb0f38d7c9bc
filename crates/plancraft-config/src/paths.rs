//! Repo-relative path helpers
//!
//! Every path handled by plancraft is relative to the checkout root, uses
//! `/` as separator and is written `.` for the root itself.

use crate::error::ConfigError;

/// Clean a relative path: unify separators, drop `.` and empty segments,
/// resolve `..` where possible. Leading `..` segments that cannot be
/// resolved are kept.
#[must_use]
pub fn clean(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Normalize a directory from config or a command, rejecting anything
/// outside the checkout.
///
/// # Errors
///
/// [`ConfigError::InvalidDir`] for absolute paths and paths that climb
/// above the root.
pub fn normalize_repo_dir(raw: &str) -> Result<String, ConfigError> {
    let unified = raw.trim().replace('\\', "/");
    let bytes = unified.as_bytes();
    let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if unified.starts_with('/') || has_drive {
        return Err(ConfigError::invalid_dir(raw, "must be relative to the repo root"));
    }
    let cleaned = clean(&unified);
    if cleaned == ".." || cleaned.starts_with("../") {
        return Err(ConfigError::invalid_dir(raw, "cannot be outside the repo root"));
    }
    Ok(cleaned)
}

/// Directory containing a file (`.` for files at the root)
#[must_use]
pub fn parent(path: &str) -> String {
    let cleaned = clean(path);
    match cleaned.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => ".".to_string(),
    }
}

/// Final segment of a path
#[must_use]
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Join a child onto a repo-relative directory
#[must_use]
pub fn join(dir: &str, child: &str) -> String {
    if dir == "." {
        clean(child)
    } else {
        clean(&format!("{dir}/{child}"))
    }
}

/// `path` expressed relative to `base` (both repo-relative).
///
/// Paths outside `base` come back with leading `../` segments.
#[must_use]
pub fn relative_to(base: &str, path: &str) -> String {
    let base = clean(base);
    let path = clean(path);
    if base == "." {
        return path;
    }
    let base_parts: Vec<&str> = base.split('/').collect();
    let path_parts: Vec<&str> = if path == "." {
        Vec::new()
    } else {
        path.split('/').collect()
    };
    let common = base_parts
        .iter()
        .zip(&path_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out: Vec<&str> = std::iter::repeat("..")
        .take(base_parts.len() - common)
        .collect();
    out.extend(&path_parts[common..]);
    if out.is_empty() {
        ".".to_string()
    } else {
        out.join("/")
    }
}

/// Whether `dir` is `path` itself or one of its ancestors
#[must_use]
pub fn is_ancestor_or_self(dir: &str, path: &str) -> bool {
    let dir = clean(dir);
    let path = clean(path);
    dir == "." || dir == path || path.starts_with(&format!("{dir}/"))
}
