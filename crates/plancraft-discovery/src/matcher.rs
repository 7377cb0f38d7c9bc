//! Glob matching for `when_modified`, ignore paths and the autoplan file list
//!
//! Patterns follow gitignore-style globs: `*` stays within a path segment,
//! `**` spans segments, matching is case sensitive. Backslashes in paths and
//! patterns are treated as separators.
//!
//! A path outside the directory it is relative to (`../modules/x.tf`) is only
//! matched by patterns that climb out themselves, so `**/*.tf` never reaches
//! into sibling directories.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::DiscoveryError;

/// A compiled list of patterns, matched with logical OR
#[derive(Debug, Clone)]
pub struct PathMatcher {
    inner: GlobSet,
    outer: GlobSet,
    patterns: Vec<String>,
}

impl PathMatcher {
    /// Compile `patterns`
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::InvalidPattern`] for a glob that does not compile.
    pub fn new<I, S>(patterns: I) -> Result<Self, DiscoveryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inner = GlobSetBuilder::new();
        let mut outer = GlobSetBuilder::new();
        let mut kept = Vec::new();

        for raw in patterns {
            let pattern = normalize(raw.as_ref());
            if pattern.is_empty() {
                continue;
            }
            let glob = GlobBuilder::new(&pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| DiscoveryError::InvalidPattern {
                    pattern: raw.as_ref().to_string(),
                    reason: e.kind().to_string(),
                })?;
            if escapes(&pattern) {
                outer.add(glob);
            } else {
                inner.add(glob);
            }
            kept.push(pattern);
        }

        let build = |builder: GlobSetBuilder| {
            builder.build().map_err(|e| DiscoveryError::InvalidPattern {
                pattern: kept.join(","),
                reason: e.to_string(),
            })
        };
        Ok(Self {
            inner: build(inner)?,
            outer: build(outer)?,
            patterns: kept.clone(),
        })
    }

    /// Matcher that matches nothing
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: GlobSet::empty(),
            outer: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    /// Whether there are no patterns
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns in compiled form
    #[inline]
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether any pattern matches `path`
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize(path);
        if escapes(&path) {
            self.outer.is_match(&path)
        } else {
            self.inner.is_match(&path)
        }
    }
}

/// One-shot form of [`PathMatcher::matches`]
///
/// # Errors
///
/// [`DiscoveryError::InvalidPattern`] for a glob that does not compile.
pub fn matches<S: AsRef<str>>(path: &str, patterns: &[S]) -> Result<bool, DiscoveryError> {
    Ok(PathMatcher::new(patterns)?.matches(path))
}

fn normalize(raw: &str) -> String {
    let mut value = raw.trim().replace('\\', "/");
    while let Some(rest) = value.strip_prefix("./") {
        value = rest.to_string();
    }
    value
}

fn escapes(path: &str) -> bool {
    path == ".." || path.starts_with("../")
}
