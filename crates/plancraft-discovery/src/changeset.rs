//! The set of paths a pull request changes

use std::collections::BTreeSet;

use plancraft_config::paths;

/// Modified paths, optionally unioned with untracked paths, repo-relative
/// and in lexical order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    files: BTreeSet<String>,
}

impl ChangeSet {
    /// Change set of `modified` paths
    #[must_use]
    pub fn new<I, S>(modified: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::default().with_untracked(modified)
    }

    /// Add untracked paths
    #[must_use]
    pub fn with_untracked<I, S>(mut self, untracked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.files.extend(
            untracked
                .into_iter()
                .map(|p| paths::clean(p.as_ref()))
                .filter(|p| p != "."),
        );
        self
    }

    /// Paths in lexical order
    pub fn files(&self) -> impl Iterator<Item = &str> + '_ {
        self.files.iter().map(String::as_str)
    }

    /// Number of paths
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing changed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Directories containing changed paths
    #[must_use]
    pub fn dirs(&self) -> BTreeSet<String> {
        self.files.iter().map(|f| paths::parent(f)).collect()
    }

    /// Whether `dir` is, or is an ancestor of, a changed path's directory
    #[must_use]
    pub fn touches_dir(&self, dir: &str) -> bool {
        self.dirs().iter().any(|d| paths::is_ancestor_or_self(dir, d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unions_and_normalizes() {
        let changes = ChangeSet::new(["./b/main.tf", "a\\main.tf"]).with_untracked(["b/main.tf", "c.tf"]);
        assert_eq!(changes.files().collect::<Vec<_>>(), ["a/main.tf", "b/main.tf", "c.tf"]);
        assert_eq!(changes.len(), 3);
        assert_eq!(
            changes.dirs().into_iter().collect::<Vec<_>>(),
            [".", "a", "b"]
        );
    }

    #[test]
    fn touches_ancestors_only() {
        let changes = ChangeSet::new(["directory-2/sub/main.tf"]);
        assert!(changes.touches_dir("directory-2"));
        assert!(changes.touches_dir("directory-2/sub"));
        assert!(changes.touches_dir("."));
        assert!(!changes.touches_dir("directory-1"));
        assert!(!changes.touches_dir("directory-2/sub/deeper"));
    }
}
