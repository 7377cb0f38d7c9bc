//! Autoplan discovery: which projects a set of changed files affects
//!
//! Configured projects are considered first, in file order, through their
//! `when_modified` patterns. Then, when autodiscover is on, directories
//! holding changed files that match the server's autoplan file list become
//! projects of their own unless config already covers them or an ignore
//! pattern excludes them.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use plancraft_config::{paths, AutoDiscoverMode, ProjectConfig, RepoConfig};
use tracing::debug;

use crate::changeset::ChangeSet;
use crate::error::DiscoveryError;
use crate::matcher::PathMatcher;
use crate::workspace::detect_workspace;

/// A project a build should produce contexts for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// An entry of the repo config
    Configured(ProjectConfig),
    /// A directory without a config entry, built with repo defaults
    Unconfigured {
        /// Repo-relative directory
        dir: String,
        /// Inferred workspace
        workspace: String,
    },
}

impl Candidate {
    /// Repo-relative directory
    #[must_use]
    pub fn dir(&self) -> &str {
        match self {
            Self::Configured(p) => &p.dir,
            Self::Unconfigured { dir, .. } => dir,
        }
    }

    /// Workspace
    #[must_use]
    pub fn workspace(&self) -> &str {
        match self {
            Self::Configured(p) => &p.workspace,
            Self::Unconfigured { workspace, .. } => workspace,
        }
    }
}

/// Knobs for one discovery run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Skip configured projects with `autoplan.enabled: false`
    pub respect_autoplan_enabled: bool,
    /// Server default autodiscover mode
    pub default_autodiscover: AutoDiscoverMode,
}

/// Finds affected projects
#[derive(Debug, Clone)]
pub struct ProjectFinder {
    autoplan_files: PathMatcher,
}

impl ProjectFinder {
    /// Finder using `autoplan_file_list` as the default trigger patterns
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::InvalidPattern`] for a pattern that does not compile.
    pub fn new<S: AsRef<str>>(autoplan_file_list: &[S]) -> Result<Self, DiscoveryError> {
        Ok(Self {
            autoplan_files: PathMatcher::new(autoplan_file_list)?,
        })
    }

    /// Every affected project: configured ones first, then discovered ones
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::InvalidPattern`] for bad `when_modified` or ignore
    /// patterns.
    pub fn discover(
        &self,
        changes: &ChangeSet,
        repo: Option<&RepoConfig>,
        repo_root: &Path,
        options: DiscoveryOptions,
    ) -> Result<Vec<Candidate>, DiscoveryError> {
        let mut out = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        let (autodiscover, ignore) = match repo {
            Some(repo) => {
                for project in self.determine_projects_via_config(
                    changes,
                    repo,
                    Some(repo_root),
                    options.respect_autoplan_enabled,
                )? {
                    // Named entries may share a dir and workspace; validation
                    // already rejects unnamed duplicates.
                    seen.insert((project.dir.clone(), project.workspace.clone()));
                    out.push(Candidate::Configured(project.clone()));
                }
                (
                    repo.autodiscover_enabled(options.default_autodiscover),
                    PathMatcher::new(repo.autodiscover_ignore_paths())?,
                )
            }
            None => (
                options.default_autodiscover != AutoDiscoverMode::Disabled,
                PathMatcher::empty(),
            ),
        };
        debug!(
            configured = out.len(),
            autodiscover, "matched configured projects"
        );

        if autodiscover {
            for dir in self.determine_projects(changes, Some(repo_root)) {
                if ignore.matches(&dir) {
                    debug!(%dir, "ignoring autodiscovered dir");
                    continue;
                }
                if repo.is_some_and(|r| !r.find_projects_by_dir(&dir).is_empty()) {
                    continue;
                }
                let workspace = detect_workspace(repo_root, &dir);
                if seen.insert((dir.clone(), workspace.clone())) {
                    out.push(Candidate::Unconfigured { dir, workspace });
                }
            }
        }
        Ok(out)
    }

    /// Directories owning changed files that match the autoplan file list,
    /// in lexical order. With `repo_root`, dirs missing from the checkout are
    /// dropped and `modules/` ownership is checked on disk.
    #[must_use]
    pub fn determine_projects(&self, changes: &ChangeSet, repo_root: Option<&Path>) -> Vec<String> {
        let mut dirs = BTreeSet::new();
        for file in changes.files() {
            if !self.autoplan_files.matches(file) {
                continue;
            }
            if let Some(dir) = project_dir(file, repo_root) {
                dirs.insert(dir);
            }
        }
        if let Some(root) = repo_root {
            dirs.retain(|d| {
                let exists = root.join(d).is_dir();
                if !exists {
                    debug!(dir = %d, "dropping dir missing from checkout");
                }
                exists
            });
        }
        dirs.into_iter().collect()
    }

    /// Configured projects whose `when_modified` matches a change, in file
    /// order. Without `repo_root` nothing is checked on disk.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::InvalidPattern`] for bad `when_modified` or ignore
    /// patterns.
    pub fn determine_projects_via_config<'c>(
        &self,
        changes: &ChangeSet,
        repo: &'c RepoConfig,
        repo_root: Option<&Path>,
        respect_autoplan_enabled: bool,
    ) -> Result<Vec<&'c ProjectConfig>, DiscoveryError> {
        let ignore = PathMatcher::new(repo.autodiscover_ignore_paths())?;
        let mut out = Vec::new();

        for project in &repo.projects {
            if project.name.is_none() && ignore.matches(&project.dir) {
                debug!(dir = %project.dir, "project dir is ignored");
                continue;
            }
            if respect_autoplan_enabled && !project.autoplan.enabled {
                debug!(dir = %project.dir, "autoplan disabled for project");
                continue;
            }

            let custom;
            let matcher = match &project.autoplan.when_modified {
                Some(patterns) => {
                    custom = PathMatcher::new(patterns)?;
                    &custom
                }
                None => &self.autoplan_files,
            };
            if matcher.is_empty() {
                continue;
            }

            let hit = changes
                .files()
                .any(|f| matcher.matches(&paths::relative_to(&project.dir, f)));
            if !hit {
                continue;
            }
            if let Some(root) = repo_root {
                if !root.join(&project.dir).is_dir() {
                    debug!(dir = %project.dir, "project dir no longer exists");
                    continue;
                }
            }
            out.push(project);
        }
        Ok(out)
    }
}

/// Project dir owning `file`: the file's dir, its parent for `env/` dirs,
/// and for `modules/` trees the dir above `modules/` when it has a
/// `main.tf`.
fn project_dir(file: &str, repo_root: Option<&Path>) -> Option<String> {
    let dir = paths::parent(file);
    if paths::base_name(&dir) == "env" {
        return Some(paths::parent(&dir));
    }

    let wrapped = format!("/{dir}/");
    let Some(idx) = wrapped.find("/modules/") else {
        return Some(dir);
    };
    let owner = wrapped[..idx].trim_start_matches('/');
    if owner.is_empty() {
        return None;
    }
    match repo_root {
        Some(root) if !root.join(owner).join("main.tf").is_file() => None,
        _ => Some(owner.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plancraft_config::{parse_repo_config, UserConfig};
    use pretty_assertions::assert_eq;

    fn finder() -> ProjectFinder {
        ProjectFinder::new(&UserConfig::default().autoplan_file_list).unwrap()
    }

    fn tree(paths: &[&str]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        for p in paths {
            let full = root.path().join(p);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, "").unwrap();
        }
        root
    }

    fn dirs(candidates: &[Candidate]) -> Vec<(&str, &str)> {
        candidates.iter().map(|c| (c.dir(), c.workspace())).collect()
    }

    #[test]
    fn default_finder_plans_root_and_dirs() {
        let root = tree(&["main.tf", "project1/main.tf", "README.md"]);
        let changes = ChangeSet::new(["main.tf", "project1/main.tf", "README.md"]);
        assert_eq!(
            finder().determine_projects(&changes, Some(root.path())),
            [".", "project1"]
        );
    }

    #[test]
    fn env_and_modules_heuristics() {
        let root = tree(&[
            "project1/main.tf",
            "project1/env/prod.tfvars",
            "project1/modules/vpc/main.tf",
            "project2/modules/vpc/main.tf",
            "modules/shared/main.tf",
        ]);
        let changes = ChangeSet::new([
            "project1/env/prod.tfvars",
            "project1/modules/vpc/main.tf",
            "project2/modules/vpc/main.tf",
            "modules/shared/main.tf",
        ]);
        assert_eq!(
            finder().determine_projects(&changes, Some(root.path())),
            ["project1"]
        );
    }

    #[test]
    fn deleted_dirs_are_dropped() {
        let root = tree(&["kept/main.tf"]);
        let changes = ChangeSet::new(["kept/main.tf", "deleted/main.tf"]);
        assert_eq!(finder().determine_projects(&changes, Some(root.path())), ["kept"]);
        assert_eq!(finder().determine_projects(&changes, None), ["deleted", "kept"]);
    }

    #[test]
    fn no_config_discovers_root() {
        let root = tree(&["main.tf"]);
        let changes = ChangeSet::new(["main.tf"]);
        let found = finder()
            .discover(&changes, None, root.path(), DiscoveryOptions::default())
            .unwrap();
        assert_eq!(dirs(&found), [(".", "default")]);
    }

    #[test]
    fn autodiscover_disabled_without_config_finds_nothing() {
        let root = tree(&["main.tf"]);
        let options = DiscoveryOptions {
            default_autodiscover: AutoDiscoverMode::Disabled,
            ..DiscoveryOptions::default()
        };
        let found = finder()
            .discover(&ChangeSet::new(["main.tf"]), None, root.path(), options)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn when_modified_is_relative_to_project() {
        let root = tree(&["project1/main.tf", "project2/main.tf", "modules/a.tf"]);
        let repo = parse_repo_config(
            br#"
version: 3
projects:
- dir: project1
  autoplan:
    when_modified: ["../modules/**/*.tf", "*.tf"]
- dir: project2
"#,
        )
        .unwrap();

        let only_module = ChangeSet::new(["modules/a.tf"]);
        let found = finder()
            .determine_projects_via_config(&only_module, &repo, Some(root.path()), true)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].dir, "project1");
    }

    #[test]
    fn disabled_and_empty_when_modified_are_skipped() {
        let root = tree(&["a/main.tf", "b/main.tf", "c/main.tf"]);
        let repo = parse_repo_config(
            br#"
version: 3
projects:
- dir: a
  autoplan:
    enabled: false
- dir: b
  autoplan:
    when_modified: []
- dir: c
"#,
        )
        .unwrap();
        let changes = ChangeSet::new(["a/main.tf", "b/main.tf", "c/main.tf"]);
        let found = finder()
            .determine_projects_via_config(&changes, &repo, Some(root.path()), true)
            .unwrap();
        assert_eq!(found.iter().map(|p| p.dir.as_str()).collect::<Vec<_>>(), ["c"]);

        let ignoring_enabled = finder()
            .determine_projects_via_config(&changes, &repo, Some(root.path()), false)
            .unwrap();
        assert_eq!(
            ignoring_enabled.iter().map(|p| p.dir.as_str()).collect::<Vec<_>>(),
            ["a", "c"]
        );
    }

    #[test]
    fn autodiscover_merges_with_config() {
        let root = tree(&["project1/main.tf", "project2/main.tf", "project3/main.tf"]);
        let repo = parse_repo_config(
            br#"
version: 3
autodiscover:
  mode: enabled
  ignore_paths: [project3]
projects:
- dir: project1
  workspace: staging
"#,
        )
        .unwrap();
        let changes = ChangeSet::new(["project1/main.tf", "project2/main.tf", "project3/main.tf"]);
        let found = finder()
            .discover(&changes, Some(&repo), root.path(), DiscoveryOptions::default())
            .unwrap();
        assert_eq!(
            dirs(&found),
            [("project1", "staging"), ("project2", "default")]
        );
    }

    #[test]
    fn ignored_named_projects_are_still_planned() {
        let root = tree(&["project1/main.tf", "project2/main.tf"]);
        let repo = parse_repo_config(
            br#"
version: 3
autodiscover:
  mode: enabled
  ignore_paths: [project1]
projects:
- name: one
  dir: project1
"#,
        )
        .unwrap();
        let changes = ChangeSet::new(["project1/main.tf", "project2/main.tf"]);
        let found = finder()
            .discover(&changes, Some(&repo), root.path(), DiscoveryOptions::default())
            .unwrap();
        assert_eq!(dirs(&found), [("project1", "default"), ("project2", "default")]);
        assert!(matches!(&found[0], Candidate::Configured(p) if p.display_name() == "one"));
    }

    #[test]
    fn auto_mode_with_projects_does_not_discover() {
        let root = tree(&["project1/main.tf", "project2/main.tf"]);
        let repo = parse_repo_config(b"version: 3\nprojects:\n- dir: project1\n").unwrap();
        let changes = ChangeSet::new(["project1/main.tf", "project2/main.tf"]);
        let found = finder()
            .discover(&changes, Some(&repo), root.path(), DiscoveryOptions::default())
            .unwrap();
        assert_eq!(dirs(&found), [("project1", "default")]);
    }
}
