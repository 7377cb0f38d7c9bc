//! Plan files waiting to be applied
//!
//! A pull request's working area (the pull dir) holds one checkout per
//! workspace, named after the workspace. Each successful plan leaves a
//! `.tfplan` file in the project's directory inside that checkout. The file
//! name records the project: `<project>-<workspace>.tfplan` for named
//! projects (with `/` written as `::`), `<workspace>.tfplan` otherwise.

use std::path::{Path, PathBuf};

use plancraft_config::paths;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::DiscoveryError;

/// Extension of plan files
pub const PLAN_FILE_EXTENSION: &str = "tfplan";

/// A plan waiting to be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPlan {
    /// Absolute path of the workspace checkout holding the plan
    pub repo_dir: PathBuf,
    /// Repo-relative project dir
    pub repo_rel_dir: String,
    /// Workspace
    pub workspace: String,
    /// Project name encoded in the file name
    pub project_name: Option<String>,
}

/// Enumerates pending plans under a pull dir
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingPlanFinder;

impl PendingPlanFinder {
    /// Finder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Every plan under `pull_dir`, ordered by workspace then dir. A missing
    /// pull dir has no plans.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Io`] when the pull dir or a checkout cannot be read.
    pub fn find(&self, pull_dir: &Path) -> Result<Vec<PendingPlan>, DiscoveryError> {
        let entries = match std::fs::read_dir(pull_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(DiscoveryError::Io {
                    path: pull_dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut plans = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DiscoveryError::Io {
                path: pull_dir.to_path_buf(),
                source,
            })?;
            let repo_dir = entry.path();
            if !repo_dir.is_dir() {
                continue;
            }
            let workspace = entry.file_name().to_string_lossy().into_owned();
            plans.extend(self.find_in_checkout(&repo_dir, &workspace)?);
        }

        plans.sort_by(|a, b| {
            (&a.workspace, &a.repo_rel_dir, &a.project_name)
                .cmp(&(&b.workspace, &b.repo_rel_dir, &b.project_name))
        });
        debug!(count = plans.len(), pull_dir = %pull_dir.display(), "found pending plans");
        Ok(plans)
    }

    fn find_in_checkout(
        &self,
        repo_dir: &Path,
        workspace: &str,
    ) -> Result<Vec<PendingPlan>, DiscoveryError> {
        let mut plans = Vec::new();
        let walker = WalkDir::new(repo_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !(e.depth() > 0 && e.file_type().is_dir() && (name == ".git" || name == ".terraform"))
            });

        for entry in walker {
            let entry = entry.map_err(|e| DiscoveryError::Io {
                path: e.path().map_or_else(|| repo_dir.to_path_buf(), Path::to_path_buf),
                source: e.into(),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().map_or(true, |ext| ext != PLAN_FILE_EXTENSION)
            {
                continue;
            }
            let Ok(rel) = path.strip_prefix(repo_dir) else {
                continue;
            };
            let rel = rel.to_string_lossy();
            let file_name = paths::base_name(&rel.replace('\\', "/")).to_string();
            plans.push(PendingPlan {
                repo_dir: repo_dir.to_path_buf(),
                repo_rel_dir: paths::parent(&rel),
                workspace: workspace.to_string(),
                project_name: project_name_from_plan_file(workspace, &file_name),
            });
        }
        Ok(plans)
    }
}

/// Plan file name for a project
#[must_use]
pub fn plan_file_name(workspace: &str, project_name: Option<&str>) -> String {
    match project_name {
        Some(name) if !name.is_empty() => {
            format!("{}-{workspace}.{PLAN_FILE_EXTENSION}", name.replace('/', "::"))
        }
        _ => format!("{workspace}.{PLAN_FILE_EXTENSION}"),
    }
}

/// Project name encoded in a plan file name; `None` for unnamed projects or
/// files that do not follow the naming scheme
#[must_use]
pub fn project_name_from_plan_file(workspace: &str, file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(&format!(".{PLAN_FILE_EXTENSION}"))?;
    if stem == workspace {
        return None;
    }
    let name = stem.strip_suffix(&format!("-{workspace}"))?;
    (!name.is_empty()).then(|| name.replace("::", "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn plan_file_names_round_trip_project_names() {
        assert_eq!(plan_file_name("default", None), "default.tfplan");
        assert_eq!(plan_file_name("default", Some("")), "default.tfplan");
        assert_eq!(plan_file_name("staging", Some("team/app")), "team::app-staging.tfplan");

        assert_eq!(project_name_from_plan_file("default", "default.tfplan"), None);
        assert_eq!(
            project_name_from_plan_file("staging", "team::app-staging.tfplan").as_deref(),
            Some("team/app")
        );
        assert_eq!(project_name_from_plan_file("workspace1", "workspace.tfplan"), None);
    }

    #[test]
    fn orders_by_workspace_then_dir() {
        let pull = tempfile::tempdir().unwrap();
        touch(&pull.path().join("workspace2/project2/workspace2.tfplan"));
        touch(&pull.path().join("workspace1/project2/workspace1.tfplan"));
        touch(&pull.path().join("workspace2/project1/workspace2.tfplan"));
        touch(&pull.path().join("workspace1/project1/app-workspace1.tfplan"));
        touch(&pull.path().join("workspace1/project1/main.tf"));
        touch(&pull.path().join("workspace1/.terraform/cached.tfplan"));
        touch(&pull.path().join("workspace1/.git/objects/x.tfplan"));

        let plans = PendingPlanFinder::new().find(pull.path()).unwrap();
        let summary: Vec<_> = plans
            .iter()
            .map(|p| (p.workspace.as_str(), p.repo_rel_dir.as_str(), p.project_name.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("workspace1", "project1", Some("app")),
                ("workspace1", "project2", None),
                ("workspace2", "project1", None),
                ("workspace2", "project2", None),
            ]
        );
        assert_eq!(plans[0].repo_dir, pull.path().join("workspace1"));
    }

    #[test]
    fn root_plans_and_missing_pull_dir() {
        let pull = tempfile::tempdir().unwrap();
        touch(&pull.path().join("default/default.tfplan"));
        let plans = PendingPlanFinder::new().find(pull.path()).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].repo_rel_dir, ".");

        let missing = pull.path().join("nope");
        assert!(PendingPlanFinder::new().find(&missing).unwrap().is_empty());
    }
}
