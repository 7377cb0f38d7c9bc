//! Resolving an explicit request (dir, workspace, project name) to projects
//!
//! Also holds the `restrict_file_list` checks, which compare an explicit
//! request against what the pull request actually changes.

use plancraft_config::{paths, ProjectConfig, RepoConfig};
use regex::Regex;

use crate::changeset::ChangeSet;
use crate::error::DiscoveryError;
use crate::finder::Candidate;

/// What a command asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectRequest<'a> {
    /// Normalized repo-relative dir
    pub dir: &'a str,
    /// Workspace
    pub workspace: &'a str,
    /// Project name or, with regexp names enabled, pattern
    pub project_name: Option<&'a str>,
}

/// Normalize a dir given on a command
///
/// # Errors
///
/// [`DiscoveryError::InvalidDir`] for absolute dirs or dirs outside the repo.
pub fn request_dir(raw: Option<&str>) -> Result<String, DiscoveryError> {
    match raw {
        None => Ok(plancraft_config::DEFAULT_REPO_REL_DIR.to_string()),
        Some(raw) => paths::normalize_repo_dir(raw)
            .map_err(|_| DiscoveryError::InvalidDir(raw.to_string())),
    }
}

/// Projects selected by `request`
///
/// Without a repo config only a bare dir/workspace is accepted and repo
/// defaults apply. With one, a name selects configured projects; otherwise
/// the dir/workspace pair must match at most one entry, and an unmatched
/// pair falls back to defaults provided the workspace is allowed for the dir.
/// The dir need not exist in the checkout yet; generated sources may only
/// appear once the workflow runs.
///
/// # Errors
///
/// [`DiscoveryError::NoConfigFile`], [`DiscoveryError::NoProjectNamed`],
/// [`DiscoveryError::MultipleProjectsNamed`],
/// [`DiscoveryError::AmbiguousProject`] and
/// [`DiscoveryError::WorkspaceNotAllowed`].
pub fn select_projects(
    repo: Option<&RepoConfig>,
    config_file: &str,
    request: &ProjectRequest<'_>,
    enable_regexp: bool,
) -> Result<Vec<Candidate>, DiscoveryError> {
    let Some(repo) = repo else {
        if request.project_name.is_some() {
            return Err(DiscoveryError::NoConfigFile);
        }
        return Ok(vec![unconfigured(request)]);
    };

    if let Some(name) = request.project_name {
        let projects = projects_named(repo, name, enable_regexp)?;
        if projects.is_empty() {
            return Err(DiscoveryError::NoProjectNamed {
                name: name.to_string(),
                file: config_file.to_string(),
            });
        }
        return Ok(projects
            .into_iter()
            .map(|p| Candidate::Configured(p.clone()))
            .collect());
    }

    let matching = repo.find_projects_by_dir_workspace(request.dir, request.workspace);
    match matching.as_slice() {
        [] => {
            check_workspace_allowed(repo, request.dir, request.workspace)?;
            Ok(vec![unconfigured(request)])
        }
        [project] => Ok(vec![Candidate::Configured((*project).clone())]),
        _ => Err(DiscoveryError::AmbiguousProject {
            file: config_file.to_string(),
            dir: request.dir.to_string(),
            workspace: request.workspace.to_string(),
        }),
    }
}

/// Configured projects selected by a name, or by an anchored pattern when
/// regexp names are enabled
///
/// # Errors
///
/// [`DiscoveryError::InvalidNamePattern`] and
/// [`DiscoveryError::MultipleProjectsNamed`].
pub fn projects_named<'c>(
    repo: &'c RepoConfig,
    name: &str,
    enable_regexp: bool,
) -> Result<Vec<&'c ProjectConfig>, DiscoveryError> {
    if enable_regexp {
        let re = Regex::new(&format!("^(?:{name})$")).map_err(|source| {
            DiscoveryError::InvalidNamePattern {
                pattern: name.to_string(),
                source,
            }
        })?;
        return Ok(repo.find_projects_by_name(|n| re.is_match(n)));
    }
    let found = repo.find_projects_by_name(|n| n == name);
    if found.len() > 1 {
        return Err(DiscoveryError::MultipleProjectsNamed {
            name: name.to_string(),
        });
    }
    Ok(found)
}

/// The requested dir must contain a change
///
/// # Errors
///
/// [`DiscoveryError::DirNotInPlanList`]
pub fn check_dir_in_changes(changes: &ChangeSet, dir: &str) -> Result<(), DiscoveryError> {
    if changes.touches_dir(dir) {
        Ok(())
    } else {
        Err(DiscoveryError::DirNotInPlanList {
            dir: dir.to_string(),
        })
    }
}

/// Every changed dir must lie under one of `projects`
///
/// # Errors
///
/// [`DiscoveryError::DirsNotInRequestedProject`] listing the uncovered dirs.
pub fn check_changes_in_projects(
    changes: &ChangeSet,
    projects: &[&ProjectConfig],
) -> Result<(), DiscoveryError> {
    let uncovered: Vec<String> = changes
        .dirs()
        .into_iter()
        .filter(|d| !projects.iter().any(|p| paths::is_ancestor_or_self(&p.dir, d)))
        .collect();
    if uncovered.is_empty() {
        Ok(())
    } else {
        Err(DiscoveryError::DirsNotInRequestedProject { dirs: uncovered })
    }
}

fn check_workspace_allowed(
    repo: &RepoConfig,
    dir: &str,
    workspace: &str,
) -> Result<(), DiscoveryError> {
    let allowed = repo.workspaces_for_dir(dir);
    if allowed.is_empty() || allowed.contains(&workspace) {
        return Ok(());
    }
    Err(DiscoveryError::WorkspaceNotAllowed {
        workspace: workspace.to_string(),
        allowed: allowed.into_iter().map(String::from).collect(),
    })
}

fn unconfigured(request: &ProjectRequest<'_>) -> Candidate {
    Candidate::Unconfigured {
        dir: request.dir.to_string(),
        workspace: request.workspace.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plancraft_config::parse_repo_config;

    const FILE: &str = "plancraft.yaml";

    fn request<'a>(dir: &'a str, workspace: &'a str, name: Option<&'a str>) -> ProjectRequest<'a> {
        ProjectRequest {
            dir,
            workspace,
            project_name: name,
        }
    }

    #[test]
    fn no_config_uses_defaults_and_rejects_names() {
        let found = select_projects(None, FILE, &request(".", "default", None), false).unwrap();
        assert_eq!(
            found,
            [Candidate::Unconfigured {
                dir: ".".into(),
                workspace: "default".into()
            }]
        );

        let err = select_projects(None, FILE, &request(".", "default", Some("p")), false)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot specify a project name unless a config file exists to configure projects"
        );
    }

    #[test]
    fn named_duplicates_are_ambiguous_without_a_name() {
        let repo = parse_repo_config(
            b"version: 3\nprojects:\n- name: a\n  dir: .\n  workspace: myworkspace\n- name: b\n  dir: .\n  workspace: myworkspace\n",
        )
        .unwrap();
        let err = select_projects(Some(&repo), FILE, &request(".", "myworkspace", None), false)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "must specify project name: more than one project defined in 'plancraft.yaml' matched dir: '.' workspace: 'myworkspace'"
        );

        for name in ["a", "b"] {
            let found =
                select_projects(Some(&repo), FILE, &request(".", "default", Some(name)), false)
                    .unwrap();
            assert!(matches!(&found[..], [Candidate::Configured(p)] if p.display_name() == name));
        }
    }

    #[test]
    fn unknown_names_are_not_configured() {
        let repo = parse_repo_config(b"version: 3\nprojects:\n- name: a\n  dir: .\n").unwrap();
        let err = select_projects(
            Some(&repo),
            FILE,
            &request(".", "default", Some("notconfigured")),
            false,
        )
        .unwrap_err();
        assert!(err.is_not_configured());
        assert_eq!(
            err.to_string(),
            "no project with name 'notconfigured' is defined in 'plancraft.yaml'"
        );
    }

    #[test]
    fn regexp_names_select_several() {
        let repo = parse_repo_config(
            b"version: 3\nprojects:\n- name: app-1\n  dir: app1\n- name: app-2\n  dir: app2\n- name: db\n  dir: db\n",
        )
        .unwrap();
        let found =
            select_projects(Some(&repo), FILE, &request(".", "default", Some("app-.*")), true)
                .unwrap();
        assert_eq!(found.iter().map(Candidate::dir).collect::<Vec<_>>(), ["app1", "app2"]);

        // Without regexp support the pattern is a literal name.
        assert!(select_projects(Some(&repo), FILE, &request(".", "default", Some("app-.*")), false)
            .unwrap_err()
            .is_not_configured());
    }

    #[test]
    fn workspace_must_be_declared_for_configured_dirs() {
        let repo = parse_repo_config(
            b"version: 3\nprojects:\n- dir: .\n  workspace: a\n- dir: .\n  workspace: b\n",
        )
        .unwrap();
        let err = select_projects(Some(&repo), FILE, &request(".", "myworkspace", None), false)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "running commands in workspace \"myworkspace\" is not allowed because this directory is only configured for the following workspaces: a, b"
        );
    }

    #[test]
    fn unconfigured_dirs_fall_back_to_defaults() {
        let repo = parse_repo_config(b"version: 3\nprojects:\n- dir: notroot\n").unwrap();
        let found = select_projects(Some(&repo), FILE, &request("other", "ws", None), false).unwrap();
        assert_eq!(found.iter().map(Candidate::workspace).collect::<Vec<_>>(), ["ws"]);
    }

    #[test]
    fn restrict_file_list_checks() {
        let changes = ChangeSet::new(["directory-2/main.tf"]);
        let err = check_dir_in_changes(&changes, "directory-1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "the dir \"directory-1\" is not in the plan list of this pull request"
        );
        assert!(check_dir_in_changes(&changes, "directory-2").is_ok());

        let repo = parse_repo_config(b"version: 3\nprojects:\n- name: p\n  dir: directory-1\n").unwrap();
        let selected = projects_named(&repo, "p", false).unwrap();
        let both = ChangeSet::new(["directory-1/main.tf", "directory-2/main.tf"]);
        let err = check_changes_in_projects(&both, &selected).unwrap_err();
        assert_eq!(
            err.to_string(),
            "the following directories are present in the pull request but not in the requested project:\ndirectory-2"
        );
        assert!(check_changes_in_projects(&ChangeSet::new(["directory-1/sub/x.tf"]), &selected).is_ok());
    }

    #[test]
    fn request_dirs_are_normalized() {
        assert_eq!(request_dir(None).unwrap(), ".");
        assert_eq!(request_dir(Some("./dir1/")).unwrap(), "dir1");
        assert!(matches!(request_dir(Some("../x")), Err(DiscoveryError::InvalidDir(_))));
    }
}
