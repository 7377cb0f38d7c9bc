//! The repo config model
//!
//! A [`RepoConfig`] is what `plancraft.yaml` says after parsing and
//! validation. It is never modified once built; the discovery and merge
//! stages only read it.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::version::ToolVersion;
use crate::workflow::Workflow;

/// Workspace used when none is given
pub const DEFAULT_WORKSPACE: &str = "default";

/// Directory used when none is given: the checkout root
pub const DEFAULT_REPO_REL_DIR: &str = ".";

/// File name of the repo config at the checkout root
pub const DEFAULT_REPO_CONFIG_FILE: &str = "plancraft.yaml";

/// When projects are discovered from changed files rather than from config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoDiscoverMode {
    /// Only when the repo config declares no projects
    #[default]
    Auto,
    /// Always, next to configured projects
    Enabled,
    /// Never
    Disabled,
}

impl FromStr for AutoDiscoverMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            _ => Err(ConfigError::InvalidAutoDiscoverMode(s.to_string())),
        }
    }
}

impl fmt::Display for AutoDiscoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        })
    }
}

/// Repo-level autodiscover settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoDiscoverConfig {
    /// Mode; `None` defers to the server default
    pub mode: Option<AutoDiscoverMode>,
    /// Directory globs that are never autodiscovered
    pub ignore_paths: Vec<String>,
}

/// A gate that must pass before a plan may be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyRequirement {
    /// The pull request is approved
    Approved,
    /// The pull request is mergeable
    Mergeable,
    /// The branch is not behind its base
    Undiverged,
}

impl FromStr for ApplyRequirement {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "mergeable" => Ok(Self::Mergeable),
            "undiverged" => Ok(Self::Undiverged),
            _ => Err(ConfigError::InvalidApplyRequirement(s.to_string())),
        }
    }
}

impl fmt::Display for ApplyRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approved => "approved",
            Self::Mergeable => "mergeable",
            Self::Undiverged => "undiverged",
        })
    }
}

/// Autoplan settings for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoplanConfig {
    /// Whether the project is planned automatically
    pub enabled: bool,
    /// Patterns, relative to the project dir, that trigger a plan.
    ///
    /// `None` uses the server's default autoplan file list; `Some(vec![])`
    /// never triggers.
    pub when_modified: Option<Vec<String>>,
}

impl Default for AutoplanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            when_modified: None,
        }
    }
}

/// One entry under `projects:`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Optional unique name
    pub name: Option<String>,
    /// Normalized repo-relative dir
    pub dir: String,
    /// Workspace
    pub workspace: String,
    /// Autoplan settings
    pub autoplan: AutoplanConfig,
    /// Apply requirements, when set by the repo
    pub apply_requirements: Option<Vec<ApplyRequirement>>,
    /// Pinned tool version
    pub terraform_version: Option<ToolVersion>,
    /// Workflow reference
    pub workflow: Option<String>,
    /// Policy check override
    pub policy_check: Option<bool>,
}

impl ProjectConfig {
    /// Project in `dir` with every other setting at its default
    #[must_use]
    pub fn new(dir: impl Into<String>) -> Self {
        Self {
            name: None,
            dir: dir.into(),
            workspace: DEFAULT_WORKSPACE.to_string(),
            autoplan: AutoplanConfig::default(),
            apply_requirements: None,
            terraform_version: None,
            workflow: None,
            policy_check: None,
        }
    }

    /// Set name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set workspace
    #[inline]
    #[must_use]
    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Set autoplan
    #[inline]
    #[must_use]
    pub fn with_autoplan(mut self, autoplan: AutoplanConfig) -> Self {
        self.autoplan = autoplan;
        self
    }

    /// Set workflow
    #[inline]
    #[must_use]
    pub fn with_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = Some(workflow.into());
        self
    }

    /// Name, or empty when unnamed
    #[inline]
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// A parsed and validated `plancraft.yaml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoConfig {
    /// Schema version (2 or 3)
    pub version: u32,
    /// Automerge override
    pub automerge: Option<bool>,
    /// Parallel plan override
    pub parallel_plan: Option<bool>,
    /// Parallel apply override
    pub parallel_apply: Option<bool>,
    /// Autodiscover settings
    pub autodiscover: Option<AutoDiscoverConfig>,
    /// Projects in file order
    pub projects: Vec<ProjectConfig>,
    /// Repo-defined workflows
    pub workflows: IndexMap<String, Workflow>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            version: 3,
            automerge: None,
            parallel_plan: None,
            parallel_apply: None,
            autodiscover: None,
            projects: Vec::new(),
            workflows: IndexMap::new(),
        }
    }
}

impl RepoConfig {
    /// Projects configured for `dir` in any workspace
    #[must_use]
    pub fn find_projects_by_dir(&self, dir: &str) -> Vec<&ProjectConfig> {
        self.projects.iter().filter(|p| p.dir == dir).collect()
    }

    /// Projects configured for `dir` in `workspace`
    #[must_use]
    pub fn find_projects_by_dir_workspace(&self, dir: &str, workspace: &str) -> Vec<&ProjectConfig> {
        self.projects
            .iter()
            .filter(|p| p.dir == dir && p.workspace == workspace)
            .collect()
    }

    /// Projects whose name satisfies `predicate`, in file order
    pub fn find_projects_by_name(&self, predicate: impl Fn(&str) -> bool) -> Vec<&ProjectConfig> {
        self.projects
            .iter()
            .filter(|p| p.name.as_deref().is_some_and(&predicate))
            .collect()
    }

    /// Workspaces declared for `dir`; empty when the dir is not configured
    #[must_use]
    pub fn workspaces_for_dir(&self, dir: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for p in self.projects.iter().filter(|p| p.dir == dir) {
            if !out.contains(&p.workspace.as_str()) {
                out.push(&p.workspace);
            }
        }
        out
    }

    /// Whether changed directories are discovered as projects
    #[must_use]
    pub fn autodiscover_enabled(&self, server_default: AutoDiscoverMode) -> bool {
        let mode = self
            .autodiscover
            .as_ref()
            .and_then(|a| a.mode)
            .unwrap_or(server_default);
        match mode {
            AutoDiscoverMode::Auto => self.projects.is_empty(),
            AutoDiscoverMode::Enabled => true,
            AutoDiscoverMode::Disabled => false,
        }
    }

    /// Globs excluded from autodiscovery
    #[must_use]
    pub fn autodiscover_ignore_paths(&self) -> &[String] {
        self.autodiscover
            .as_ref()
            .map(|a| a.ignore_paths.as_slice())
            .unwrap_or_default()
    }

    /// Check invariants the YAML shape cannot express
    ///
    /// # Errors
    ///
    /// Unsupported version, duplicate names, or unnamed duplicate
    /// dir/workspace pairs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.version, 2 | 3) {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }

        for (i, project) in self.projects.iter().enumerate() {
            if project.workspace.is_empty() || project.workspace.contains('/') {
                return Err(ConfigError::InvalidWorkspace(project.workspace.clone()));
            }

            for other in &self.projects[i + 1..] {
                if let (Some(a), Some(b)) = (&project.name, &other.name) {
                    if a == b {
                        return Err(ConfigError::DuplicateName(a.clone()));
                    }
                }
                let same_target = project.dir == other.dir && project.workspace == other.workspace;
                if same_target && (project.name.is_none() || other.name.is_none()) {
                    return Err(ConfigError::DuplicateUnnamed {
                        dir: project.dir.clone(),
                        workspace: project.workspace.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
