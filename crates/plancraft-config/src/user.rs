//! Server-wide defaults chosen by the operator

use serde::{Deserialize, Serialize};

use crate::repo::AutoDiscoverMode;

/// Patterns, relative to the repo root, whose modification triggers a plan
/// of the containing directory when no `when_modified` is configured
pub const DEFAULT_AUTOPLAN_FILE_LIST: &str =
    "**/*.tf,**/*.tf.json,**/*.tfvars,**/*.tfvars.json,**/terragrunt.hcl,**/.terraform.lock.hcl";

/// Operator defaults applied to every build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Skip the clone when the config fetched through the VCS matches no project
    pub skip_clone_no_changes: bool,
    /// Treat `-p` project names as anchored regular expressions
    pub enable_regexp_cmd: bool,
    /// Automerge default when the repo does not say
    pub enable_automerge: bool,
    /// Parallel plan default when the repo does not say
    pub enable_parallel_plan: bool,
    /// Parallel apply default when the repo does not say
    pub enable_parallel_apply: bool,
    /// Autoplan patterns used without `when_modified`
    pub autoplan_file_list: Vec<String>,
    /// Only plan directories the pull request touches
    pub restrict_file_list: bool,
    /// A named project that is not configured yields nothing instead of an error
    pub silence_no_projects: bool,
    /// Treat untracked files in the checkout as changed
    pub include_git_untracked_files: bool,
    /// Autodiscover mode when the repo does not say
    pub autodiscover_mode: AutoDiscoverMode,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            skip_clone_no_changes: false,
            enable_regexp_cmd: false,
            enable_automerge: false,
            enable_parallel_plan: false,
            enable_parallel_apply: false,
            autoplan_file_list: Self::parse_file_list(DEFAULT_AUTOPLAN_FILE_LIST),
            restrict_file_list: false,
            silence_no_projects: false,
            include_git_untracked_files: false,
            autodiscover_mode: AutoDiscoverMode::Auto,
        }
    }
}

impl UserConfig {
    /// Defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a comma separated pattern list, dropping blanks
    #[must_use]
    pub fn parse_file_list(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    }

    /// Set skip clone
    #[inline]
    #[must_use]
    pub fn with_skip_clone_no_changes(mut self, enabled: bool) -> Self {
        self.skip_clone_no_changes = enabled;
        self
    }

    /// Set regexp project names
    #[inline]
    #[must_use]
    pub fn with_regexp_cmd(mut self, enabled: bool) -> Self {
        self.enable_regexp_cmd = enabled;
        self
    }

    /// Set automerge default
    #[inline]
    #[must_use]
    pub fn with_automerge(mut self, enabled: bool) -> Self {
        self.enable_automerge = enabled;
        self
    }

    /// Set parallel plan default
    #[inline]
    #[must_use]
    pub fn with_parallel_plan(mut self, enabled: bool) -> Self {
        self.enable_parallel_plan = enabled;
        self
    }

    /// Set parallel apply default
    #[inline]
    #[must_use]
    pub fn with_parallel_apply(mut self, enabled: bool) -> Self {
        self.enable_parallel_apply = enabled;
        self
    }

    /// Set the autoplan file list from a comma separated string
    #[inline]
    #[must_use]
    pub fn with_autoplan_file_list(mut self, list: &str) -> Self {
        self.autoplan_file_list = Self::parse_file_list(list);
        self
    }

    /// Set restrict file list
    #[inline]
    #[must_use]
    pub fn with_restrict_file_list(mut self, enabled: bool) -> Self {
        self.restrict_file_list = enabled;
        self
    }

    /// Set silence no projects
    #[inline]
    #[must_use]
    pub fn with_silence_no_projects(mut self, enabled: bool) -> Self {
        self.silence_no_projects = enabled;
        self
    }

    /// Set untracked files support
    #[inline]
    #[must_use]
    pub fn with_untracked_files(mut self, enabled: bool) -> Self {
        self.include_git_untracked_files = enabled;
        self
    }

    /// Set autodiscover default
    #[inline]
    #[must_use]
    pub fn with_autodiscover_mode(mut self, mode: AutoDiscoverMode) -> Self {
        self.autodiscover_mode = mode;
        self
    }
}
