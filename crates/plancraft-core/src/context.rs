//! Project contexts: the output of a build
//!
//! One [`ProjectContext`] describes one command for one project with
//! everything the execution layer needs resolved up front. A context is
//! built once and never modified.

use plancraft_config::{ApplyRequirement, Step, ToolVersion};
use plancraft_discovery::plan_file_name;
use serde::Serialize;

use crate::command::CommandName;
use crate::models::{PullRequest, PullStatus, Repo, User};

/// Metric name prefix used by the builder
pub const METRICS_PREFIX: &str = "plancraft.builder";

/// A named, labelled metrics handle recording through the `metrics` facade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsScope {
    prefix: String,
    labels: Vec<(String, String)>,
}

impl Default for MetricsScope {
    fn default() -> Self {
        Self::new(METRICS_PREFIX)
    }
}

impl MetricsScope {
    /// Scope named `prefix`
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            labels: Vec::new(),
        }
    }

    /// Child scope `prefix.name` sharing this scope's labels
    #[must_use]
    pub fn sub_scope(&self, name: &str) -> Self {
        Self {
            prefix: format!("{}.{name}", self.prefix),
            labels: self.labels.clone(),
        }
    }

    /// Add a label
    #[must_use]
    pub fn tagged(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// Full metric name prefix
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Labels attached to every metric of this scope
    #[inline]
    #[must_use]
    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }

    /// Increment counter `prefix.name` by one
    pub fn increment(&self, name: &str) {
        let labels: Vec<metrics::Label> = self
            .labels
            .iter()
            .map(|(k, v)| metrics::Label::new(k.clone(), v.clone()))
            .collect();
        metrics::counter!(format!("{}.{name}", self.prefix), labels).increment(1);
    }
}

/// One command for one project
#[derive(Debug, Clone, Serialize)]
pub struct ProjectContext {
    /// Command to run
    pub command_name: CommandName,
    /// Project name; empty for unnamed projects
    pub project_name: String,
    /// Repo-relative directory
    pub repo_rel_dir: String,
    /// Workspace
    pub workspace: String,
    /// Extra args from the comment, escaped for the shell
    pub escaped_comment_args: Vec<String>,
    /// Gates before apply
    pub apply_requirements: Vec<ApplyRequirement>,
    /// Automerge after apply
    pub automerge_enabled: bool,
    /// Plans may run in parallel
    pub parallel_plan_enabled: bool,
    /// Applies may run in parallel
    pub parallel_apply_enabled: bool,
    /// Project takes part in autoplan
    pub autoplan_enabled: bool,
    /// Tool version; `None` means the server default
    pub terraform_version: Option<ToolVersion>,
    /// Workflow the steps come from
    pub workflow_name: String,
    /// Steps to run, in order
    pub steps: Vec<Step>,
    /// Policy checks follow plans for this project
    pub policy_checks_enabled: bool,
    /// Schema version of the repo config; 0 without one
    pub repo_config_version: u32,
    /// Verbose output requested
    pub verbose: bool,
    /// Repository the pull request targets
    pub base_repo: Repo,
    /// Repository the pull request comes from
    pub head_repo: Repo,
    /// Pull request
    pub pull: PullRequest,
    /// Triggering user
    pub user: User,
    /// Review state
    pub pull_status: PullStatus,
    /// Span for logging about this project
    #[serde(skip)]
    pub log: tracing::Span,
    /// Metrics for this project
    #[serde(skip)]
    pub scope: MetricsScope,
}

impl ProjectContext {
    /// Plan file this project's plan is written to
    #[must_use]
    pub fn plan_file_name(&self) -> String {
        let name = (!self.project_name.is_empty()).then_some(self.project_name.as_str());
        plan_file_name(&self.workspace, name)
    }

    /// Name for messages: the project name, or `dir/workspace`
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.project_name.is_empty() {
            format!("dir: {} workspace: {}", self.repo_rel_dir, self.workspace)
        } else {
            self.project_name.clone()
        }
    }
}

/// Escape every character of every arg with a backslash so the execution
/// layer can pass them through a shell verbatim
#[must_use]
pub fn escape_args(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let mut escaped = String::with_capacity(arg.len() * 2);
            for c in arg.chars() {
                escaped.push('\\');
                escaped.push(c);
            }
            escaped
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| (*x).to_string()).collect()
    }

    #[test]
    fn escapes_every_character() {
        assert_eq!(
            escape_args(&s(&["-var=$(touch bad)"])),
            s(&[r"\-\v\a\r\=\$\(\t\o\u\c\h\ \b\a\d\)"])
        );
        assert_eq!(
            escape_args(&s(&["arg1", "arg2"])),
            s(&[r"\a\r\g\1", r"\a\r\g\2"])
        );
        assert_eq!(
            escape_args(&s(&["-- ;echo bad"])),
            s(&[r"\-\-\ \;\e\c\h\o\ \b\a\d"])
        );
        assert!(escape_args(&[]).is_empty());
    }

    #[test]
    fn scopes_nest_and_keep_labels() {
        let scope = MetricsScope::default().tagged("repo", "owner/repo");
        let child = scope.sub_scope("project");
        assert_eq!(child.prefix(), "plancraft.builder.project");
        assert_eq!(child.labels(), scope.labels());
        // No recorder installed: recording is a no-op.
        child.increment("built");
    }

    proptest! {
        #[test]
        fn escaping_doubles_length_and_unescapes(arg in ".*") {
            let escaped = escape_args(&[arg.clone()]).remove(0);
            prop_assert_eq!(escaped.chars().count(), arg.chars().count() * 2);
            let unescaped: String = escaped.chars().skip(1).step_by(2).collect();
            prop_assert_eq!(unescaped, arg);
        }
    }
}
