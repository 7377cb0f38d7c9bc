//! Commands and the pull request they run against

use std::fmt;

use serde::Serialize;

use crate::models::{PullRequest, PullStatus, Repo, User};

/// What a context asks the execution layer to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    /// Produce a plan
    Plan,
    /// Apply a plan
    Apply,
    /// Check a plan against policies
    PolicyCheck,
    /// Report the tool version
    Version,
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::PolicyCheck => "policy_check",
            Self::Version => "version",
        })
    }
}

/// A parsed pull request comment such as `plan -d dir -w ws -- -var x=1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCommand {
    /// Command
    pub name: CommandName,
    /// `-d`: repo-relative dir
    pub repo_rel_dir: Option<String>,
    /// `-w`: workspace
    pub workspace: Option<String>,
    /// `-p`: project name
    pub project_name: Option<String>,
    /// Extra args after `--`
    pub flags: Vec<String>,
    /// `--verbose`
    pub verbose: bool,
}

impl CommentCommand {
    /// Command with no filters
    #[must_use]
    pub fn new(name: CommandName) -> Self {
        Self {
            name,
            repo_rel_dir: None,
            workspace: None,
            project_name: None,
            flags: Vec::new(),
            verbose: false,
        }
    }

    /// `plan`
    #[inline]
    #[must_use]
    pub fn plan() -> Self {
        Self::new(CommandName::Plan)
    }

    /// `apply`
    #[inline]
    #[must_use]
    pub fn apply() -> Self {
        Self::new(CommandName::Apply)
    }

    /// `version`
    #[inline]
    #[must_use]
    pub fn version() -> Self {
        Self::new(CommandName::Version)
    }

    /// Set dir
    #[inline]
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.repo_rel_dir = Some(dir.into());
        self
    }

    /// Set workspace
    #[inline]
    #[must_use]
    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// Set project name
    #[inline]
    #[must_use]
    pub fn with_project(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    /// Set extra args
    #[inline]
    #[must_use]
    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Set verbose
    #[inline]
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Whether a dir or project narrows the command; otherwise it covers
    /// every project of the pull request
    #[inline]
    #[must_use]
    pub fn is_for_specific_project(&self) -> bool {
        self.repo_rel_dir.is_some() || self.project_name.is_some()
    }
}

/// The pull request a build runs for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandContext {
    /// Repository the pull request comes from; cloned for the checkout
    pub head_repo: Repo,
    /// Pull request
    pub pull: PullRequest,
    /// Triggering user
    pub user: User,
    /// Review state
    pub pull_status: PullStatus,
}

impl CommandContext {
    /// Context for `pull`, with the head repo equal to the base repo
    #[must_use]
    pub fn new(pull: PullRequest, user: User) -> Self {
        Self {
            head_repo: pull.base_repo.clone(),
            pull,
            user,
            pull_status: PullStatus::default(),
        }
    }

    /// Set the review state
    #[inline]
    #[must_use]
    pub fn with_pull_status(mut self, status: PullStatus) -> Self {
        self.pull_status = status;
        self
    }

    /// Repository the pull request targets
    #[inline]
    #[must_use]
    pub fn base_repo(&self) -> &Repo {
        &self.pull.base_repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_project_detection() {
        assert!(!CommentCommand::plan().is_for_specific_project());
        assert!(!CommentCommand::plan().with_workspace("ws").is_for_specific_project());
        assert!(CommentCommand::plan().with_dir(".").is_for_specific_project());
        assert!(CommentCommand::apply().with_project("p").is_for_specific_project());
    }

    #[test]
    fn command_names_display() {
        assert_eq!(CommandName::PolicyCheck.to_string(), "policy_check");
        assert_eq!(CommandName::Version.to_string(), "version");
    }
}
