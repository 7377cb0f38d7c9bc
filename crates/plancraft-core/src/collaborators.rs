//! Capabilities the builder needs from the outside world
//!
//! The VCS client and the checkout manager are owned by the host
//! application. The builder only sees these traits and awaits one call at a
//! time; retries and timeouts are the implementor's business.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::models::{PullRequest, Repo};

/// Failure reported by a collaborator
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The requested object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote service failed
    #[error("remote error: {0}")]
    Remote(String),

    /// Local filesystem or process failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    /// Create a remote error
    #[inline]
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    /// Whether the object was missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Version control host operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Repo-relative paths the pull request modifies
    async fn get_modified_files(
        &self,
        repo: &Repo,
        pull: &PullRequest,
    ) -> Result<Vec<String>, CollaboratorError>;

    /// Contents of one file at the pull request's head; `None` when absent
    async fn get_file_content(
        &self,
        pull: &PullRequest,
        path: &str,
    ) -> Result<Option<Vec<u8>>, CollaboratorError>;

    /// Whether [`VcsClient::get_file_content`] is cheap enough to use
    /// instead of a clone
    fn supports_single_file_download(&self, repo: &Repo) -> bool;
}

/// Checkout management: one checkout per pull request and workspace
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkingDir: Send + Sync {
    /// Clone (or refresh) the checkout for `workspace`; returns its root
    async fn clone_repo(
        &self,
        head_repo: &Repo,
        pull: &PullRequest,
        workspace: &str,
    ) -> Result<PathBuf, CollaboratorError>;

    /// Root of an existing checkout; [`CollaboratorError::NotFound`] when
    /// the workspace was never cloned
    async fn get_working_dir(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        workspace: &str,
    ) -> Result<PathBuf, CollaboratorError>;

    /// Directory holding every workspace checkout of the pull request
    async fn get_pull_dir(
        &self,
        repo: &Repo,
        pull: &PullRequest,
    ) -> Result<PathBuf, CollaboratorError>;

    /// Untracked files in the checkout, repo-relative
    async fn get_git_untracked_files(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        workspace: &str,
    ) -> Result<Vec<String>, CollaboratorError>;
}
