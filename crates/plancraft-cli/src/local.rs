//! Collaborators backed by a local checkout
//!
//! The "pull request" is whatever the caller says changed; files are read
//! straight from the checkout and every workspace shares it.

use std::path::PathBuf;

use async_trait::async_trait;
use plancraft_core::{CollaboratorError, PullRequest, Repo, VcsClient, WorkingDir};

/// VCS view of a local checkout
#[derive(Debug, Clone)]
pub(crate) struct LocalChanges {
    repo_dir: PathBuf,
    modified: Vec<String>,
}

impl LocalChanges {
    pub(crate) fn new(repo_dir: impl Into<PathBuf>, modified: Vec<String>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            modified,
        }
    }
}

#[async_trait]
impl VcsClient for LocalChanges {
    async fn get_modified_files(
        &self,
        _repo: &Repo,
        _pull: &PullRequest,
    ) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.modified.clone())
    }

    async fn get_file_content(
        &self,
        _pull: &PullRequest,
        path: &str,
    ) -> Result<Option<Vec<u8>>, CollaboratorError> {
        match tokio::fs::read(self.repo_dir.join(path)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn supports_single_file_download(&self, _repo: &Repo) -> bool {
        true
    }
}

/// Checkout manager that never clones
///
/// Plans use `repo_dir` for every workspace. Existing working dirs live
/// under `pull_dir/<workspace>` when a pull dir is given.
#[derive(Debug, Clone)]
pub(crate) struct LocalCheckout {
    repo_dir: PathBuf,
    pull_dir: Option<PathBuf>,
    untracked: Vec<String>,
}

impl LocalCheckout {
    pub(crate) fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            pull_dir: None,
            untracked: Vec::new(),
        }
    }

    #[must_use]
    pub(crate) fn with_pull_dir(mut self, pull_dir: Option<PathBuf>) -> Self {
        self.pull_dir = pull_dir;
        self
    }

    #[must_use]
    pub(crate) fn with_untracked(mut self, untracked: Vec<String>) -> Self {
        self.untracked = untracked;
        self
    }

    fn existing(dir: PathBuf, what: &str) -> Result<PathBuf, CollaboratorError> {
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(CollaboratorError::NotFound(format!(
                "{what} {}",
                dir.display()
            )))
        }
    }
}

#[async_trait]
impl WorkingDir for LocalCheckout {
    async fn clone_repo(
        &self,
        _head_repo: &Repo,
        _pull: &PullRequest,
        _workspace: &str,
    ) -> Result<PathBuf, CollaboratorError> {
        Self::existing(self.repo_dir.clone(), "checkout")
    }

    async fn get_working_dir(
        &self,
        _repo: &Repo,
        _pull: &PullRequest,
        workspace: &str,
    ) -> Result<PathBuf, CollaboratorError> {
        match &self.pull_dir {
            Some(pull_dir) => Self::existing(pull_dir.join(workspace), "working dir"),
            None => Self::existing(self.repo_dir.clone(), "checkout"),
        }
    }

    async fn get_pull_dir(
        &self,
        _repo: &Repo,
        _pull: &PullRequest,
    ) -> Result<PathBuf, CollaboratorError> {
        match &self.pull_dir {
            Some(pull_dir) => Self::existing(pull_dir.clone(), "pull dir"),
            None => Err(CollaboratorError::NotFound("pull dir".to_string())),
        }
    }

    async fn get_git_untracked_files(
        &self,
        _repo: &Repo,
        _pull: &PullRequest,
        _workspace: &str,
    ) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.untracked.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_files_from_the_checkout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plancraft.yaml"), "version: 3\n").unwrap();
        let vcs = LocalChanges::new(dir.path(), vec!["main.tf".into()]);
        let pull = PullRequest::default();

        assert_eq!(
            vcs.get_file_content(&pull, "plancraft.yaml").await.unwrap(),
            Some(b"version: 3\n".to_vec())
        );
        assert_eq!(vcs.get_file_content(&pull, "missing.yaml").await.unwrap(), None);
        assert_eq!(
            vcs.get_modified_files(&Repo::default(), &pull).await.unwrap(),
            ["main.tf"]
        );
    }

    #[tokio::test]
    async fn working_dirs_come_from_the_pull_dir() {
        let pull_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(pull_dir.path().join("default")).unwrap();
        let checkout = LocalCheckout::new(pull_dir.path().join("default"))
            .with_pull_dir(Some(pull_dir.path().to_path_buf()));
        let (repo, pull) = (Repo::default(), PullRequest::default());

        assert_eq!(
            checkout.get_working_dir(&repo, &pull, "default").await.unwrap(),
            pull_dir.path().join("default")
        );
        assert!(checkout
            .get_working_dir(&repo, &pull, "staging")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn no_pull_dir_is_not_found() {
        let checkout = LocalCheckout::new("/nonexistent/checkout");
        let (repo, pull) = (Repo::default(), PullRequest::default());
        assert!(checkout.get_pull_dir(&repo, &pull).await.unwrap_err().is_not_found());
        assert!(checkout
            .clone_repo(&repo, &pull, "default")
            .await
            .unwrap_err()
            .is_not_found());
    }
}
