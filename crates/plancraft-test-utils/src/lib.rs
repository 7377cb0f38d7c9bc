//! Testing utilities for the plancraft workspace
//!
//! Shared fakes for the builder's collaborators, a checkout builder backed
//! by a temp dir, and fixtures.

#![allow(missing_docs)]
#![allow(unreachable_pub)]
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use plancraft_config::{GlobalConfig, GlobalConfigArgs, UserConfig};
use plancraft_core::{
    CollaboratorError, CommandContext, ProjectCommandBuilder, PullRequest, Repo, User, VcsClient,
    WorkingDir, WorkspaceLockCoordinator,
};
use tempfile::TempDir;

/// VCS client serving a fixed diff and fixed file contents
#[derive(Debug, Default)]
pub struct FakeVcs {
    pub modified: Vec<String>,
    pub files: HashMap<String, Vec<u8>>,
    pub single_file_download: bool,
    downloads: AtomicUsize,
}

impl FakeVcs {
    pub fn new<S: AsRef<str>>(modified: &[S]) -> Self {
        Self {
            modified: modified.iter().map(|s| s.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.as_bytes().to_vec());
        self
    }

    pub fn with_single_file_download(mut self, enabled: bool) -> Self {
        self.single_file_download = enabled;
        self
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VcsClient for FakeVcs {
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
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(self.files.get(path).cloned())
    }

    fn supports_single_file_download(&self, _repo: &Repo) -> bool {
        self.single_file_download
    }
}

/// Checkout manager over directories prepared by the test
///
/// Every workspace clones to `checkout`. Existing working dirs are
/// `pull_dir/<workspace>` when a pull dir is set, otherwise `checkout` once
/// a clone has happened.
#[derive(Debug, Default)]
pub struct FakeWorkingDir {
    pub checkout: PathBuf,
    pub pull_dir: Option<PathBuf>,
    pub untracked: Vec<String>,
    clones: AtomicUsize,
    cloned_workspaces: Mutex<Vec<String>>,
}

impl FakeWorkingDir {
    pub fn new(checkout: impl Into<PathBuf>) -> Self {
        Self {
            checkout: checkout.into(),
            ..Self::default()
        }
    }

    pub fn with_pull_dir(mut self, pull_dir: impl Into<PathBuf>) -> Self {
        self.pull_dir = Some(pull_dir.into());
        self
    }

    pub fn with_untracked<S: AsRef<str>>(mut self, files: &[S]) -> Self {
        self.untracked = files.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn clones(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }

    pub fn cloned_workspaces(&self) -> Vec<String> {
        self.cloned_workspaces.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkingDir for FakeWorkingDir {
    async fn clone_repo(
        &self,
        _head_repo: &Repo,
        _pull: &PullRequest,
        workspace: &str,
    ) -> Result<PathBuf, CollaboratorError> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        self.cloned_workspaces
            .lock()
            .unwrap()
            .push(workspace.to_string());
        Ok(self.checkout.clone())
    }

    async fn get_working_dir(
        &self,
        _repo: &Repo,
        _pull: &PullRequest,
        workspace: &str,
    ) -> Result<PathBuf, CollaboratorError> {
        if let Some(pull_dir) = &self.pull_dir {
            let dir = pull_dir.join(workspace);
            return if dir.is_dir() {
                Ok(dir)
            } else {
                Err(CollaboratorError::NotFound(workspace.to_string()))
            };
        }
        if self.clones() > 0 || self.checkout.is_dir() {
            Ok(self.checkout.clone())
        } else {
            Err(CollaboratorError::NotFound(workspace.to_string()))
        }
    }

    async fn get_pull_dir(
        &self,
        _repo: &Repo,
        _pull: &PullRequest,
    ) -> Result<PathBuf, CollaboratorError> {
        self.pull_dir
            .clone()
            .ok_or_else(|| CollaboratorError::NotFound("pull dir".to_string()))
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

/// Files and directories laid out under a temp dir
pub struct DirStructure {
    dir: TempDir,
}

impl DirStructure {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Write `content` at the relative `path`, creating parents
    pub fn with_file(self, path: &str, content: &str) -> Self {
        let full = self.dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        std::fs::create_dir_all(self.dir.path().join(path)).unwrap();
        self
    }

    /// Write the repo config file
    pub fn with_config(self, yaml: &str) -> Self {
        self.with_file(plancraft_config::DEFAULT_REPO_CONFIG_FILE, yaml)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, path: &str) -> PathBuf {
        self.dir.path().join(path)
    }
}

impl Default for DirStructure {
    fn default() -> Self {
        Self::new()
    }
}

/// Command context for pull request 1 of `owner/repo` on github.com
pub fn context() -> CommandContext {
    CommandContext::new(
        PullRequest {
            num: 1,
            head_commit: "abc123".to_string(),
            head_branch: "feature".to_string(),
            base_branch: "main".to_string(),
            author: "author".to_string(),
            base_repo: Repo::new("owner/repo", "github.com"),
        },
        User::new("user"),
    )
}

/// Default server policy with the given flags
pub fn global_config(allow_all_repo_settings: bool, policy_check_enabled: bool) -> GlobalConfig {
    GlobalConfig::from_args(GlobalConfigArgs {
        allow_all_repo_settings,
        policy_check_enabled,
    })
}

pub type TestBuilder = ProjectCommandBuilder<FakeVcs, FakeWorkingDir>;

/// Builder wired to fakes, returning the fakes for inspection
pub fn builder(
    vcs: FakeVcs,
    working_dir: FakeWorkingDir,
    global: GlobalConfig,
    user: UserConfig,
) -> (TestBuilder, Arc<FakeVcs>, Arc<FakeWorkingDir>) {
    let vcs = Arc::new(vcs);
    let working_dir = Arc::new(working_dir);
    let builder = ProjectCommandBuilder::new(
        Arc::clone(&vcs),
        Arc::clone(&working_dir),
        WorkspaceLockCoordinator::new(),
        Arc::new(global),
        user,
    )
    .unwrap();
    (builder, vcs, working_dir)
}
