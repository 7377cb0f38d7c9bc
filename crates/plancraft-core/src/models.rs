//! Pull request identity carried onto every context

use serde::Serialize;

/// A repository on a VCS host
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Repo {
    /// `owner/name`
    pub full_name: String,
    /// Owner (user, org or group path)
    pub owner: String,
    /// Repository name
    pub name: String,
    /// VCS host name such as `github.com`
    pub vcs_host: String,
    /// Clone URL
    pub clone_url: String,
}

impl Repo {
    /// Repo from `owner/name` on `vcs_host`
    #[must_use]
    pub fn new(full_name: impl Into<String>, vcs_host: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let vcs_host = vcs_host.into();
        let (owner, name) = full_name
            .rsplit_once('/')
            .map_or((String::new(), full_name.clone()), |(o, n)| {
                (o.to_string(), n.to_string())
            });
        let clone_url = format!("https://{vcs_host}/{full_name}.git");
        Self {
            full_name,
            owner,
            name,
            vcs_host,
            clone_url,
        }
    }

    /// ID that global policy rules match against: `host/owner/name`
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}/{}", self.vcs_host, self.full_name)
    }
}

/// A pull request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    /// Pull request number
    pub num: u64,
    /// Head commit SHA
    pub head_commit: String,
    /// Source branch
    pub head_branch: String,
    /// Target branch
    pub base_branch: String,
    /// Author login
    pub author: String,
    /// Repository the pull request targets
    pub base_repo: Repo,
}

/// The user who triggered the command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct User {
    /// Login
    pub username: String,
}

impl User {
    /// User with `username`
    #[inline]
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Review state at the time of the command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PullStatus {
    /// Approved by a reviewer
    pub approved: bool,
    /// Mergeable according to the VCS
    pub mergeable: bool,
}
