//! Error types for project discovery

use std::path::PathBuf;

/// Why a request could not be resolved to projects
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// More than one configured project fits a dir and workspace
    #[error(
        "must specify project name: more than one project defined in '{file}' matched dir: '{dir}' workspace: '{workspace}'"
    )]
    AmbiguousProject {
        /// Config file name
        file: String,
        /// Requested dir
        dir: String,
        /// Requested workspace
        workspace: String,
    },

    /// A project name was given without a repo config
    #[error("cannot specify a project name unless a config file exists to configure projects")]
    NoConfigFile,

    /// No configured project has the requested name
    #[error("no project with name '{name}' is defined in '{file}'")]
    NoProjectNamed {
        /// Requested name
        name: String,
        /// Config file name
        file: String,
    },

    /// A plain project name matched several projects
    #[error("more than one project matched name '{name}': enable regexp project names to select several")]
    MultipleProjectsNamed {
        /// Requested name
        name: String,
    },

    /// The workspace is not among those configured for the dir
    #[error(
        "running commands in workspace {workspace:?} is not allowed because this directory is only configured for the following workspaces: {}",
        allowed.join(", ")
    )]
    WorkspaceNotAllowed {
        /// Requested workspace
        workspace: String,
        /// Workspaces configured for the dir
        allowed: Vec<String>,
    },

    /// The requested dir is not part of the pull request
    #[error("the dir {dir:?} is not in the plan list of this pull request")]
    DirNotInPlanList {
        /// Requested dir
        dir: String,
    },

    /// Changed dirs outside the requested project
    #[error(
        "the following directories are present in the pull request but not in the requested project:\n{}",
        dirs.join("\n")
    )]
    DirsNotInRequestedProject {
        /// Uncovered dirs
        dirs: Vec<String>,
    },

    /// The requested dir is absolute or outside the repo
    #[error("invalid dir {0:?}: must be a relative path inside the repo")]
    InvalidDir(String),

    /// A glob that does not compile
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// Pattern as written
        pattern: String,
        /// Compile failure
        reason: String,
    },

    /// A project name regex that does not compile
    #[error("invalid project name pattern {pattern:?}: {source}")]
    InvalidNamePattern {
        /// Pattern as written
        pattern: String,
        /// Compile failure
        #[source]
        source: regex::Error,
    },

    /// Filesystem failure
    #[error("reading {}: {source}", path.display())]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl DiscoveryError {
    /// Whether the error is the requester's to fix rather than the host's
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }

    /// Whether this is a lookup by name that found nothing
    #[inline]
    #[must_use]
    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::NoProjectNamed { .. })
    }
}
