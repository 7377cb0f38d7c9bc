//! Error types for the command builder
//!
//! [`BuildError`] wraps the config, policy and discovery errors so a caller
//! can surface every failure with one type while still telling user
//! mistakes from infrastructure failures.

use plancraft_config::{ConfigError, PolicyError};
use plancraft_discovery::DiscoveryError;

use crate::collaborators::CollaboratorError;

/// Why a build failed
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The repo config is unusable
    #[error("parsing {file}: {source}")]
    Config {
        /// Config file name
        file: String,
        /// Underlying error
        #[source]
        source: ConfigError,
    },

    /// The repo config conflicts with server-side policy
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The request does not resolve to projects
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// A collaborator call failed
    #[error("{operation}: {source}")]
    Collaborator {
        /// What the builder was doing
        operation: &'static str,
        /// Underlying error
        #[source]
        source: CollaboratorError,
    },

    /// Another command holds the checkout
    #[error(
        "the {workspace} workspace at path {path} is currently locked by another command that is running for this pull request; wait until the previous command is complete and try again"
    )]
    WorkspaceLocked {
        /// Workspace
        workspace: String,
        /// Repo-relative path
        path: String,
    },

    /// Apply or version without a prior plan
    #[error("no working directory found for workspace {workspace:?}: did you run plan?")]
    NoWorkingDir {
        /// Workspace
        workspace: String,
    },
}

impl BuildError {
    /// Create a config error
    #[inline]
    pub fn config(file: impl Into<String>, source: ConfigError) -> Self {
        Self::Config {
            file: file.into(),
            source,
        }
    }

    /// Create a collaborator error
    #[inline]
    pub fn collaborator(operation: &'static str, source: CollaboratorError) -> Self {
        Self::Collaborator { operation, source }
    }

    /// Whether the user can fix this by changing the request or the repo
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Config { source, .. } => source.is_user_error(),
            Self::Policy(_) | Self::WorkspaceLocked { .. } | Self::NoWorkingDir { .. } => true,
            Self::Discovery(e) => e.is_user_error(),
            Self::Collaborator { .. } => false,
        }
    }

    /// Whether the error clears up by itself once a running command ends
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WorkspaceLocked { .. } | Self::Collaborator { .. })
    }
}

/// Result alias for build operations
pub type Result<T> = std::result::Result<T, BuildError>;
