//! Error types for plancraft config
//!
//! [`ConfigError`] covers a repo config that cannot be used at all: bad YAML,
//! an unsupported schema version, paths escaping the checkout, duplicate
//! entries. [`PolicyError`] covers a well-formed repo config that asks for
//! something the operator's policy forbids.

use std::path::PathBuf;

use crate::global::AllowedOverride;
use crate::version::VersionError;

/// Repo config errors; fatal for the whole build
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// YAML could not be decoded into the config schema
    #[error("invalid yaml: {0}")]
    Syntax(#[from] serde_yaml::Error),

    /// The file exists but has no content
    #[error("config file is empty")]
    Empty,

    /// No `version` key
    #[error("missing 'version' key: supported versions are 2 and 3")]
    MissingVersion,

    /// A `version` this parser does not understand
    #[error("unsupported config version {0}: supported versions are 2 and 3")]
    UnsupportedVersion(u32),

    /// A project entry without a `dir`
    #[error("project at index {index} is missing the required 'dir' key")]
    MissingDir {
        /// Position of the entry under `projects:`
        index: usize,
    },

    /// Directory is absolute or escapes the checkout root
    #[error("invalid dir {dir:?}: {reason}")]
    InvalidDir {
        /// Directory as written
        dir: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Workspace names must be non-empty path-free tokens
    #[error("invalid workspace {0:?}: workspace names cannot be empty or contain '/'")]
    InvalidWorkspace(String),

    /// Two projects with the same name
    #[error("found two or more projects with name {0:?}; project names must be unique")]
    DuplicateName(String),

    /// Two projects with the same dir and workspace where at least one is unnamed
    #[error(
        "there are two or more projects with dir: {dir:?} workspace: {workspace:?} that are not all named; \
         they must have a 'name' key so they can be targeted separately"
    )]
    DuplicateUnnamed {
        /// Shared directory
        dir: String,
        /// Shared workspace
        workspace: String,
    },

    /// Unknown apply requirement
    #[error("invalid apply requirement {0:?}: supported requirements are approved, mergeable and undiverged")]
    InvalidApplyRequirement(String),

    /// Unknown autodiscover mode
    #[error("invalid autodiscover mode {0:?}: supported modes are auto, enabled and disabled")]
    InvalidAutoDiscoverMode(String),

    /// `terraform_version` is not a version
    #[error("invalid terraform_version {value:?}: {source}")]
    InvalidVersion {
        /// Value as written
        value: String,
        /// Parse failure
        #[source]
        source: VersionError,
    },

    /// A workflow step that cannot be understood
    #[error("invalid step in workflow {workflow:?}: {reason}")]
    InvalidStep {
        /// Workflow the step belongs to
        workflow: String,
        /// What is wrong with it
        reason: String,
    },

    /// Filesystem failure while reading the config
    #[error("reading {}: {source}", path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create an invalid dir error
    #[inline]
    pub fn invalid_dir(dir: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidDir {
            dir: dir.into(),
            reason,
        }
    }

    /// Create an invalid step error
    #[inline]
    pub fn invalid_step(workflow: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidStep {
            workflow: workflow.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by the committed file rather than the host
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }
}

/// Global policy errors
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The repo sets a key the operator did not allow it to override
    #[error(
        "repo config not allowed to set '{key}' key: server-side config needs 'allowed_overrides: [{key}]' \
         (project in dir {dir:?})"
    )]
    OverrideNotAllowed {
        /// Governed key
        key: AllowedOverride,
        /// Directory of the offending project
        dir: String,
    },

    /// The repo defines `workflows:` without permission
    #[error("repo config not allowed to define custom workflows: server-side config needs 'allow_custom_workflows: true'")]
    CustomWorkflowsNotAllowed,

    /// A workflow reference that resolves nowhere
    #[error("workflow {0:?} is not defined anywhere")]
    UndefinedWorkflow(String),

    /// A `/regex/` repo id that does not compile
    #[error("invalid repo id pattern {pattern:?}: {source}")]
    InvalidRepoPattern {
        /// Pattern as written
        pattern: String,
        /// Compile failure
        #[source]
        source: regex::Error,
    },

    /// The server-side config file itself is malformed
    #[error("invalid server-side config: {0}")]
    InvalidGlobalConfig(String),
}

/// Result alias for config operations
pub type Result<T> = std::result::Result<T, ConfigError>;
