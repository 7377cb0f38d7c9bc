//! plancraft config - what a pull request is allowed to run
//!
//! Three sources of configuration meet here:
//! - **Repo config**: `plancraft.yaml` committed at the root of the checkout
//! - **Global policy**: operator-owned rules keyed by repository ID
//! - **User config**: server-wide defaults chosen when the server starts
//!
//! The repo config is parsed and validated once per checkout. The global
//! policy decides which of its fields a repository may override, and the
//! [`GlobalPolicyResolver`] folds all three into the settings each project
//! is built with.
//!
//! # Example
//!
//! ```rust,ignore
//! use plancraft_config::{GlobalConfig, GlobalConfigArgs, GlobalPolicyResolver, RepoConfigResolver};
//!
//! let resolver = RepoConfigResolver::default();
//! let repo = resolver.resolve(checkout_root)?;
//!
//! let global = GlobalConfig::from_args(GlobalConfigArgs::default());
//! let policy = GlobalPolicyResolver::new(&global);
//! let settings = policy.merge("github.com/owner/repo", repo.as_ref(), &user)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod global;
pub mod merge;
pub mod parser;
pub mod paths;
pub mod repo;
pub mod resolver;
pub mod user;
pub mod version;
pub mod workflow;

pub use error::{ConfigError, PolicyError};
pub use global::{
    AllowedOverride, EffectiveRepoRule, GlobalConfig, GlobalConfigArgs, PolicyMode, RepoIdMatcher,
    RepoRule,
};
pub use merge::{GlobalPolicyResolver, MergedProjectConfig, ResolvedSettings};
pub use parser::parse_repo_config;
pub use repo::{
    ApplyRequirement, AutoDiscoverConfig, AutoDiscoverMode, AutoplanConfig, ProjectConfig,
    RepoConfig, DEFAULT_REPO_CONFIG_FILE, DEFAULT_REPO_REL_DIR, DEFAULT_WORKSPACE,
};
pub use resolver::RepoConfigResolver;
pub use user::{UserConfig, DEFAULT_AUTOPLAN_FILE_LIST};
pub use version::{ToolVersion, VersionError};
pub use workflow::{Stage, Step, Workflow, DEFAULT_WORKFLOW_NAME};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with plancraft configuration
    pub use crate::{
        AutoDiscoverMode, ConfigError, GlobalConfig, GlobalPolicyResolver, PolicyError,
        ProjectConfig, RepoConfig, RepoConfigResolver, ToolVersion, UserConfig, Workflow,
    };
}
