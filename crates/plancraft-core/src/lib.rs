//! plancraft core - building command contexts for a pull request
//!
//! The [`ProjectCommandBuilder`] is the entry point. Given a pull request
//! and a command, it:
//! - Obtains a checkout through the [`WorkingDir`] collaborator, unless the
//!   config fetched through the [`VcsClient`] shows nothing to do
//! - Loads the repo config and merges it with the operator's policy
//! - Discovers affected projects, or resolves the requested one
//! - Detects tool versions and assembles one [`ProjectContext`] per command
//!
//! Contexts are data for an execution layer; nothing here runs a tool.
//!
//! # Example
//!
//! ```rust,ignore
//! use plancraft_core::{CommandContext, ProjectCommandBuilder, WorkspaceLockCoordinator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let builder = ProjectCommandBuilder::new(vcs, working_dir, WorkspaceLockCoordinator::new(), global, user)?;
//! let contexts = builder.build_autoplan_commands(&ctx).await?;
//! for c in &contexts {
//!     println!("{} {} in {}", c.command_name, c.repo_rel_dir, c.workspace);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod builder;
pub mod collaborators;
pub mod command;
pub mod context;
pub mod error;
pub mod locker;
pub mod models;

pub use builder::ProjectCommandBuilder;
pub use collaborators::{CollaboratorError, VcsClient, WorkingDir};
pub use command::{CommandContext, CommandName, CommentCommand};
pub use context::{escape_args, MetricsScope, ProjectContext};
pub use error::BuildError;
pub use locker::{WorkspaceLock, WorkspaceLockCoordinator, WorkspaceLockKey};
pub use models::{PullRequest, PullStatus, Repo, User};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with plancraft core
    pub use crate::{
        BuildError, CommandContext, CommandName, CommentCommand, ProjectCommandBuilder,
        ProjectContext, VcsClient, WorkingDir, WorkspaceLockCoordinator,
    };
}
