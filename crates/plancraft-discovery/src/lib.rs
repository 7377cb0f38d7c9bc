//! plancraft discovery - which projects a pull request touches
//!
//! Turns a pull request's changed files plus the repo config into candidate
//! projects, each a directory and a workspace with an optional name:
//!
//! - [`PathMatcher`]: `when_modified` and ignore glob evaluation
//! - [`ProjectFinder`]: autoplan discovery from changed files and config
//! - [`select_projects`]: resolution of an explicit dir, workspace or name
//! - [`VersionDetector`] and [`detect_workspace`]: facts read from `.tf` sources
//! - [`PendingPlanFinder`]: plan files waiting to be applied
//!
//! Nothing here talks to a VCS or runs a tool; the filesystem is only read.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod changeset;
pub mod error;
pub mod finder;
pub mod hcl;
pub mod matcher;
pub mod pending;
pub mod select;
pub mod version;
pub mod workspace;

pub use changeset::ChangeSet;
pub use error::DiscoveryError;
pub use finder::{Candidate, DiscoveryOptions, ProjectFinder};
pub use matcher::PathMatcher;
pub use pending::{plan_file_name, project_name_from_plan_file, PendingPlan, PendingPlanFinder};
pub use select::{
    check_changes_in_projects, check_dir_in_changes, projects_named, request_dir,
    select_projects, ProjectRequest,
};
pub use version::VersionDetector;
pub use workspace::detect_workspace;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
