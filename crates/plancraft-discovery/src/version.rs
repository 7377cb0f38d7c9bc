//! Tool version detection
//!
//! A version pinned in project config always wins. Otherwise the
//! project's `.tf` files are scanned in name order and the first
//! `required_version` found decides: an exact pin becomes the version, a
//! range or a malformed value means the server default is used.

use std::path::{Path, PathBuf};

use plancraft_config::ToolVersion;
use tracing::{debug, warn};

use crate::hcl;

/// Picks the tool version for a project
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionDetector;

impl VersionDetector {
    /// Detector
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Configured version if any, else the version pinned in `abs_dir`
    #[must_use]
    pub fn detect(&self, configured: Option<&ToolVersion>, abs_dir: &Path) -> Option<ToolVersion> {
        if let Some(version) = configured {
            return Some(version.clone());
        }
        self.detect_in_dir(abs_dir)
    }

    /// Version pinned by `required_version` in the `.tf` files of `abs_dir`
    #[must_use]
    pub fn detect_in_dir(&self, abs_dir: &Path) -> Option<ToolVersion> {
        for file in tf_files(abs_dir) {
            let Ok(source) = std::fs::read_to_string(&file) else {
                debug!(file = %file.display(), "skipping unreadable file");
                continue;
            };
            let Some(constraint) = hcl::required_version(&source) else {
                continue;
            };
            return match exact_version(&constraint) {
                Ok(Some(version)) => {
                    debug!(file = %file.display(), %version, "detected tool version");
                    Some(version)
                }
                Ok(None) => {
                    debug!(file = %file.display(), %constraint, "version constraint is a range");
                    None
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "ignoring malformed version constraint");
                    None
                }
            };
        }
        None
    }
}

/// `.tf` files directly in `dir`, sorted by name
pub(crate) fn tf_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "tf"))
        .collect();
    files.sort();
    files
}

/// Exact version of a constraint; `Ok(None)` for ranges
fn exact_version(
    constraint: &str,
) -> Result<Option<ToolVersion>, plancraft_config::VersionError> {
    let constraint = constraint.trim();
    if constraint.contains(',') || constraint.starts_with(['>', '<', '~', '!']) {
        return Ok(None);
    }
    let pinned = constraint.strip_prefix('=').unwrap_or(constraint).trim();
    pinned.parse().map(Some)
}
