//! Workspace inference for discovered projects

use std::path::Path;

use plancraft_config::{paths, DEFAULT_WORKSPACE};
use tracing::debug;

use crate::hcl;
use crate::version::tf_files;

/// Workspace declared for `repo_rel_dir`: the first `cloud` or `remote`
/// backend workspace name found walking from the dir up to the repo root,
/// `default` when there is none.
#[must_use]
pub fn detect_workspace(repo_root: &Path, repo_rel_dir: &str) -> String {
    let mut dir = paths::clean(repo_rel_dir);
    loop {
        let abs = if dir == "." {
            repo_root.to_path_buf()
        } else {
            repo_root.join(&dir)
        };
        for file in tf_files(&abs) {
            let Ok(source) = std::fs::read_to_string(&file) else {
                continue;
            };
            if let Some(name) = hcl::workspace_name(&source) {
                debug!(dir = %repo_rel_dir, file = %file.display(), workspace = %name, "detected workspace");
                return name;
            }
        }
        if dir == "." || dir.starts_with("..") {
            return DEFAULT_WORKSPACE.to_string();
        }
        dir = paths::parent(&dir);
    }
}
