//! Locating and loading the repo config of a checkout

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;
use crate::parser::parse_repo_config;
use crate::repo::{RepoConfig, DEFAULT_REPO_CONFIG_FILE};

/// Loads the repo config file from a checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoConfigResolver {
    file_name: String,
}

impl Default for RepoConfigResolver {
    fn default() -> Self {
        Self::new(DEFAULT_REPO_CONFIG_FILE)
    }
}

impl RepoConfigResolver {
    /// Resolver for a root-relative config file name
    #[inline]
    #[must_use]
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Config file name, relative to the checkout root
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Whether the checkout contains a config file
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] when the filesystem cannot be queried.
    pub fn has_config(&self, checkout_root: &Path) -> Result<bool, ConfigError> {
        let path = checkout_root.join(&self.file_name);
        path.try_exists()
            .map_err(|source| ConfigError::Io { path, source })
    }

    /// Load and validate the config of a checkout; `None` when there is none
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from reading or parsing the file.
    pub fn resolve(&self, checkout_root: &Path) -> Result<Option<RepoConfig>, ConfigError> {
        let path = checkout_root.join(&self.file_name);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(file = %self.file_name, "no repo config file found");
                return Ok(None);
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        let config = self.parse(&data)?;
        debug!(
            file = %self.file_name,
            projects = config.projects.len(),
            "loaded repo config"
        );
        Ok(Some(config))
    }

    /// Parse config bytes obtained elsewhere, such as a single-file download
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from parsing or validation.
    #[inline]
    pub fn parse(&self, data: &[u8]) -> Result<RepoConfig, ConfigError> {
        parse_repo_config(data)
    }
}
