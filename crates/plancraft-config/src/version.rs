//! Tool versions pinned by project config or detected from sources
//!
//! Versions are written with or without a leading `v` (`v0.12.6`, `0.12.6`)
//! and are always displayed without it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A semantic tool version (`major.minor.patch[-pre]`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolVersion {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Option<String>,
}

impl ToolVersion {
    /// Create a release version
    #[inline]
    #[must_use]
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    /// Attach a pre-release tag
    #[inline]
    #[must_use]
    pub fn with_pre(mut self, pre: impl Into<String>) -> Self {
        self.pre = Some(pre.into());
        self
    }

    /// Major component
    #[inline]
    #[must_use]
    pub fn major(&self) -> u64 {
        self.major
    }

    /// Minor component
    #[inline]
    #[must_use]
    pub fn minor(&self) -> u64 {
        self.minor
    }

    /// Patch component
    #[inline]
    #[must_use]
    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Pre-release tag, if any
    #[inline]
    #[must_use]
    pub fn pre(&self) -> Option<&str> {
        self.pre.as_deref()
    }
}

/// Version string parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed version {input:?}")]
pub struct VersionError {
    /// Input as given
    pub input: String,
}

impl FromStr for ToolVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionError {
            input: s.to_string(),
        };

        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        // Build metadata never takes part in comparisons.
        let trimmed = trimmed.split('+').next().unwrap_or_default();

        let (core, pre) = match trimmed.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return Err(err()),
            None => (trimmed, None),
        };

        let mut parts = core.split('.');
        let mut next = |required: bool| -> Result<u64, VersionError> {
            match parts.next() {
                Some(p) if !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()) => {
                    p.parse().map_err(|_| err())
                }
                None if !required => Ok(0),
                _ => Err(err()),
            }
        };

        let major = next(true)?;
        let minor = next(false)?;
        let patch = next(false)?;
        if parts.next().is_some() {
            return Err(err());
        }

        Ok(Self {
            major,
            minor,
            patch,
            pre,
        })
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl Serialize for ToolVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ToolVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_prefix() {
        let v: ToolVersion = "v0.12.6".parse().unwrap();
        assert_eq!(v, ToolVersion::new(0, 12, 6));
        assert_eq!(v.to_string(), "0.12.6");

        let v: ToolVersion = "1.5.7".parse().unwrap();
        assert_eq!(v.to_string(), "1.5.7");
    }

    #[test]
    fn missing_components_default_to_zero() {
        let v: ToolVersion = "0.12".parse().unwrap();
        assert_eq!(v.to_string(), "0.12.0");
    }

    #[test]
    fn keeps_prerelease_and_drops_metadata() {
        let v: ToolVersion = "1.6.0-beta1+abc".parse().unwrap();
        assert_eq!(v.pre(), Some("beta1"));
        assert_eq!(v.to_string(), "1.6.0-beta1");
    }

    #[test]
    fn rejects_garbage() {
        for input in ["", "v", "1.x.0", "1.2.3.4", ">= 1.0", "1.0-"] {
            assert!(input.parse::<ToolVersion>().is_err(), "{input:?} parsed");
        }
    }

    #[test]
    fn serializes_as_display_string() {
        let v = ToolVersion::new(1, 2, 3);
        assert_eq!(serde_yaml::to_string(&v).unwrap().trim(), "1.2.3");
    }
}
