//! Configuration for destination resolution.
//!
//! [`IngestConfig`] holds the filesystem root every upload directory hangs
//! off. It is cheap to clone and deserializes from any serde format.
//!
//! ```rust
//! use ingest::IngestConfig;
//! use std::path::PathBuf;
//!
//! let config = IngestConfig::default();
//! assert_eq!(config.root, PathBuf::from("uploads"));
//! config.validate().expect("default config is valid");
//! ```
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime configuration for the context resolver.
///
/// # Serialization
///
/// ```json
/// { "root": "public/uploads" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory under which `<owner>/<subpath>/` trees are created.
    ///
    /// Relative paths are resolved against the process working directory.
    ///
    /// Default: `uploads`
    pub root: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("uploads"),
        }
    }
}

/// Validation failures for [`IngestConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The upload root is the empty path.
    #[error("upload root must not be empty")]
    EmptyRoot,
}

impl IngestConfig {
    /// Config rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Checks the configuration for internal consistency.
    ///
    /// ```rust
    /// use ingest::{ConfigError, IngestConfig};
    ///
    /// let bad = IngestConfig::with_root("");
    /// assert_eq!(bad.validate(), Err(ConfigError::EmptyRoot));
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyRoot);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let cfg: IngestConfig = serde_json::from_str("{}").expect("empty object");
        assert_eq!(cfg, IngestConfig::default());

        let cfg: IngestConfig =
            serde_json::from_str(r#"{"root":"public/uploads"}"#).expect("root only");
        assert_eq!(cfg.root, PathBuf::from("public/uploads"));
    }

    #[test]
    fn with_root_validates() {
        assert!(IngestConfig::with_root("/srv/media").validate().is_ok());
    }
}
