//! Pipeline configuration.
//!
//! Loaded from an optional YAML file, layered with `MEDIA_PIPELINE__*`
//! environment variables (`__` separates section from key), then validated.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! storage:
//!   root: "public/uploads"
//!
//! compression:
//!   target_size_kb: 200
//!   initial_width: 1920
//!   initial_quality: 80
//!   quality_floor: 10
//!   quality_step: 5
//!
//! batch:
//!   max_concurrency: 4
//!   commit: "direct"
//!
//! mirror:
//!   endpoint: "https://api.imgbb.com/1/upload"
//!   api_key: "..."
//!   field_name: "image"
//!
//! logging:
//!   level: "info"
//!   json: false
//! ```
//!
//! Every section and key is optional. `MEDIA_PIPELINE__MIRROR__API_KEY=...`
//! overrides `mirror.api_key`.

use std::path::Path;

use compress::CompressionPolicy;
use ingest::IngestConfig;
use mirror::MirrorConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::BatchOptions;

/// File stem looked up in the working directory when no path is given.
pub const DEFAULT_FILE_STEM: &str = "media-pipeline";
/// Prefix of overriding environment variables.
pub const ENV_PREFIX: &str = "MEDIA_PIPELINE";

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level configuration for the whole pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upload root.
    pub storage: IngestConfig,
    pub compression: CompressionPolicy,
    pub batch: BatchOptions,
    /// Image host. Publishing is disabled while `api_key` is unset.
    pub mirror: MirrorConfig,
    pub logging: LoggingConfig,
}

/// Subscriber settings for the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive. `RUST_LOG` wins when set.
    pub level: String,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl PipelineConfig {
    /// Load from `path` (or `./media-pipeline.{yaml,yml,...}` if present)
    /// and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`load`](Self::load), reading overrides from `env` instead of the
    /// process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<::config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::with_name(DEFAULT_FILE_STEM).required(false),
        };
        let builder = ::config::Config::builder().add_source(file).add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: PipelineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document, without environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = ::config::Config::builder()
            .add_source(::config::File::from_str(yaml, ::config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage
            .validate()
            .map_err(|e| ConfigError::Validation(format!("storage: {e}")))?;
        self.compression
            .validate()
            .map_err(|e| ConfigError::Validation(format!("compression: {e}")))?;
        if self.mirror_enabled() {
            self.mirror
                .validate()
                .map_err(|e| ConfigError::Validation(format!("mirror: {e}")))?;
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation("logging: level must not be empty".into()));
        }
        Ok(())
    }

    /// Whether an image host key is configured.
    pub fn mirror_enabled(&self) -> bool {
        self.mirror.api_key.is_some()
    }
}
