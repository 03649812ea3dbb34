use serde::{Deserialize, Serialize};

use crate::MirrorError;

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://api.imgbb.com/1/upload";

/// Where and how to mirror stored images.
///
/// # Example
/// ```
/// use mirror::MirrorConfig;
///
/// let cfg = MirrorConfig::default().with_api_key("imgbb-key");
/// assert_eq!(cfg.field_name, "image");
/// cfg.validate().expect("key present");
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MirrorConfig {
    /// Upload endpoint receiving the multipart POST.
    pub endpoint: String,
    /// Sent as the `key` query parameter. Required before publishing.
    pub api_key: Option<String>,
    /// Multipart field carrying the file.
    pub field_name: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            api_key: None,
            field_name: "image".into(),
        }
    }
}

impl std::fmt::Debug for MirrorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("field_name", &self.field_name)
            .finish()
    }
}

impl MirrorConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_field_name(mut self, field: impl Into<String>) -> Self {
        self.field_name = field.into();
        self
    }

    pub fn validate(&self) -> Result<(), MirrorError> {
        if self.endpoint.trim().is_empty() {
            return Err(MirrorError::InvalidConfig("endpoint must not be empty".into()));
        }
        if self.field_name.trim().is_empty() {
            return Err(MirrorError::InvalidConfig("field_name must not be empty".into()));
        }
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(MirrorError::MissingApiKey),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_imgbb() {
        let cfg = MirrorConfig::default();
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.field_name, "image");
        assert!(matches!(cfg.validate(), Err(MirrorError::MissingApiKey)));
    }

    #[test]
    fn blank_key_is_missing() {
        let cfg = MirrorConfig::default().with_api_key("  ");
        assert!(matches!(cfg.validate(), Err(MirrorError::MissingApiKey)));
    }

    #[test]
    fn empty_endpoint_is_invalid() {
        let cfg = MirrorConfig::default().with_api_key("k").with_endpoint("");
        assert!(matches!(cfg.validate(), Err(MirrorError::InvalidConfig(_))));
    }

    #[test]
    fn debug_redacts_key() {
        let cfg = MirrorConfig::default().with_api_key("s3cret");
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn deserializes_partial() {
        let cfg: MirrorConfig = serde_json::from_str(r#"{"api_key":"abc"}"#).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
    }
}
