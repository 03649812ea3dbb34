use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{info, warn, Instrument, Level};

use crate::{MirrorConfig, MirrorError};

/// Anything that can turn a stored file into a public URL.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, local_path: &Path) -> Result<String, MirrorError>;
}

/// Multipart uploader for imgbb-style hosts.
///
/// One POST per call with the key as a query parameter. No retries and no
/// timeout beyond what the transport imposes.
#[derive(Clone)]
pub struct MirrorClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    field_name: String,
}

impl std::fmt::Debug for MirrorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorClient")
            .field("endpoint", &self.endpoint)
            .field("field_name", &self.field_name)
            .finish_non_exhaustive()
    }
}

impl MirrorClient {
    /// Fails with [`MirrorError::MissingApiKey`] when no key is configured.
    pub fn new(cfg: &MirrorConfig) -> Result<Self, MirrorError> {
        Self::with_http_client(cfg, reqwest::Client::new())
    }

    pub fn with_http_client(cfg: &MirrorConfig, http: reqwest::Client) -> Result<Self, MirrorError> {
        cfg.validate()?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
            api_key: cfg.api_key.clone().unwrap_or_default(),
            field_name: cfg.field_name.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn upload_file(&self, local_path: &Path) -> Result<String, MirrorError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|source| MirrorError::Read {
                path: local_path.to_path_buf(),
                source,
            })?;
        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image.jpeg");
        self.publish_bytes(bytes, file_name).await
    }

    /// Upload in-memory bytes under `file_name`.
    pub async fn publish_bytes(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, MirrorError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("image/jpeg")
            .map_err(|e| MirrorError::Request(format!("invalid multipart part: {e}")))?;
        let form = Form::new().part(self.field_name.clone(), part);

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(|e| MirrorError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MirrorError::Status { status, body });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| MirrorError::InvalidResponse(format!("invalid JSON response: {e}")))?;
        extract_url(&body)
    }
}

#[async_trait]
impl Publisher for MirrorClient {
    async fn publish(&self, local_path: &Path) -> Result<String, MirrorError> {
        let start = Instant::now();
        let span = tracing::span!(Level::INFO, "mirror.publish", path = %local_path.display());

        async {
            match self.upload_file(local_path).await {
                Ok(url) => {
                    info!(url = %url, elapsed_micros = start.elapsed().as_micros(), "publish_success");
                    Ok(url)
                }
                Err(err) => {
                    warn!(error = %err, elapsed_micros = start.elapsed().as_micros(), "publish_failure");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn extract_url(body: &Value) -> Result<String, MirrorError> {
    body.pointer("/data/url")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| MirrorError::MissingUrl(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_comes_from_data_url() {
        let body = json!({ "data": { "url": "https://i.ibb.co/x/a.jpeg", "id": "x" }, "success": true });
        assert_eq!(extract_url(&body).unwrap(), "https://i.ibb.co/x/a.jpeg");
    }

    #[test]
    fn missing_or_non_string_url() {
        assert!(matches!(
            extract_url(&json!({ "data": {} })),
            Err(MirrorError::MissingUrl(_))
        ));
        assert!(matches!(
            extract_url(&json!({ "data": { "url": 7 } })),
            Err(MirrorError::MissingUrl(_))
        ));
    }

    #[test]
    fn client_requires_key() {
        assert!(matches!(
            MirrorClient::new(&MirrorConfig::default()),
            Err(MirrorError::MissingApiKey)
        ));
    }
}
