use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while mirroring a stored file.
///
/// None of these touch the local file; a failed publish leaves it in place.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MirrorError {
    #[error("mirror api key is not configured")]
    MissingApiKey,

    #[error("invalid mirror config: {0}")]
    InvalidConfig(String),

    /// The stored file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Transport failure before a response arrived.
    #[error("upload request failed: {0}")]
    Request(String),

    /// The host answered with a non-success status.
    #[error("HTTP error {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not JSON.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The JSON body had no `data.url` string.
    #[error("response did not contain data.url: {0}")]
    MissingUrl(String),
}

impl MirrorError {
    pub fn is_client_error(&self) -> bool {
        false
    }

    /// Status a collaborator should answer with: remote failures are a bad
    /// gateway, local ones an internal error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            MirrorError::Request(_)
            | MirrorError::Status { .. }
            | MirrorError::InvalidResponse(_)
            | MirrorError::MissingUrl(_) => 502,
            MirrorError::MissingApiKey | MirrorError::InvalidConfig(_) | MirrorError::Read { .. } => {
                500
            }
        }
    }
}
