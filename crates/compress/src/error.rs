use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the size-constrained compressor.
///
/// Missing the size budget is not one of them: the oversized encode is
/// returned and written like any other.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompressError {
    /// Header parsing, decoding, or JPEG encoding failed.
    #[error("image encode failed: {0}")]
    Encode(String),

    #[error("invalid compression policy: {0}")]
    InvalidPolicy(String),

    /// The encoded artifact could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CompressError {
    /// Whether the uploaded bytes, rather than the server, are at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, CompressError::Encode(_))
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            CompressError::Encode(_) => 422,
            CompressError::InvalidPolicy(_) | CompressError::Io { .. } => 500,
        }
    }
}

impl From<image::ImageError> for CompressError {
    fn from(err: image::ImageError) -> Self {
        CompressError::Encode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(CompressError::Encode("bad".into()).http_status_code(), 422);
        assert!(CompressError::Encode("bad".into()).is_client_error());
        let io = CompressError::Io {
            path: PathBuf::from("/nope/1.jpeg"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert!(!io.is_client_error());
        assert_eq!(io.http_status_code(), 500);
        assert!(io.to_string().contains("/nope/1.jpeg"));
    }
}
