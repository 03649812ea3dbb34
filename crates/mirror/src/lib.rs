//! Remote mirror for stored images.
//!
//! After a batch has written its files, a caller may push one of them to a
//! third-party host to obtain a public URL. [`MirrorClient`] speaks the
//! imgbb upload API: a single multipart POST with the file under the
//! `image` field, the API key in the `key` query parameter, and the URL read
//! back from `data.url` in the JSON response.
//!
//! Callers that want a different host, or none in tests, implement
//! [`Publisher`] themselves.
//!
//! ```no_run
//! use mirror::{MirrorClient, MirrorConfig, Publisher};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), mirror::MirrorError> {
//! let client = MirrorClient::new(&MirrorConfig::default().with_api_key("imgbb-key"))?;
//! let url = client.publish(Path::new("uploads/a@b.com/profile/a.jpeg")).await?;
//! println!("{url}");
//! # Ok(())
//! # }
//! ```
mod client;
mod config;
mod error;

pub use crate::client::{MirrorClient, Publisher};
pub use crate::config::{MirrorConfig, DEFAULT_ENDPOINT};
pub use crate::error::MirrorError;
