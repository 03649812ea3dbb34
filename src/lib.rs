//! Workspace umbrella crate for the media upload pipeline.
//!
//! This crate stitches the stage crates together so callers can go from raw
//! multipart buffers to stored (and optionally mirrored) JPEGs with a single
//! API entry point:
//!
//! 1. [`ingest::plan`] resolves the upload context into a directory and a
//!    list of `(slot, input, path)` work items.
//! 2. [`provision::ensure_directory`] creates the directory, once.
//! 3. [`batch::run_batch`] compresses every item on the blocking pool.
//! 4. [`UploadPipeline::publish`] mirrors one stored file to the image host.
//!
//! ```no_run
//! use media_pipeline::{RawImageInput, UploadContext, UploadKind, UploadPipeline};
//!
//! # async fn run() -> Result<(), media_pipeline::PipelineError> {
//! let pipeline = UploadPipeline::default();
//! let ctx = UploadContext::new(UploadKind::Product, "a@b.com")
//!     .with_product_id(pipeline.allocate_product_id()?);
//! let inputs = RawImageInput::from_buffers("imageInput", vec![std::fs::read("1.png").unwrap()]);
//! let outcome = pipeline.ingest(&ctx, inputs).await?;
//! assert_eq!(outcome.file_count(), 1);
//! # Ok(())
//! # }
//! ```

pub use compress::{CompressError, CompressedArtifact, CompressionPolicy};
pub use ingest::{
    IngestConfig, IngestError, KTP_FIELD, ProductIdAllocator, RawImageInput, SELFIE_FIELD, Slot,
    UploadContext, UploadKind, UploadPlan,
};
pub use mirror::{MirrorClient, MirrorConfig, MirrorError, Publisher};

pub mod batch;
pub mod config;
pub mod provision;

mod pipeline;

pub use crate::batch::{BatchOptions, CommitMode, StoredImage, run_batch};
pub use crate::config::{LoggingConfig, PipelineConfig};
pub use crate::pipeline::{IngestOutcome, PublishedUpload, UploadPipeline};

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Errors that can occur while taking an upload through the pipeline.
///
/// Context and provisioning errors happen before any image work starts.
/// Compression errors abort the batch, but in [`CommitMode::Direct`] files
/// already written by sibling tasks stay on disk.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("unsupported upload context: {0}")]
    UnsupportedContext(String),

    #[error("owner identity is empty")]
    MissingIdentity,

    #[error("product upload requires a product id")]
    MissingProductId,

    /// Any other resolver failure.
    #[error("ingest failure: {0}")]
    Ingest(#[source] IngestError),

    #[error("failed to create directory {}: {reason}", path.display())]
    DirectoryCreation { path: PathBuf, reason: String },

    #[error("failed to encode {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid compression policy: {0}")]
    InvalidPolicy(String),

    #[error("compression task for {} did not complete: {reason}", path.display())]
    Task { path: PathBuf, reason: String },

    #[error("remote upload failed: {0}")]
    RemoteUpload(#[from] MirrorError),

    #[error("no mirror is configured")]
    MirrorDisabled,

    #[error("slot {0} was not stored by this upload")]
    SlotNotStored(Slot),

    #[error("failed to remove {}: {source}", path.display())]
    GalleryRemoval {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Map a compressor failure for the file at `path`.
    pub fn from_compress(path: PathBuf, err: CompressError) -> Self {
        match err {
            CompressError::Encode(reason) => PipelineError::Encode { path, reason },
            CompressError::Io { path, source } => PipelineError::Write { path, source },
            CompressError::InvalidPolicy(reason) => PipelineError::InvalidPolicy(reason),
            other => PipelineError::Encode {
                path,
                reason: other.to_string(),
            },
        }
    }

    /// Whether the caller's request, rather than the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        match self {
            PipelineError::UnsupportedContext(_)
            | PipelineError::MissingIdentity
            | PipelineError::MissingProductId
            | PipelineError::Encode { .. }
            | PipelineError::SlotNotStored(_) => true,
            PipelineError::Ingest(err) => err.is_client_error(),
            _ => false,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PipelineError::UnsupportedContext(_)
            | PipelineError::MissingIdentity
            | PipelineError::MissingProductId
            | PipelineError::SlotNotStored(_) => 400,
            PipelineError::Ingest(err) => err.http_status_code(),
            PipelineError::Encode { .. } => 422,
            PipelineError::RemoteUpload(err) => err.http_status_code(),
            PipelineError::MirrorDisabled => 503,
            _ => 500,
        }
    }
}

impl From<IngestError> for PipelineError {
    fn from(value: IngestError) -> Self {
        match value {
            IngestError::UnsupportedContext(kind) => PipelineError::UnsupportedContext(kind),
            IngestError::MissingIdentity => PipelineError::MissingIdentity,
            IngestError::MissingProductId => PipelineError::MissingProductId,
            other => PipelineError::Ingest(other),
        }
    }
}

/// Metrics observer for pipeline stages.
///
/// Compression events are reported from blocking-pool threads.
pub trait PipelineMetrics: Send + Sync {
    fn record_batch(&self, latency: Duration, items: usize, result: Result<(), &PipelineError>);
    fn record_compression(
        &self,
        latency: Duration,
        slot: Slot,
        result: Result<&CompressedArtifact, &CompressError>,
    );
    fn record_publish(&self, latency: Duration, result: Result<(), &PipelineError>);
}

/// Install or clear the global pipeline metrics recorder.
pub fn set_pipeline_metrics(recorder: Option<Arc<dyn PipelineMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn PipelineMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn PipelineMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn PipelineMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

pub(crate) struct MetricsSpan {
    recorder: Arc<dyn PipelineMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    pub(crate) fn record_batch(self, items: usize, result: Result<(), &PipelineError>) {
        self.recorder
            .record_batch(self.start.elapsed(), items, result);
    }

    pub(crate) fn record_compression(
        self,
        slot: Slot,
        result: Result<&CompressedArtifact, &CompressError>,
    ) {
        self.recorder
            .record_compression(self.start.elapsed(), slot, result);
    }

    pub(crate) fn record_publish(self, result: Result<(), &PipelineError>) {
        self.recorder.record_publish(self.start.elapsed(), result);
    }
}
