use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use compress::CompressionPolicy;
use ingest::{
    IngestConfig, ProductIdAllocator, RandomProductIds, RawImageInput, Slot, UploadContext,
    UploadKind,
};
use mirror::{MirrorClient, Publisher};
use tracing::{info, warn};

use crate::batch::{BatchOptions, StoredImage, run_batch};
use crate::config::PipelineConfig;
use crate::{MetricsSpan, PipelineError};

/// Result of storing one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub kind: UploadKind,
    pub directory: PathBuf,
    /// Stored files in plan order.
    pub images: Vec<StoredImage>,
}

impl IngestOutcome {
    /// Number of files written. For product uploads this is the gallery size.
    pub fn file_count(&self) -> usize {
        self.images.len()
    }

    pub fn path_for(&self, slot: Slot) -> Option<&Path> {
        self.images
            .iter()
            .find(|image| image.slot == slot)
            .map(|image| image.path.as_path())
    }
}

/// An upload that was stored and then mirrored.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedUpload {
    pub outcome: IngestOutcome,
    pub url: String,
}

/// Single entry point tying resolution, compression, storage and mirroring
/// together.
#[derive(Clone)]
pub struct UploadPipeline {
    ingest: IngestConfig,
    policy: CompressionPolicy,
    batch: BatchOptions,
    publisher: Option<Arc<dyn Publisher>>,
    product_ids: Arc<dyn ProductIdAllocator>,
}

impl Default for UploadPipeline {
    fn default() -> Self {
        Self::new(IngestConfig::default(), CompressionPolicy::DEFAULT)
    }
}

impl std::fmt::Debug for UploadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPipeline")
            .field("ingest", &self.ingest)
            .field("policy", &self.policy)
            .field("batch", &self.batch)
            .field("publisher", &self.publisher.is_some())
            .finish_non_exhaustive()
    }
}

impl UploadPipeline {
    /// Pipeline without a mirror, drawing random product ids.
    pub fn new(ingest: IngestConfig, policy: CompressionPolicy) -> Self {
        Self {
            ingest,
            policy,
            batch: BatchOptions::default(),
            publisher: None,
            product_ids: Arc::new(RandomProductIds::new()),
        }
    }

    /// Build from loaded configuration. A [`MirrorClient`] is attached when
    /// `mirror.api_key` is set.
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self, PipelineError> {
        cfg.validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        let mut pipeline =
            Self::new(cfg.storage.clone(), cfg.compression).with_batch_options(cfg.batch);
        if cfg.mirror_enabled() {
            let client = MirrorClient::new(&cfg.mirror)?;
            pipeline = pipeline.with_publisher(Arc::new(client));
        }
        Ok(pipeline)
    }

    pub fn with_batch_options(mut self, batch: BatchOptions) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_product_ids(mut self, allocator: Arc<dyn ProductIdAllocator>) -> Self {
        self.product_ids = allocator;
        self
    }

    pub fn root(&self) -> &Path {
        &self.ingest.root
    }

    pub fn policy(&self) -> &CompressionPolicy {
        &self.policy
    }

    /// Resolve, provision, and compress every input of one upload.
    pub async fn ingest(
        &self,
        ctx: &UploadContext,
        inputs: Vec<RawImageInput>,
    ) -> Result<IngestOutcome, PipelineError> {
        let plan = ingest::plan(ctx, inputs, &self.ingest)?;
        let kind = plan.kind;
        let directory = plan.directory.clone();
        let images = run_batch(plan, &self.policy, &self.batch).await?;
        Ok(IngestOutcome {
            kind,
            directory,
            images,
        })
    }

    /// Mirror a stored file and return its public URL.
    pub async fn publish(&self, local_path: &Path) -> Result<String, PipelineError> {
        let metrics = MetricsSpan::start();
        let result = match &self.publisher {
            Some(publisher) => publisher.publish(local_path).await.map_err(PipelineError::from),
            None => Err(PipelineError::MirrorDisabled),
        };
        if let Some(span) = metrics {
            span.record_publish(result.as_ref().map(|_| ()));
        }
        result
    }

    /// Store the upload, then mirror the file stored for `slot`.
    ///
    /// A mirror failure leaves the stored files in place.
    pub async fn ingest_and_publish(
        &self,
        ctx: &UploadContext,
        inputs: Vec<RawImageInput>,
        slot: Slot,
    ) -> Result<PublishedUpload, PipelineError> {
        if self.publisher.is_none() {
            return Err(PipelineError::MirrorDisabled);
        }
        let outcome = self.ingest(ctx, inputs).await?;
        let path = outcome
            .path_for(slot)
            .ok_or(PipelineError::SlotNotStored(slot))?
            .to_path_buf();
        let url = self.publish(&path).await?;
        Ok(PublishedUpload { outcome, url })
    }

    /// Draw an identifier for a new product listing.
    pub fn allocate_product_id(&self) -> Result<u32, PipelineError> {
        Ok(self.product_ids.allocate()?)
    }

    /// Delete every stored photo of a listing.
    ///
    /// Returns `false` when the gallery directory did not exist.
    pub async fn remove_product_gallery(
        &self,
        owner_identity: &str,
        product_id: u32,
    ) -> Result<bool, PipelineError> {
        let start = Instant::now();
        let directory = ingest::product_directory(owner_identity, product_id, &self.ingest)?;
        match tokio::fs::remove_dir_all(&directory).await {
            Ok(()) => {
                info!(
                    directory = %directory.display(),
                    elapsed_micros = start.elapsed().as_micros(),
                    "gallery_removed"
                );
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => {
                warn!(directory = %directory.display(), error = %source, "gallery_removal_failure");
                Err(PipelineError::GalleryRemoval {
                    path: directory,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ingest::SequentialProductIds;
    use mirror::MirrorError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        calls: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, local_path: &Path) -> Result<String, MirrorError> {
            self.calls
                .lock()
                .unwrap()
                .push(local_path.to_path_buf());
            Ok(format!("https://img.example/{}", local_path.display()))
        }
    }

    #[tokio::test]
    async fn publish_without_mirror_is_disabled() {
        let pipeline = UploadPipeline::default();
        let err = pipeline.publish(Path::new("x.jpeg")).await.unwrap_err();
        assert!(matches!(err, PipelineError::MirrorDisabled));
    }

    #[tokio::test]
    async fn publish_delegates_to_publisher() {
        let publisher = Arc::new(RecordingPublisher::default());
        let pipeline = UploadPipeline::default().with_publisher(publisher.clone());
        let url = pipeline.publish(Path::new("a.jpeg")).await.unwrap();
        assert_eq!(url, "https://img.example/a.jpeg");
        assert_eq!(*publisher.calls.lock().unwrap(), vec![PathBuf::from("a.jpeg")]);
    }

    #[test]
    fn product_ids_come_from_the_allocator() {
        let pipeline = UploadPipeline::default()
            .with_product_ids(Arc::new(SequentialProductIds::starting_at(4200)));
        assert_eq!(pipeline.allocate_product_id().unwrap(), 4200);
        assert_eq!(pipeline.allocate_product_id().unwrap(), 4201);
    }

    #[test]
    fn from_config_attaches_mirror_when_keyed() {
        let mut cfg = PipelineConfig::default();
        assert!(UploadPipeline::from_config(&cfg).unwrap().publisher.is_none());
        cfg.mirror.api_key = Some("k".into());
        assert!(UploadPipeline::from_config(&cfg).unwrap().publisher.is_some());
    }

    #[tokio::test]
    async fn removing_absent_gallery_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = UploadPipeline::new(
            IngestConfig::with_root(dir.path()),
            CompressionPolicy::DEFAULT,
        );
        assert!(!pipeline.remove_product_gallery("a@b.com", 1234).await.unwrap());
    }

    #[tokio::test]
    async fn gallery_removal_rejects_traversal() {
        let pipeline = UploadPipeline::default();
        let err = pipeline.remove_product_gallery("..", 1234).await.unwrap_err();
        assert!(matches!(err, PipelineError::Ingest(_)));
    }
}
