//! Batch orchestration: one compression task per planned image.
//!
//! The directory is provisioned once, then every item is compressed on the
//! blocking pool. All launched tasks run to completion; if any failed, the
//! first failure in plan order is returned.
//!
//! In [`CommitMode::Direct`] files land at their final paths as soon as
//! each task finishes, so siblings of a failed item stay on disk.
//! [`CommitMode::Staged`] writes hidden staging files next to the final
//! paths and renames them only once every task has succeeded. If a rename
//! fails, files already committed by the batch are removed again, so an
//! earlier upload they replaced is lost rather than restored.

use std::path::{Path, PathBuf};
use std::time::Instant;

use compress::{CompressedArtifact, CompressionPolicy};
use futures::stream::{self, StreamExt};
use ingest::{PlannedImage, Slot, UploadPlan};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, Level, Span, info, warn};

use crate::provision::ensure_directory;
use crate::{MetricsSpan, PipelineError};

/// How finished files reach their destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    /// Write straight to the destination. Not transactional.
    #[default]
    Direct,
    /// Write to staging files, rename all of them after full success,
    /// remove them on failure. A failed rename removes the files already
    /// renamed; files they overwrote are not restored.
    Staged,
}

/// Fan-out settings for [`run_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Upper bound on concurrently running compressions. `None` or `0`
    /// runs every item at once.
    pub max_concurrency: Option<usize>,
    pub commit: CommitMode,
}

impl BatchOptions {
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    pub fn with_commit(mut self, commit: CommitMode) -> Self {
        self.commit = commit;
        self
    }

    fn width(&self, items: usize) -> usize {
        match self.max_concurrency {
            Some(limit) if limit > 0 => limit.min(items.max(1)),
            _ => items.max(1),
        }
    }
}

/// A compressed image persisted at its final path.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub slot: Slot,
    pub path: PathBuf,
    pub artifact: CompressedArtifact,
}

type TaskOutcome = (usize, Slot, PathBuf, PathBuf, Result<CompressedArtifact, PipelineError>);

/// Compress every item of `plan` into its destination.
///
/// Results come back in plan order regardless of completion order.
pub async fn run_batch(
    plan: UploadPlan,
    policy: &CompressionPolicy,
    options: &BatchOptions,
) -> Result<Vec<StoredImage>, PipelineError> {
    let span = tracing::span!(
        Level::INFO,
        "pipeline.batch",
        kind = %plan.kind,
        directory = %plan.directory.display(),
        items = plan.len()
    );
    let items = plan.len();
    let metrics = MetricsSpan::start();
    let start = Instant::now();

    let result = run_batch_inner(plan, *policy, *options).instrument(span.clone()).await;

    let _guard = span.enter();
    match &result {
        Ok(stored) => {
            info!(
                stored = stored.len(),
                elapsed_micros = start.elapsed().as_micros(),
                "batch_success"
            );
        }
        Err(err) => {
            warn!(
                error = %err,
                elapsed_micros = start.elapsed().as_micros(),
                "batch_failure"
            );
        }
    }
    if let Some(span) = metrics {
        span.record_batch(items, result.as_ref().map(|_| ()));
    }
    result
}

async fn run_batch_inner(
    plan: UploadPlan,
    policy: CompressionPolicy,
    options: BatchOptions,
) -> Result<Vec<StoredImage>, PipelineError> {
    policy
        .validate()
        .map_err(|err| PipelineError::from_compress(plan.directory.clone(), err))?;
    ensure_directory(&plan.directory).await?;

    if plan.is_empty() {
        return Ok(Vec::new());
    }

    let width = options.width(plan.len());
    let commit = options.commit;
    let nonce = fastrand::u64(..);

    let mut outcomes: Vec<TaskOutcome> = stream::iter(
        plan.items
            .into_iter()
            .enumerate()
            .map(|(index, item)| compress_item(index, item, policy, commit, nonce)),
    )
    .buffer_unordered(width)
    .collect()
    .await;

    outcomes.sort_by_key(|(index, ..)| *index);

    let total = outcomes.len();
    let mut succeeded = Vec::with_capacity(total);
    let mut first_error = None;
    let mut failed = 0usize;
    for (_, slot, path, written, result) in outcomes {
        match result {
            Ok(artifact) => succeeded.push((slot, path, written, artifact)),
            Err(err) => {
                failed += 1;
                first_error.get_or_insert(err);
            }
        }
    }

    if let Some(err) = first_error {
        warn!(failed, total, "batch_items_failed");
        if commit == CommitMode::Staged {
            for (_, _, written, _) in &succeeded {
                discard(written).await;
            }
        }
        return Err(err);
    }

    let mut stored: Vec<StoredImage> = Vec::with_capacity(total);
    let mut pending = succeeded.into_iter();
    while let Some((slot, path, written, artifact)) = pending.next() {
        if written != path {
            if let Err(source) = tokio::fs::rename(&written, &path).await {
                discard(&written).await;
                for (_, _, rest, _) in pending {
                    discard(&rest).await;
                }
                for committed in &stored {
                    discard(&committed.path).await;
                }
                warn!(
                    path = %path.display(),
                    rolled_back = stored.len(),
                    "staged_commit_failure"
                );
                return Err(PipelineError::Write { path, source });
            }
        }
        stored.push(StoredImage {
            slot,
            path,
            artifact,
        });
    }
    Ok(stored)
}

async fn compress_item(
    index: usize,
    item: PlannedImage,
    policy: CompressionPolicy,
    commit: CommitMode,
    nonce: u64,
) -> TaskOutcome {
    let PlannedImage { slot, input, path } = item;
    let written = match commit {
        CommitMode::Direct => path.clone(),
        CommitMode::Staged => staging_path(&path, nonce),
    };

    let parent = Span::current();
    let target = written.clone();
    let destination = path.clone();
    let task = tokio::task::spawn_blocking(move || {
        let _guard = parent.enter();
        let metrics = MetricsSpan::start();
        let result = compress::compress_to_path(&input.bytes, &target, &policy);
        if let Some(span) = metrics {
            span.record_compression(slot, result.as_ref());
        }
        result.map_err(|err| PipelineError::from_compress(destination, err))
    });

    let result = match task.await {
        Ok(result) => result,
        Err(join) => Err(PipelineError::Task {
            path: path.clone(),
            reason: join.to_string(),
        }),
    };
    (index, slot, path, written, result)
}

/// Hidden sibling of `path` used while a staged batch is in flight.
///
/// `nonce` is drawn once per batch so concurrent batches targeting the same
/// slot never share a staging file.
pub fn staging_path(path: &Path, nonce: u64) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{nonce:016x}.staging"))
}

async fn discard(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "staging_cleanup_failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_path_is_a_hidden_sibling() {
        assert_eq!(
            staging_path(Path::new("uploads/a@b.com/product/1234/2.jpeg"), 0xbeef),
            PathBuf::from("uploads/a@b.com/product/1234/.2.jpeg.000000000000beef.staging")
        );
    }

    #[test]
    fn batches_get_distinct_staging_files() {
        let dest = Path::new("uploads/a@b.com/profile/a.jpeg");
        assert_ne!(staging_path(dest, 1), staging_path(dest, 2));
    }

    #[test]
    fn width_defaults_to_item_count() {
        let options = BatchOptions::default();
        assert_eq!(options.width(7), 7);
        assert_eq!(options.with_max_concurrency(0).width(7), 7);
        assert_eq!(options.with_max_concurrency(2).width(7), 2);
        assert_eq!(options.with_max_concurrency(16).width(3), 3);
        assert_eq!(options.width(0), 1);
    }

    #[test]
    fn options_deserialize_lowercase_commit() {
        let options: BatchOptions =
            serde_json::from_str(r#"{"max_concurrency":4,"commit":"staged"}"#).unwrap();
        assert_eq!(options.max_concurrency, Some(4));
        assert_eq!(options.commit, CommitMode::Staged);
        let options: BatchOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, BatchOptions::default());
    }
}
