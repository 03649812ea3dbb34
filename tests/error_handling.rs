mod common;

use std::path::Path;

use common::{corrupt_image, entries, pipeline_at, small_policy, solid_png};
use media_pipeline::{
    BatchOptions, CommitMode, IngestConfig, PipelineError, RawImageInput, UploadContext,
    UploadKind, UploadPipeline,
};

fn three_inputs_second_corrupt() -> Vec<RawImageInput> {
    RawImageInput::from_buffers(
        "imageInput",
        vec![
            solid_png(20, 20, [10, 10, 10]),
            corrupt_image(),
            solid_png(20, 20, [30, 30, 30]),
        ],
    )
}

fn product_ctx() -> UploadContext {
    UploadContext::new(UploadKind::Product, "a@b.com").with_product_id(1000)
}

#[tokio::test]
async fn failed_item_leaves_siblings_on_disk_in_direct_mode() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(root.path());

    let err = pipeline
        .ingest(&product_ctx(), three_inputs_second_corrupt())
        .await
        .expect_err("corrupt input fails the batch");

    match err {
        PipelineError::Encode { path, .. } => assert!(path.ends_with("2.jpeg")),
        other => panic!("unexpected error: {other:?}"),
    }
    let dir = root.path().join("a@b.com/product/1000");
    // Not transactional: the healthy siblings were written before the
    // failure was reported.
    assert_eq!(entries(&dir), vec!["1.jpeg", "3.jpeg"]);
}

#[tokio::test]
async fn staged_mode_rolls_back_every_file() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(root.path())
        .with_batch_options(BatchOptions::default().with_commit(CommitMode::Staged));

    let err = pipeline
        .ingest(&product_ctx(), three_inputs_second_corrupt())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Encode { .. }));
    let dir = root.path().join("a@b.com/product/1000");
    assert!(dir.is_dir(), "directory is provisioned before fan-out");
    assert!(entries(&dir).is_empty(), "left behind: {:?}", entries(&dir));
}

#[tokio::test]
async fn staged_mode_commits_on_success() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(root.path())
        .with_batch_options(BatchOptions::default().with_commit(CommitMode::Staged));
    let inputs = RawImageInput::from_buffers("imageInput", vec![solid_png(8, 8, [1, 2, 3]); 3]);

    let outcome = pipeline.ingest(&product_ctx(), inputs).await.unwrap();

    let dir = root.path().join("a@b.com/product/1000");
    assert_eq!(entries(&dir), vec!["1.jpeg", "2.jpeg", "3.jpeg"]);
    for image in &outcome.images {
        assert_eq!(std::fs::read(&image.path).unwrap(), image.artifact.bytes);
    }
}

#[tokio::test]
async fn staged_commit_failure_removes_already_renamed_files() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("a@b.com/product/1000");
    // A non-empty directory where 2.jpeg belongs makes its rename fail.
    std::fs::create_dir_all(dir.join("2.jpeg")).unwrap();
    std::fs::write(dir.join("2.jpeg/keep"), b"x").unwrap();
    let pipeline = pipeline_at(root.path())
        .with_batch_options(BatchOptions::default().with_commit(CommitMode::Staged));
    let inputs = RawImageInput::from_buffers("imageInput", vec![solid_png(8, 8, [4, 4, 4]); 3]);

    let err = pipeline.ingest(&product_ctx(), inputs).await.unwrap_err();

    match err {
        PipelineError::Write { path, .. } => assert!(path.ends_with("2.jpeg")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(entries(&dir), vec!["2.jpeg"]);
}

#[tokio::test]
async fn first_failure_in_plan_order_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(root.path());
    let inputs = RawImageInput::from_buffers(
        "imageInput",
        vec![solid_png(8, 8, [0, 0, 0]), corrupt_image(), b"junk".to_vec()],
    );

    let err = pipeline.ingest(&product_ctx(), inputs).await.unwrap_err();
    match err {
        PipelineError::Encode { path, .. } => assert!(path.ends_with("2.jpeg")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn resolver_errors_abort_before_touching_disk() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(root.path());

    let missing_id = UploadContext::new(UploadKind::Product, "a@b.com");
    let err = pipeline
        .ingest(&missing_id, RawImageInput::from_buffers("imageInput", vec![solid_png(4, 4, [0; 3])]))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingProductId));

    let nobody = UploadContext::new(UploadKind::Profile, "");
    let err = pipeline
        .ingest(&nobody, RawImageInput::from_buffers("image", vec![solid_png(4, 4, [0; 3])]))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingIdentity));

    assert!(entries(root.path()).is_empty());
}

#[test]
fn unknown_kind_names_are_unsupported() {
    let err = PipelineError::from("dokumen".parse::<UploadKind>().unwrap_err());
    assert!(matches!(err, PipelineError::UnsupportedContext(kind) if kind == "dokumen"));
}

#[tokio::test]
async fn unwritable_root_is_a_directory_creation_error() {
    let root = tempfile::tempdir().unwrap();
    let blocker = root.path().join("uploads");
    std::fs::write(&blocker, b"a file, not a directory").unwrap();
    let pipeline = UploadPipeline::new(IngestConfig::with_root(&blocker), small_policy());

    let err = pipeline
        .ingest(
            &UploadContext::new(UploadKind::Profile, "a@b.com"),
            RawImageInput::from_buffers("image", vec![solid_png(4, 4, [0; 3])]),
        )
        .await
        .unwrap_err();

    match err {
        PipelineError::DirectoryCreation { path, .. } => {
            assert_eq!(path, Path::new(&blocker).join("a@b.com/profile"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn input_count_mismatch_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline_at(root.path());
    let ctx = UploadContext::new(UploadKind::Profile, "a@b.com");
    let inputs = RawImageInput::from_buffers("image", vec![solid_png(4, 4, [0; 3]); 2]);

    let err = pipeline.ingest(&ctx, inputs).await.unwrap_err();
    assert!(matches!(err, PipelineError::Ingest(_)));
    assert!(err.is_client_error());
    assert_eq!(err.http_status_code(), 400);
}
