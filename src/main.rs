//! media-pipeline - store uploaded images under their context layout
//!
//! Thin command-line front end over [`media_pipeline::UploadPipeline`].
//! Results are printed to stdout as JSON; logs go to stderr.

mod cli;

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use media_pipeline::{
    CommitMode, IngestOutcome, KTP_FIELD, LoggingConfig, PipelineConfig, RawImageInput,
    SELFIE_FIELD, Slot, UploadContext, UploadKind, UploadPipeline,
};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref())
        .context("failed to load pipeline configuration")?;
    if let Some(root) = cli.root.clone() {
        config.storage.root = root;
    }
    if cli.cpu_bound {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        config.batch.max_concurrency = Some(cpus);
    }
    if let Commands::Ingest { staged: true, .. } = &cli.command {
        config.batch.commit = CommitMode::Staged;
    }

    init_tracing(&config.logging, cli.json_logs);
    let pipeline = UploadPipeline::from_config(&config)?;

    let report = match cli.command {
        Commands::Ingest {
            kind,
            owner,
            product_id,
            name,
            ktp,
            selfie,
            staged: _,
            publish,
            inputs,
        } => {
            let kind: UploadKind = kind.parse()?;
            let mut ctx = UploadContext::new(kind, owner);
            let mut raw = Vec::new();

            match kind {
                UploadKind::Premium => {
                    if !inputs.is_empty() {
                        bail!("premium uploads take --ktp and/or --selfie, not positional files");
                    }
                    for (field, path) in [(KTP_FIELD, ktp), (SELFIE_FIELD, selfie)] {
                        if let Some(path) = path {
                            let bytes = read_input(&path).await?;
                            let position = raw.len();
                            ctx = ctx.with_field(field);
                            raw.push(RawImageInput::new(bytes, position, field));
                        }
                    }
                }
                _ => {
                    let mut buffers = Vec::with_capacity(inputs.len());
                    for path in &inputs {
                        buffers.push(read_input(path).await?);
                    }
                    raw = RawImageInput::from_buffers("image", buffers);
                }
            }

            if let Some(name) = name {
                ctx = ctx.with_submitted_name(name);
            }
            if kind == UploadKind::Product {
                let id = match product_id {
                    Some(id) => id,
                    None => pipeline.allocate_product_id()?,
                };
                ctx = ctx.with_product_id(id);
            }

            if publish {
                let slot = match kind {
                    UploadKind::Profile => Slot::Profile,
                    UploadKind::Payment => Slot::PaymentKtp,
                    other => bail!("--publish is not supported for {other} uploads"),
                };
                let published = pipeline.ingest_and_publish(&ctx, raw, slot).await?;
                let mut report = outcome_report(&published.outcome, ctx.product_id);
                report["url"] = Value::String(published.url);
                report
            } else {
                let outcome = pipeline.ingest(&ctx, raw).await?;
                outcome_report(&outcome, ctx.product_id)
            }
        }
        Commands::Publish { path } => {
            let url = pipeline.publish(&path).await?;
            json!({ "path": path, "url": url })
        }
        Commands::RemoveGallery { owner, product_id } => {
            let removed = pipeline.remove_product_gallery(&owner, product_id).await?;
            json!({ "owner": owner, "product_id": product_id, "removed": removed })
        }
        Commands::NewProductId => json!({ "product_id": pipeline.allocate_product_id()? }),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_tracing(logging: &LoggingConfig, force_json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if logging.json || force_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn read_input(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

fn outcome_report(outcome: &IngestOutcome, product_id: Option<u32>) -> Value {
    let images: Vec<Value> = outcome
        .images
        .iter()
        .map(|image| {
            json!({
                "slot": image.slot.to_string(),
                "path": image.path,
                "size_kb": image.artifact.size_kb,
                "final_quality": image.artifact.final_quality,
                "width": image.artifact.width,
                "height": image.artifact.height,
            })
        })
        .collect();
    json!({
        "kind": outcome.kind,
        "directory": outcome.directory,
        "product_id": product_id,
        "file_count": outcome.file_count(),
        "images": images,
    })
}
