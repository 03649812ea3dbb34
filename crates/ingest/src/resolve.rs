//! Context resolution: maps an [`UploadContext`] to a directory and an
//! ordered list of tagged destinations.
//!
//! Resolution is a pure function of its inputs. Nothing here touches the
//! filesystem; provisioning and writing happen downstream.
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::{KTP_FIELD, SELFIE_FIELD};
use crate::{
    Destination, IngestConfig, IngestError, PlannedImage, RawImageInput, Resolution, Slot,
    UploadContext, UploadKind, UploadPlan,
};

const EXTENSION: &str = "jpeg";

/// Resolve `ctx` into its directory and destinations.
///
/// `input_count` only matters for [`UploadKind::Product`], where one
/// destination is produced per input.
///
/// ```rust
/// use ingest::{resolve, IngestConfig, UploadContext, UploadKind};
/// use std::path::PathBuf;
///
/// let ctx = UploadContext::new(UploadKind::Product, "a@b.com").with_product_id(4213);
/// let res = resolve(&ctx, 3, &IngestConfig::default()).unwrap();
///
/// assert_eq!(res.directory, PathBuf::from("uploads/a@b.com/product/4213"));
/// let names: Vec<_> = res.destinations.iter().filter_map(|d| d.file_name()).collect();
/// assert_eq!(names, ["1.jpeg", "2.jpeg", "3.jpeg"]);
/// ```
pub fn resolve(
    ctx: &UploadContext,
    input_count: usize,
    cfg: &IngestConfig,
) -> Result<Resolution, IngestError> {
    let owner = checked_segment("owner_identity", &ctx.owner_identity)?;
    if owner.is_empty() {
        return Err(IngestError::MissingIdentity);
    }
    let owner_dir = cfg.root.join(owner);
    let local = ctx.local_part();

    let (directory, slots): (PathBuf, Vec<(Slot, String)>) = match ctx.kind {
        UploadKind::Profile => (
            owner_dir.join("profile"),
            vec![(Slot::Profile, file_name(local))],
        ),
        UploadKind::Premium => {
            let mut slots = Vec::with_capacity(2);
            if ctx.has_field(KTP_FIELD) {
                slots.push((Slot::Ktp, file_name(&format!("KTP_{local}"))));
            }
            if ctx.has_field(SELFIE_FIELD) {
                slots.push((Slot::Selfie, file_name(&format!("SELFIE_{local}"))));
            }
            (owner_dir.join("documents"), slots)
        }
        UploadKind::Payment => {
            let name = ctx
                .submitted_name
                .as_deref()
                .ok_or(IngestError::MissingSubmittedName)?;
            let name = checked_segment("submitted_name", name)?;
            (
                owner_dir.join("ktp"),
                vec![(Slot::PaymentKtp, file_name(&format!("KTP_{name}")))],
            )
        }
        UploadKind::Product => {
            let product_id = ctx.product_id.ok_or(IngestError::MissingProductId)?;
            let slots = (1..=input_count as u32)
                .map(|n| (Slot::Gallery(n), file_name(&n.to_string())))
                .collect();
            (
                owner_dir.join("product").join(product_id.to_string()),
                slots,
            )
        }
    };

    let destinations = slots
        .into_iter()
        .map(|(slot, name)| Destination {
            slot,
            path: directory.join(name),
        })
        .collect::<Vec<_>>();

    debug!(
        kind = %ctx.kind,
        directory = %directory.display(),
        destinations = destinations.len(),
        "context_resolved"
    );

    Ok(Resolution {
        directory,
        destinations,
    })
}

/// Binds every input to its destination; see [`plan`](crate::plan).
pub(crate) fn plan_inner(
    ctx: &UploadContext,
    mut inputs: Vec<RawImageInput>,
    cfg: &IngestConfig,
) -> Result<UploadPlan, IngestError> {
    let resolution = resolve(ctx, inputs.len(), cfg)?;
    let expected = resolution.destinations.len();
    let actual = inputs.len();
    if expected != actual {
        return Err(IngestError::InputCountMismatch { expected, actual });
    }

    let items = match ctx.kind {
        UploadKind::Premium => {
            let mut items = Vec::with_capacity(expected);
            for destination in resolution.destinations {
                let field = match destination.slot {
                    Slot::Ktp => KTP_FIELD,
                    _ => SELFIE_FIELD,
                };
                let idx = inputs
                    .iter()
                    .position(|input| input.field == field)
                    .ok_or(IngestError::InputCountMismatch { expected, actual })?;
                items.push(PlannedImage {
                    slot: destination.slot,
                    input: inputs.swap_remove(idx),
                    path: destination.path,
                });
            }
            items
        }
        UploadKind::Profile | UploadKind::Payment | UploadKind::Product => {
            inputs.sort_by_key(|input| input.position_index);
            resolution
                .destinations
                .into_iter()
                .zip(inputs)
                .map(|(destination, input)| PlannedImage {
                    slot: destination.slot,
                    input,
                    path: destination.path,
                })
                .collect()
        }
    };

    Ok(UploadPlan {
        kind: ctx.kind,
        directory: resolution.directory,
        items,
    })
}

/// Directory holding the gallery of `product_id`, without any validation
/// beyond the owner segment check.
pub fn product_directory(
    owner_identity: &str,
    product_id: u32,
    cfg: &IngestConfig,
) -> Result<PathBuf, IngestError> {
    let owner = checked_segment("owner_identity", owner_identity)?;
    if owner.is_empty() {
        return Err(IngestError::MissingIdentity);
    }
    Ok(cfg
        .root
        .join(owner)
        .join("product")
        .join(product_id.to_string()))
}

fn file_name(stem: &str) -> String {
    format!("{stem}.{EXTENSION}")
}

/// `value` unchanged, unless it would not stay a single path component.
fn checked_segment<'a>(field: &'static str, value: &'a str) -> Result<&'a str, IngestError> {
    let escapes = value.contains(['/', '\\', '\0']) || value == "." || value == "..";
    if escapes || Path::new(value).is_absolute() {
        return Err(IngestError::InvalidPathSegment {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}
