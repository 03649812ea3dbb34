//! Upload ingest layer
//!
//! This is where an upload request stops being a pile of multipart buffers and
//! becomes a plan: one directory, and a list of tagged work items saying which
//! bytes land in which file.
//!
//! ## What we do here
//!
//! - **Resolve layouts** - [`resolve`] maps an [`UploadContext`] to its
//!   directory and ordered [`Destination`]s. Same context, same paths, every
//!   time. Nothing random, nothing read from disk.
//! - **Pair inputs with slots** - [`plan`] binds every [`RawImageInput`] to a
//!   [`Slot`]. Premium uploads pair by field name, everything else by
//!   position, so downstream code never zips two lists and hopes.
//! - **Hand out product ids** - [`ProductIdAllocator`] implementations for the
//!   four-digit gallery identifiers.
//! - **Log it** - structured `tracing` events for every plan, success or not.
//!
//! ## Example
//!
//! ```
//! use ingest::{plan, IngestConfig, RawImageInput, Slot, UploadContext, UploadKind};
//!
//! let ctx = UploadContext::new(UploadKind::Premium, "a@b.com")
//!     .with_field("ktp")
//!     .with_field("selfie");
//! // Arrival order does not matter for premium uploads.
//! let inputs = vec![
//!     RawImageInput::new(vec![2], 0, "selfie"),
//!     RawImageInput::new(vec![1], 1, "ktp"),
//! ];
//!
//! let plan = plan(&ctx, inputs, &IngestConfig::default()).unwrap();
//! assert_eq!(plan.items[0].slot, Slot::Ktp);
//! assert_eq!(plan.items[0].input.bytes, vec![1]);
//! assert!(plan.items[1].path.ends_with("SELFIE_a.jpeg"));
//! ```
use std::time::Instant;

use tracing::{info, warn, Level};

mod config;
mod error;
mod product_id;
mod resolve;
mod types;

pub use crate::config::{ConfigError, IngestConfig};
pub use crate::error::IngestError;
pub use crate::product_id::{
    CheckedProductIds, ProductIdAllocator, RandomProductIds, SequentialProductIds,
    PRODUCT_ID_RANGE,
};
pub use crate::resolve::{product_directory, resolve};
pub use crate::types::{
    Destination, PlannedImage, RawImageInput, Resolution, Slot, UploadContext, UploadKind,
    UploadPlan, KTP_FIELD, SELFIE_FIELD,
};

/// Resolve `ctx` and bind every input to its destination.
///
/// Premium inputs are matched by field name; every other kind pairs inputs
/// with destinations by `position_index`. A leftover input or an unfilled
/// destination is an [`IngestError::InputCountMismatch`].
pub fn plan(
    ctx: &UploadContext,
    inputs: Vec<RawImageInput>,
    cfg: &IngestConfig,
) -> Result<UploadPlan, IngestError> {
    let start = Instant::now();
    let input_count = inputs.len();

    let span = tracing::span!(Level::INFO, "ingest.plan", kind = %ctx.kind, inputs = input_count);
    let _guard = span.enter();

    match resolve::plan_inner(ctx, inputs, cfg) {
        Ok(plan) => {
            info!(
                directory = %plan.directory.display(),
                items = plan.len(),
                elapsed_micros = start.elapsed().as_micros(),
                "plan_success"
            );
            Ok(plan)
        }
        Err(err) => {
            warn!(
                owner = %ctx.owner_identity,
                error = %err,
                elapsed_micros = start.elapsed().as_micros(),
                "plan_failure"
            );
            Err(err)
        }
    }
}
