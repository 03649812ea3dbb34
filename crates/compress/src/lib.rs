//! Size-constrained image compressor
//!
//! Takes one raw upload (anything the `image` crate can decode: JPEG, PNG,
//! WebP), scales it to a fixed width, and re-encodes it as JPEG at falling
//! quality until it fits a size budget.
//!
//! ## Contract
//!
//! - Output width is always [`CompressionPolicy::initial_width`]; height is
//!   `round(width / source_width * source_height)`. Smaller sources are
//!   scaled up.
//! - At least one encode happens, even for inputs already under budget.
//! - [`CompressedArtifact::final_quality`] is `initial_quality - k * step`
//!   for some `k >= 0` and is always above `quality_floor`.
//! - Missing the budget is not an error. The last encode tried is kept.
//! - Purely CPU-bound and synchronous. Async callers should move it onto a
//!   blocking thread.
//!
//! ```no_run
//! use compress::{compress_to_path, CompressionPolicy};
//! use std::path::Path;
//!
//! let raw = std::fs::read("upload.png")?;
//! let artifact = compress_to_path(&raw, Path::new("uploads/1.jpeg"), &CompressionPolicy::DEFAULT)?;
//! println!("{} KB at q{}", artifact.size_kb, artifact.final_quality);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
mod compressor;
mod error;
mod policy;

pub use crate::compressor::{
    compress, compress_to_path, read_dimensions, target_height, CompressedArtifact,
    MAX_JPEG_DIMENSION,
};
pub use crate::error::CompressError;
pub use crate::policy::CompressionPolicy;
