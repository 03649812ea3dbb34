use std::io::Cursor;
use std::path::Path;
use std::time::Instant;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageReader, RgbImage};
use tracing::{debug, info, warn, Level};

use crate::{CompressError, CompressionPolicy};

/// Result of one compression call. Lives until it is written (and maybe
/// mirrored); nothing caches it.
#[derive(Clone, PartialEq)]
pub struct CompressedArtifact {
    /// Final JPEG bytes, after the normalization pass.
    pub bytes: Vec<u8>,
    /// Size in KB measured on the last loop encode.
    pub size_kb: f64,
    /// Quality of the accepted loop encode.
    pub final_quality: u8,
    pub width: u32,
    pub height: u32,
    /// Number of loop encodes, not counting the normalization pass.
    pub passes: u32,
}

impl std::fmt::Debug for CompressedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedArtifact")
            .field("len", &self.bytes.len())
            .field("size_kb", &self.size_kb)
            .field("final_quality", &self.final_quality)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("passes", &self.passes)
            .finish()
    }
}

/// Largest side a baseline JPEG can carry.
pub const MAX_JPEG_DIMENSION: u32 = u16::MAX as u32;

/// Source width and height, read from the header without decoding pixels.
pub fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32), CompressError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CompressError::Encode(format!("unreadable image header: {e}")))?;
    Ok(reader.into_dimensions()?)
}

/// Output height for a `source_width`×`source_height` image scaled to
/// `width` pixels wide: `round(width / source_width * source_height)`,
/// never below 1.
///
/// ```rust
/// assert_eq!(compress::target_height(4000, 3000, 1920), 1440);
/// assert_eq!(compress::target_height(1000, 750, 1920), 1440);
/// ```
pub fn target_height(source_width: u32, source_height: u32, width: u32) -> u32 {
    if source_width == 0 {
        return 1;
    }
    let scaled = f64::from(width) / f64::from(source_width) * f64::from(source_height);
    (scaled.round() as u32).max(1)
}

/// Resize and re-encode `bytes` as JPEG, lowering quality until the result
/// fits [`CompressionPolicy::target_size_kb`] or the next quality would not
/// be above the floor.
///
/// The first encode always happens, even when the raw input is already
/// under budget. The accepted buffer is decoded and encoded once more at the
/// accepted quality before being returned.
pub fn compress(bytes: &[u8], policy: &CompressionPolicy) -> Result<CompressedArtifact, CompressError> {
    policy.validate()?;

    let (source_width, source_height) = read_dimensions(bytes)?;
    let width = policy.initial_width;
    let height = target_height(source_width, source_height, width);
    if width > MAX_JPEG_DIMENSION || height > MAX_JPEG_DIMENSION {
        return Err(CompressError::Encode(format!(
            "output {width}x{height} exceeds JPEG limits"
        )));
    }

    let decoded = image::load_from_memory(bytes)?;
    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3).to_rgb8();

    let target = f64::from(policy.target_size_kb);
    let floor = i32::from(policy.quality_floor);
    let step = i32::from(policy.quality_step);

    let mut size_kb = kilobytes(bytes.len());
    let mut quality = i32::from(policy.initial_quality);
    let mut last: Option<Vec<u8>> = None;
    let mut passes = 0u32;

    while last.is_none() || (size_kb > target && quality > floor) {
        let encoded = encode_jpeg(&resized, quality as u8)?;
        size_kb = kilobytes(encoded.len());
        debug!(quality, size_kb, pass = passes + 1, "compress_pass");
        last = Some(encoded);
        quality -= step;
        passes += 1;
    }

    let accepted = (quality + step) as u8;
    let last = last.unwrap_or_default();
    let normalized = encode_jpeg(&image::load_from_memory(&last)?.to_rgb8(), accepted)?;

    Ok(CompressedArtifact {
        bytes: normalized,
        size_kb,
        final_quality: accepted,
        width,
        height,
        passes,
    })
}

/// [`compress`], then write the artifact to `destination`.
///
/// The parent directory must already exist. Nothing is written when
/// compression fails.
pub fn compress_to_path(
    bytes: &[u8],
    destination: &Path,
    policy: &CompressionPolicy,
) -> Result<CompressedArtifact, CompressError> {
    let start = Instant::now();
    let span = tracing::span!(
        Level::INFO,
        "compress.image",
        destination = %destination.display(),
        input_bytes = bytes.len()
    );
    let _guard = span.enter();

    let result = compress(bytes, policy).and_then(|artifact| {
        std::fs::write(destination, &artifact.bytes).map_err(|source| CompressError::Io {
            path: destination.to_path_buf(),
            source,
        })?;
        Ok(artifact)
    });

    match result {
        Ok(artifact) => {
            info!(
                width = artifact.width,
                height = artifact.height,
                size_kb = artifact.size_kb,
                final_quality = artifact.final_quality,
                passes = artifact.passes,
                over_budget = artifact.size_kb > f64::from(policy.target_size_kb),
                elapsed_micros = start.elapsed().as_micros(),
                "compress_success"
            );
            Ok(artifact)
        }
        Err(err) => {
            warn!(
                error = %err,
                elapsed_micros = start.elapsed().as_micros(),
                "compress_failure"
            );
            Err(err)
        }
    }
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, CompressError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}

fn kilobytes(len: usize) -> f64 {
    len as f64 / 1024.0
}
