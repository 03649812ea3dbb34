#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};
use media_pipeline::{CompressionPolicy, IngestConfig, UploadPipeline};

/// Smooth gradient, encoded as JPEG.
pub fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x / 4 + y / 4) % 256) as u8])
    });
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .encode_image(&img)
        .expect("jpeg fixture");
    buf
}

pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).expect("png fixture");
    out.into_inner()
}

pub fn corrupt_image() -> Vec<u8> {
    let mut bytes = solid_png(32, 32, [0, 0, 0]);
    // Keep the signature so the failure comes from decoding, not sniffing.
    bytes.truncate(40);
    bytes
}

/// Narrow output so each compression stays fast.
pub fn small_policy() -> CompressionPolicy {
    CompressionPolicy::DEFAULT.with_initial_width(64)
}

pub fn pipeline_at(root: &Path) -> UploadPipeline {
    UploadPipeline::new(IngestConfig::with_root(root), small_policy())
}

pub fn dimensions(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).expect("stored file is an image")
}

pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("directory exists")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
