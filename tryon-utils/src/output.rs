//! Lossy still-image export for rendered previews.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use image::{ExtendedColorType, ImageEncoder, RgbaImage, codecs::jpeg::JpegEncoder};
use log::{Level, debug};

use crate::telemetry::timing_guard;

/// JPEG quality used for download/share exports.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Encode an RGBA raster as JPEG, dropping the alpha channel.
///
/// `quality` is clamped to `1..=100`.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
    let _guard = timing_guard("tryon_utils::encode_jpeg", Level::Debug);
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
        .context("failed to encode JPEG")?;
    Ok(buffer)
}

/// Encode and write a JPEG, creating parent directories as needed.
pub fn save_jpeg(destination: &Path, image: &RgbaImage, quality: u8) -> Result<()> {
    if let Some(parent) = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.exists())
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let encoded = encode_jpeg(image, quality)?;
    debug!(
        "Writing {}x{} JPEG (q={}) to {}",
        image.width(),
        image.height(),
        quality,
        destination.display()
    );
    fs::write(destination, encoded)
        .with_context(|| format!("failed to write {}", destination.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    #[test]
    fn jpeg_starts_with_soi_marker() {
        let img = RgbaImage::from_pixel(16, 8, Rgba([200, 100, 50, 255]));
        let bytes = encode_jpeg(&img, DEFAULT_JPEG_QUALITY).expect("encode");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn save_creates_nested_directories() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested/out/preview.jpg");
        let img = RgbaImage::from_pixel(20, 10, Rgba([90, 90, 90, 255]));
        save_jpeg(&path, &img, DEFAULT_JPEG_QUALITY).expect("save");

        let decoded = image::open(&path).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
    }

    #[test]
    fn lower_quality_produces_smaller_output() {
        let mut img = RgbaImage::new(64, 64);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([(x * 4) as u8, (y * 4) as u8, ((x ^ y) * 4) as u8, 255]);
        }
        let high = encode_jpeg(&img, 95).expect("high");
        let low = encode_jpeg(&img, 10).expect("low");
        assert!(low.len() < high.len());
    }
}
