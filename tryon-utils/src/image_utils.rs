use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, RgbaImage};

/// A decoded still frame as supplied by the capture side.
///
/// The engine never touches cameras or files directly; whatever produces the
/// pixels hands over one of these.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    raster: RgbaImage,
}

impl Frame {
    pub fn new(raster: RgbaImage) -> Self {
        Self { raster }
    }

    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::new(image.to_rgba8())
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn into_raster(self) -> RgbaImage {
        self.raster
    }
}

impl From<RgbaImage> for Frame {
    fn from(raster: RgbaImage) -> Self {
        Self::new(raster)
    }
}

/// Load an image from disk into memory.
///
/// # Arguments
///
/// * `path` - The path to the image file.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    image::open(path_ref).with_context(|| format!("failed to open image {}", path_ref.display()))
}

/// Load an image from disk and convert it into an RGBA [`Frame`].
pub fn load_frame<P: AsRef<Path>>(path: P) -> Result<Frame> {
    let image = load_image(path)?;
    Ok(Frame::from_dynamic(&image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    #[test]
    fn load_frame_preserves_dimensions() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("frame.png");
        RgbaImage::from_pixel(32, 24, Rgba([10, 20, 30, 255]))
            .save(&path)
            .expect("save png");

        let frame = load_frame(&path).expect("load frame");
        assert_eq!(frame.dimensions(), (32, 24));
        assert_eq!(frame.raster().get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_frame("does/not/exist.png").unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.png"));
    }

    #[test]
    fn zero_sized_frame_is_empty() {
        assert!(Frame::new(RgbaImage::new(0, 10)).is_empty());
        assert!(!Frame::new(RgbaImage::new(1, 1)).is_empty());
    }
}
