//! Image quality analysis for try-on frames.
//!
//! Three statistics are computed over the luma plane (BT.601 weights,
//! `0.299R + 0.587G + 0.114B`):
//!
//! * **brightness**: mean luma over every pixel,
//! * **contrast**: standard deviation of luma around that mean,
//! * **sharpness**: mean Sobel gradient magnitude over interior pixels (the
//!   one-pixel border is skipped so the kernel never leaves the image).
//!
//! A frame counts as good when `30 < brightness < 220`, `contrast > 20` and
//! `sharpness > 10`. Failing checks (plus a sub-480p resolution) become
//! [`QualityHint`]s ranked by how far the frame misses the threshold, so the
//! most actionable advice comes first. The detection retry loop reuses the
//! same hints verbatim when it gives up.

use std::fmt;

use image::RgbaImage;
use log::Level;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::telemetry::timing_guard;

pub const MIN_BRIGHTNESS: f32 = 30.0;
pub const MAX_BRIGHTNESS: f32 = 220.0;
pub const MIN_CONTRAST: f32 = 20.0;
pub const MIN_SHARPNESS: f32 = 10.0;
/// Shorter image side below which a frame is treated as sub-480p.
pub const MIN_RESOLUTION: u32 = 480;

/// Pixel dimensions of the analyzed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn min_side(self) -> u32 {
        self.width.min(self.height)
    }

    pub fn is_below_480p(self) -> bool {
        self.min_side() < MIN_RESOLUTION
    }
}

/// Remediation categories, declared in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    TooDark,
    TooBright,
    LowContrast,
    TooBlurry,
    LowResolution,
}

impl HintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HintKind::TooDark => "too_dark",
            HintKind::TooBright => "too_bright",
            HintKind::LowContrast => "low_contrast",
            HintKind::TooBlurry => "too_blurry",
            HintKind::LowResolution => "low_resolution",
        }
    }

    /// User-facing remediation text.
    pub fn message(self) -> &'static str {
        match self {
            HintKind::TooDark => "Image is too dark. Move to a brighter spot or face a light source.",
            HintKind::TooBright => {
                "Image is overexposed. Step away from direct light or lower the exposure."
            }
            HintKind::LowContrast => {
                "Image looks flat. Use more even, directional lighting on the face."
            }
            HintKind::TooBlurry => "Image is too blurry. Hold the camera steady and refocus.",
            HintKind::LowResolution => {
                "Image resolution is low. Move closer or use a higher-resolution photo."
            }
        }
    }
}

impl fmt::Display for HintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remediation hint; `severity` is in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityHint {
    pub kind: HintKind,
    pub severity: f32,
    pub message: String,
}

impl QualityHint {
    fn new(kind: HintKind, severity: f32) -> Self {
        Self {
            kind,
            severity: severity.clamp(0.0, 1.0),
            message: kind.message().to_string(),
        }
    }
}

/// Statistics describing a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub brightness: f32,
    pub contrast: f32,
    pub sharpness: f32,
    pub resolution: Resolution,
    pub is_good_quality: bool,
    /// Weighted 0-100 score.
    pub score: u8,
    /// Remediation hints, most severe first.
    pub hints: Vec<QualityHint>,
}

impl QualityMetrics {
    pub fn brightness_ok(&self) -> bool {
        self.brightness > MIN_BRIGHTNESS && self.brightness < MAX_BRIGHTNESS
    }

    pub fn contrast_ok(&self) -> bool {
        self.contrast > MIN_CONTRAST
    }

    pub fn sharpness_ok(&self) -> bool {
        self.sharpness > MIN_SHARPNESS
    }

    pub fn top_hint(&self) -> Option<&QualityHint> {
        self.hints.first()
    }
}

/// Analyze an RGBA raster.
pub fn analyze_quality(image: &RgbaImage) -> QualityMetrics {
    let _guard = timing_guard("tryon_utils::analyze_quality", Level::Debug);
    let (width, height) = image.dimensions();
    let resolution = Resolution { width, height };
    let luma = luma_plane(image);

    let (brightness, contrast) = mean_and_std(&luma);
    let sharpness = sobel_mean(&luma);

    let is_good_quality = brightness > MIN_BRIGHTNESS
        && brightness < MAX_BRIGHTNESS
        && contrast > MIN_CONTRAST
        && sharpness > MIN_SHARPNESS;

    QualityMetrics {
        brightness,
        contrast,
        sharpness,
        resolution,
        is_good_quality,
        score: quality_score(brightness, contrast, sharpness, resolution),
        hints: rank_hints(brightness, contrast, sharpness, resolution),
    }
}

fn luma_plane(image: &RgbaImage) -> Array2<f32> {
    let (width, height) = image.dimensions();
    let mut plane = Array2::<f32>::zeros((height as usize, width as usize));
    for (x, y, px) in image.enumerate_pixels() {
        plane[[y as usize, x as usize]] =
            0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
    }
    plane
}

fn mean_and_std(luma: &Array2<f32>) -> (f32, f32) {
    if luma.is_empty() {
        return (0.0, 0.0);
    }
    let count = luma.len() as f64;
    let mean = luma.iter().map(|&v| f64::from(v)).sum::<f64>() / count;
    let variance = luma
        .iter()
        .map(|&v| {
            let d = f64::from(v) - mean;
            d * d
        })
        .sum::<f64>()
        / count;
    (mean as f32, variance.sqrt() as f32)
}

/// Mean Sobel magnitude over interior pixels; zero when no interior exists.
fn sobel_mean(luma: &Array2<f32>) -> f32 {
    let (rows, cols) = luma.dim();
    if rows < 3 || cols < 3 {
        return 0.0;
    }

    let mut total = 0.0f64;
    for window in luma.windows((3, 3)) {
        let gx = (window[[0, 2]] + 2.0 * window[[1, 2]] + window[[2, 2]])
            - (window[[0, 0]] + 2.0 * window[[1, 0]] + window[[2, 0]]);
        let gy = (window[[2, 0]] + 2.0 * window[[2, 1]] + window[[2, 2]])
            - (window[[0, 0]] + 2.0 * window[[0, 1]] + window[[0, 2]]);
        total += f64::from(gx.hypot(gy));
    }
    (total / ((rows - 2) * (cols - 2)) as f64) as f32
}

fn quality_score(brightness: f32, contrast: f32, sharpness: f32, resolution: Resolution) -> u8 {
    let brightness_score = 1.0 - ((brightness - 125.0).abs() / 125.0).min(1.0);
    let contrast_score = (contrast / 60.0).min(1.0);
    let sharpness_score = (sharpness / 40.0).min(1.0);
    let resolution_score = (resolution.min_side() as f32 / 720.0).min(1.0);

    let weighted = 0.25 * brightness_score
        + 0.25 * contrast_score
        + 0.30 * sharpness_score
        + 0.20 * resolution_score;
    (weighted * 100.0).round().clamp(0.0, 100.0) as u8
}

fn rank_hints(
    brightness: f32,
    contrast: f32,
    sharpness: f32,
    resolution: Resolution,
) -> Vec<QualityHint> {
    let mut hints = Vec::new();
    if brightness <= MIN_BRIGHTNESS {
        hints.push(QualityHint::new(
            HintKind::TooDark,
            (MIN_BRIGHTNESS - brightness) / MIN_BRIGHTNESS,
        ));
    } else if brightness >= MAX_BRIGHTNESS {
        hints.push(QualityHint::new(
            HintKind::TooBright,
            (brightness - MAX_BRIGHTNESS) / (255.0 - MAX_BRIGHTNESS),
        ));
    }
    if contrast <= MIN_CONTRAST {
        hints.push(QualityHint::new(
            HintKind::LowContrast,
            (MIN_CONTRAST - contrast) / MIN_CONTRAST,
        ));
    }
    if sharpness <= MIN_SHARPNESS {
        hints.push(QualityHint::new(
            HintKind::TooBlurry,
            (MIN_SHARPNESS - sharpness) / MIN_SHARPNESS,
        ));
    }
    if resolution.is_below_480p() {
        hints.push(QualityHint::new(
            HintKind::LowResolution,
            (MIN_RESOLUTION - resolution.min_side()) as f32 / MIN_RESOLUTION as f32,
        ));
    }

    hints.sort_by(|a, b| {
        b.severity
            .total_cmp(&a.severity)
            .then_with(|| a.kind.cmp(&b.kind))
    });
    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checkerboard(size: u32, cell: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                Rgba([230, 230, 230, 255])
            } else {
                Rgba([30, 30, 30, 255])
            }
        })
    }

    #[test]
    fn uniform_gray_has_no_contrast_or_sharpness() {
        let img = RgbaImage::from_pixel(640, 480, Rgba([128, 128, 128, 255]));
        let metrics = analyze_quality(&img);
        assert!((metrics.brightness - 128.0).abs() < 0.01);
        assert!(metrics.contrast < 0.01);
        assert!(metrics.sharpness < 0.01);
        assert!(!metrics.is_good_quality);
        assert!(metrics.brightness_ok());

        let kinds: Vec<_> = metrics.hints.iter().map(|h| h.kind).collect();
        assert_eq!(kinds, vec![HintKind::LowContrast, HintKind::TooBlurry]);
    }

    #[test]
    fn luma_uses_bt601_weights() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255]));
        let metrics = analyze_quality(&img);
        assert!((metrics.brightness - 0.299 * 255.0).abs() < 0.01);
    }

    #[test]
    fn checkerboard_is_good_quality() {
        let img = checkerboard(512, 8);
        let metrics = analyze_quality(&img);
        assert!(metrics.contrast > 90.0);
        assert!(metrics.sharpness > MIN_SHARPNESS);
        assert!(metrics.is_good_quality);
        assert!(metrics.hints.is_empty());
        assert!(metrics.score > 70);
    }

    #[test]
    fn sobel_skips_border_pixels() {
        // A single vertical edge: only the two interior columns that straddle it respond.
        let img = RgbaImage::from_fn(10, 5, |x, _| {
            if x < 5 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let metrics = analyze_quality(&img);
        let expected = (2.0 * 4.0 * 255.0) / 8.0;
        assert!(
            (metrics.sharpness - expected).abs() < 0.5,
            "sharpness {} expected {}",
            metrics.sharpness,
            expected
        );
    }

    #[test]
    fn hints_are_ranked_by_severity() {
        // Nearly black and tiny: darkness and resolution both fail hard.
        let img = RgbaImage::from_pixel(64, 64, Rgba([3, 3, 3, 255]));
        let metrics = analyze_quality(&img);
        assert!(!metrics.is_good_quality);
        let severities: Vec<f32> = metrics.hints.iter().map(|h| h.severity).collect();
        assert!(severities.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(metrics.top_hint().map(|h| h.kind), Some(HintKind::LowContrast));
        assert!(metrics.hints.iter().any(|h| h.kind == HintKind::TooDark));
        assert!(metrics.hints.iter().any(|h| h.kind == HintKind::LowResolution));
    }

    #[test]
    fn empty_image_is_not_good() {
        let metrics = analyze_quality(&RgbaImage::new(0, 0));
        assert_eq!(metrics.brightness, 0.0);
        assert_eq!(metrics.sharpness, 0.0);
        assert!(!metrics.is_good_quality);
        assert_eq!(metrics.resolution.min_side(), 0);
    }
}
