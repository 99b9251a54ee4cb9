//! Single-channel effect masks.
//!
//! A mask has one byte per pixel; `0` leaves the pixel untouched and `255`
//! applies the full effect. Masks come from two sources: brush strokes
//! painted by the user (manual mode) or zones synthesized from a detection
//! (synthesized mode). Both are rasterized with `tiny-skia`; the coverage is
//! read back from the pixmap's alpha channel.

use image::{GrayImage, Luma, imageops};
use log::{Level, debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiny_skia::{
    BlendMode, Color, FillRule, GradientStop, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap,
    RadialGradient, Rect, SpreadMode, Stroke, Transform,
};
use tryon_utils::{Point, timing_guard};

use crate::{
    detection::{
        BoundingBox, DetectionResult, FaceZone, LANDMARK_COUNT, ZoneExtent, ZoneName,
        landmarks::{INNER_LIPS, LEFT_EYE, OUTER_LIPS, RIGHT_EYE},
    },
    presets::{FilterKey, FilterPreset},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskMode {
    Manual,
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaskError {
    #[error("mask is {actual:?} but the frame is {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("cannot rasterize a {0}x{1} mask")]
    Empty(u32, u32),
}

/// One continuous drag of the brush, in image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrushStroke {
    pub points: Vec<Point>,
    pub radius: f32,
}

impl BrushStroke {
    pub fn new(points: Vec<Point>, radius: f32) -> Self {
        Self { points, radius }
    }

    pub fn dot(center: Point, radius: f32) -> Self {
        Self::new(vec![center], radius)
    }
}

/// Per-zone weights used when synthesizing a mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneWeights([f32; ZoneName::ALL.len()]);

impl Default for ZoneWeights {
    fn default() -> Self {
        Self::NONE
    }
}

impl ZoneWeights {
    pub const NONE: ZoneWeights = ZoneWeights([0.0; ZoneName::ALL.len()]);

    pub fn uniform(weight: f32) -> Self {
        Self([weight.clamp(0.0, 1.0); ZoneName::ALL.len()])
    }

    pub fn get(&self, zone: ZoneName) -> f32 {
        self.0[zone.index()]
    }

    pub fn set(&mut self, zone: ZoneName, weight: f32) {
        self.0[zone.index()] = weight.clamp(0.0, 1.0);
    }

    pub fn with(mut self, zone: ZoneName, weight: f32) -> Self {
        self.set(zone, weight);
        self
    }

    /// Zones with a non-zero weight, in declaration order.
    pub fn active(&self) -> impl Iterator<Item = (ZoneName, f32)> + '_ {
        ZoneName::ALL
            .into_iter()
            .map(|zone| (zone, self.get(zone)))
            .filter(|(_, weight)| *weight > 0.0)
    }

    /// Weights for a preset: its target zones at full strength, plus skin
    /// toned by tone-unify and cheeks lifted by contour-lift when those deep
    /// effects are enabled.
    pub fn for_preset(preset: &FilterPreset) -> Self {
        let targets: &[ZoneName] = match preset.key {
            FilterKey::Wrinkles => &[ZoneName::Forehead, ZoneName::LeftCheek, ZoneName::RightCheek],
            FilterKey::Brightness | FilterKey::Acne => &[ZoneName::Skin],
            FilterKey::Spots => &[
                ZoneName::LeftCheek,
                ZoneName::RightCheek,
                ZoneName::Forehead,
                ZoneName::NoseBridge,
                ZoneName::NoseBase,
            ],
            FilterKey::Firmness => &[ZoneName::LeftCheek, ZoneName::RightCheek, ZoneName::Skin],
        };
        let mut weights = Self::NONE;
        for zone in targets {
            weights.set(*zone, 1.0);
        }
        if let Some(opacity) = preset.deep.tone_unify.effective_value() {
            weights.set(ZoneName::Skin, weights.get(ZoneName::Skin).max(opacity));
        }
        if let Some(opacity) = preset.deep.contour_lift.effective_value() {
            for cheek in [ZoneName::LeftCheek, ZoneName::RightCheek] {
                weights.set(cheek, weights.get(cheek).max(opacity));
            }
        }
        weights
    }
}

/// What a mask is rasterized from.
#[derive(Debug, Clone, Copy)]
pub enum MaskSource<'a> {
    Strokes(&'a [BrushStroke]),
    Detection {
        result: &'a DetectionResult,
        weights: &'a ZoneWeights,
    },
}

/// Stateless mask rasterizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskGenerator;

impl MaskGenerator {
    /// Rasterize `source` into a fresh `width` x `height` mask.
    pub fn render(
        &self,
        width: u32,
        height: u32,
        source: MaskSource<'_>,
    ) -> Result<GrayImage, MaskError> {
        if width == 0 || height == 0 {
            return Err(MaskError::Empty(width, height));
        }
        match source {
            MaskSource::Strokes(strokes) => {
                let mut mask = GrayImage::new(width, height);
                for stroke in strokes {
                    self.paint(&mut mask, stroke);
                }
                Ok(mask)
            }
            MaskSource::Detection { result, weights } => {
                Ok(self.synthesize(width, height, result, weights))
            }
        }
    }

    /// Paint one stroke on top of `mask`. Coverage only ever grows.
    pub fn paint(&self, mask: &mut GrayImage, stroke: &BrushStroke) {
        let (width, height) = mask.dimensions();
        let Some(mut pixmap) = Pixmap::new(width, height) else {
            return;
        };
        if stroke.points.is_empty() || stroke.radius <= 0.0 {
            return;
        }
        let paint = solid_paint(BlendMode::SourceOver);

        for point in &stroke.points {
            if let Some(dot) = PathBuilder::from_circle(point.x, point.y, stroke.radius) {
                pixmap.fill_path(&dot, &paint, FillRule::Winding, Transform::identity(), None);
            }
        }
        if stroke.points.len() > 1 {
            let mut builder = PathBuilder::new();
            builder.move_to(stroke.points[0].x, stroke.points[0].y);
            for point in &stroke.points[1..] {
                builder.line_to(point.x, point.y);
            }
            if let Some(path) = builder.finish() {
                let line = Stroke {
                    width: stroke.radius * 2.0,
                    line_cap: LineCap::Round,
                    line_join: LineJoin::Round,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&path, &paint, &line, Transform::identity(), None);
            }
        }

        merge_max(mask, &alpha_plane(&pixmap), 1.0);
    }

    /// Build a soft mask from the zones of a detection.
    pub fn synthesize(
        &self,
        width: u32,
        height: u32,
        result: &DetectionResult,
        weights: &ZoneWeights,
    ) -> GrayImage {
        let _guard = timing_guard("tryon_core::synthesize_mask", Level::Debug);
        let mut mask = GrayImage::new(width, height);
        if result.landmarks.len() != LANDMARK_COUNT {
            warn!(
                target: "tryon::render",
                "detection carries {} landmarks; leaving the mask empty",
                result.landmarks.len()
            );
            return mask;
        }
        let face_width = result.bounding_box.width.max(1.0);

        for (name, weight) in weights.active() {
            let Some(zone) = result.zone(name) else {
                continue;
            };
            let Some(mut pixmap) = Pixmap::new(width, height) else {
                continue;
            };
            let feather = match name {
                ZoneName::Forehead => {
                    fill_ellipse(&mut pixmap, &zone.bounds(), &solid_paint(BlendMode::SourceOver));
                    0.05 * face_width
                }
                ZoneName::LeftCheek | ZoneName::RightCheek => {
                    fill_radial(&mut pixmap, zone);
                    0.0
                }
                ZoneName::NoseBridge | ZoneName::NoseBase => {
                    fill_ellipse(&mut pixmap, &zone.bounds(), &solid_paint(BlendMode::SourceOver));
                    0.025 * face_width
                }
                ZoneName::LipsOuter => {
                    fill_contour(
                        &mut pixmap,
                        &result.landmarks[OUTER_LIPS],
                        1.0,
                        BlendMode::SourceOver,
                    );
                    fill_contour(
                        &mut pixmap,
                        &result.landmarks[INNER_LIPS],
                        1.0,
                        BlendMode::DestinationOut,
                    );
                    0.01 * face_width
                }
                ZoneName::LipsInner => {
                    fill_contour(
                        &mut pixmap,
                        &result.landmarks[INNER_LIPS],
                        1.0,
                        BlendMode::SourceOver,
                    );
                    0.01 * face_width
                }
                ZoneName::Skin => {
                    fill_ellipse(&mut pixmap, &zone.bounds(), &solid_paint(BlendMode::SourceOver));
                    for eye in [LEFT_EYE, RIGHT_EYE] {
                        fill_contour(
                            &mut pixmap,
                            &result.landmarks[eye],
                            1.6,
                            BlendMode::DestinationOut,
                        );
                    }
                    fill_contour(
                        &mut pixmap,
                        &result.landmarks[OUTER_LIPS],
                        1.15,
                        BlendMode::DestinationOut,
                    );
                    0.04 * face_width
                }
            };

            let mut plane = alpha_plane(&pixmap);
            if feather > 0.5 {
                plane = imageops::blur(&plane, feather);
            }
            merge_max(&mut mask, &plane, weight);
        }

        debug!(
            target: "tryon::render",
            "synthesized mask {}x{} covering {:.1}%",
            width,
            height,
            coverage(&mask) * 100.0
        );
        mask
    }
}

fn solid_paint(blend_mode: BlendMode) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, 255);
    paint.anti_alias = true;
    paint.blend_mode = blend_mode;
    paint
}

fn fill_ellipse(pixmap: &mut Pixmap, bounds: &BoundingBox, paint: &Paint<'_>) {
    let oval = Rect::from_xywh(bounds.x, bounds.y, bounds.width, bounds.height)
        .and_then(PathBuilder::from_oval);
    if let Some(path) = oval {
        pixmap.fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
    }
}

/// Cheek falloff: full strength in the center, fading to nothing at the rim.
fn fill_radial(pixmap: &mut Pixmap, zone: &FaceZone) {
    let ZoneExtent::Radius(radius) = zone.extent else {
        fill_ellipse(pixmap, &zone.bounds(), &solid_paint(BlendMode::SourceOver));
        return;
    };
    let center = tiny_skia::Point::from_xy(zone.center.x, zone.center.y);
    let shader = RadialGradient::new(
        center,
        center,
        radius,
        vec![
            GradientStop::new(0.0, Color::from_rgba8(255, 255, 255, 255)),
            GradientStop::new(0.55, Color::from_rgba8(255, 255, 255, 200)),
            GradientStop::new(1.0, Color::from_rgba8(255, 255, 255, 0)),
        ],
        SpreadMode::Pad,
        Transform::identity(),
    );
    let (Some(shader), Some(circle)) = (
        shader,
        PathBuilder::from_circle(zone.center.x, zone.center.y, radius),
    ) else {
        return;
    };
    let mut paint = Paint::default();
    paint.shader = shader;
    paint.anti_alias = true;
    pixmap.fill_path(&circle, &paint, FillRule::Winding, Transform::identity(), None);
}

/// Smooth closed curve through the midpoints of a landmark loop, scaled
/// about its centroid.
fn contour_path(points: &[Point], scale: f32) -> Option<Path> {
    let center = Point::centroid(points)?;
    let scaled: Vec<Point> = points
        .iter()
        .map(|p| center + (*p - center) * scale)
        .collect();
    let n = scaled.len();
    if n < 3 {
        return None;
    }
    let start = scaled[0].midpoint(scaled[1]);
    let mut builder = PathBuilder::new();
    builder.move_to(start.x, start.y);
    for i in 1..=n {
        let control = scaled[i % n];
        let end = control.midpoint(scaled[(i + 1) % n]);
        builder.quad_to(control.x, control.y, end.x, end.y);
    }
    builder.close();
    builder.finish()
}

fn fill_contour(pixmap: &mut Pixmap, points: &[Point], scale: f32, blend_mode: BlendMode) {
    if let Some(path) = contour_path(points, scale) {
        pixmap.fill_path(
            &path,
            &solid_paint(blend_mode),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
}

fn alpha_plane(pixmap: &Pixmap) -> GrayImage {
    let alpha: Vec<u8> = pixmap.data().chunks_exact(4).map(|px| px[3]).collect();
    GrayImage::from_raw(pixmap.width(), pixmap.height(), alpha)
        .unwrap_or_else(|| GrayImage::new(pixmap.width(), pixmap.height()))
}

fn merge_max(mask: &mut GrayImage, layer: &GrayImage, weight: f32) {
    for (dst, src) in mask.pixels_mut().zip(layer.pixels()) {
        let value = (f32::from(src[0]) * weight).round() as u8;
        if value > dst[0] {
            *dst = Luma([value]);
        }
    }
}

/// Fraction of pixels with any coverage.
pub fn coverage(mask: &GrayImage) -> f32 {
    let total = mask.len();
    if total == 0 {
        return 0.0;
    }
    mask.as_raw().iter().filter(|&&v| v > 0).count() as f32 / total as f32
}

/// The single mask owned by an engine session.
#[derive(Debug, Clone)]
pub struct MaskBuffer {
    image: GrayImage,
    mode: MaskMode,
    generation: u64,
    generator: MaskGenerator,
}

impl MaskBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
            mode: MaskMode::Manual,
            generation: 0,
            generator: MaskGenerator,
        }
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn mode(&self) -> MaskMode {
        self.mode
    }

    /// Bumped on every change; used to skip redundant uploads.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_blank(&self) -> bool {
        self.image.as_raw().iter().all(|&v| v == 0)
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    fn clear(&mut self) {
        let raw: &mut [u8] = &mut self.image;
        raw.fill(0);
    }

    /// Switch modes. Switching discards the current contents.
    pub fn set_mode(&mut self, mode: MaskMode) {
        if self.mode != mode {
            self.clear();
            self.mode = mode;
            self.touch();
        }
    }

    /// Paint a stroke. A synthesized mask is discarded first.
    pub fn apply(&mut self, stroke: &BrushStroke) {
        self.set_mode(MaskMode::Manual);
        self.generator.paint(&mut self.image, stroke);
        self.touch();
    }

    /// Fill the whole mask with `value` in manual mode.
    pub fn fill(&mut self, value: u8) {
        self.set_mode(MaskMode::Manual);
        let raw: &mut [u8] = &mut self.image;
        raw.fill(value);
        self.touch();
    }

    /// Swap in a synthesized mask of the same size.
    pub fn replace(&mut self, synthesized: GrayImage) -> Result<(), MaskError> {
        if synthesized.dimensions() != self.image.dimensions() {
            return Err(MaskError::DimensionMismatch {
                expected: self.image.dimensions(),
                actual: synthesized.dimensions(),
            });
        }
        self.image = synthesized;
        self.mode = MaskMode::Synthesized;
        self.touch();
        Ok(())
    }

    /// Clear coverage, keeping the mode.
    pub fn reset(&mut self) {
        self.clear();
        self.touch();
    }

    /// Reallocate for a new frame size. Contents are cleared.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = GrayImage::new(width, height);
            self.touch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{DetectionParams, FaceZoneSynthesizer};
    use crate::presets::preset;
    use image::{Rgba, RgbaImage};
    use std::time::Duration;
    use tryon_utils::Frame;

    fn detection(width: u32, height: u32) -> DetectionResult {
        let frame = Frame::new(RgbaImage::from_fn(width, height, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgba([40, 40, 40, 255])
            } else {
                Rgba([210, 210, 210, 255])
            }
        }));
        FaceZoneSynthesizer::new(DetectionParams {
            retry_delay: Duration::ZERO,
            ..DetectionParams::default()
        })
        .detect(&frame)
        .expect("checkerboard detects")
    }

    #[test]
    fn stroke_covers_its_path() {
        let mut mask = GrayImage::new(100, 60);
        let stroke = BrushStroke::new(vec![Point::new(10.0, 30.0), Point::new(90.0, 30.0)], 5.0);
        MaskGenerator.paint(&mut mask, &stroke);
        assert_eq!(mask.get_pixel(50, 30)[0], 255);
        assert_eq!(mask.get_pixel(10, 30)[0], 255);
        assert_eq!(mask.get_pixel(50, 5)[0], 0);
    }

    #[test]
    fn painting_never_reduces_coverage() {
        let mut buffer = MaskBuffer::new(40, 40);
        buffer.apply(&BrushStroke::dot(Point::new(20.0, 20.0), 6.0));
        let before = buffer.image().clone();
        buffer.apply(&BrushStroke::dot(Point::new(22.0, 20.0), 2.0));
        for (a, b) in before.pixels().zip(buffer.image().pixels()) {
            assert!(b[0] >= a[0]);
        }
    }

    #[test]
    fn mode_switch_clears_the_buffer() {
        let mut buffer = MaskBuffer::new(32, 32);
        buffer.fill(255);
        let generation = buffer.generation();
        buffer.replace(GrayImage::new(32, 32)).unwrap();
        assert_eq!(buffer.mode(), MaskMode::Synthesized);
        assert!(buffer.generation() > generation);

        buffer.replace(GrayImage::from_pixel(32, 32, Luma([90]))).unwrap();
        buffer.apply(&BrushStroke::dot(Point::new(2.0, 2.0), 1.0));
        assert_eq!(buffer.mode(), MaskMode::Manual);
        assert_eq!(buffer.image().get_pixel(30, 30)[0], 0);
    }

    #[test]
    fn replace_rejects_wrong_size() {
        let mut buffer = MaskBuffer::new(10, 10);
        let err = buffer.replace(GrayImage::new(9, 10)).unwrap_err();
        assert_eq!(
            err,
            MaskError::DimensionMismatch {
                expected: (10, 10),
                actual: (9, 10)
            }
        );
    }

    #[test]
    fn wrinkle_mask_targets_forehead_and_spares_lips() {
        let result = detection(640, 480);
        let weights = ZoneWeights::for_preset(preset(FilterKey::Wrinkles));
        let mask = MaskGenerator.synthesize(640, 480, &result, &weights);

        let forehead = result.zone(ZoneName::Forehead).unwrap().center;
        assert!(mask.get_pixel(forehead.x as u32, forehead.y as u32)[0] > 200);

        let lips = Point::centroid(&result.landmarks[OUTER_LIPS]).unwrap();
        // Only the feathered rim of the skin layer can reach the mouth.
        assert!(mask.get_pixel(lips.x as u32, lips.y as u32)[0] < 10);
        assert_eq!(mask.get_pixel(2, 2)[0], 0);
    }

    #[test]
    fn skin_mask_has_eye_holes() {
        let result = detection(640, 480);
        let weights = ZoneWeights::NONE.with(ZoneName::Skin, 1.0);
        let mask = MaskGenerator.synthesize(640, 480, &result, &weights);
        let eye = Point::centroid(&result.landmarks[LEFT_EYE]).unwrap();
        let cheek = result.zone(ZoneName::LeftCheek).unwrap().center;
        assert!(mask.get_pixel(eye.x as u32, eye.y as u32)[0] < 60);
        assert!(mask.get_pixel(cheek.x as u32, cheek.y as u32)[0] > 200);
    }

    #[test]
    fn preset_weights_follow_deep_effects() {
        let wrinkles = ZoneWeights::for_preset(preset(FilterKey::Wrinkles));
        assert_eq!(wrinkles.get(ZoneName::Forehead), 1.0);
        assert_eq!(wrinkles.get(ZoneName::Skin), 0.3);
        assert_eq!(wrinkles.get(ZoneName::LipsOuter), 0.0);

        let firmness = ZoneWeights::for_preset(preset(FilterKey::Firmness));
        assert_eq!(firmness.get(ZoneName::LeftCheek), 1.0);
        assert_eq!(firmness.active().count(), 3);
    }

    #[test]
    fn empty_source_is_rejected() {
        assert_eq!(
            MaskGenerator.render(0, 4, MaskSource::Strokes(&[])),
            Err(MaskError::Empty(0, 4))
        );
    }
}
