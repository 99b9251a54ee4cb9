//! Before/after/split/mask presentation of a rendered frame.
//!
//! [`compose_view`] is pure: it never touches renderer state, so views can be
//! switched without re-rendering.

use std::fmt;
use std::str::FromStr;

use image::{GrayImage, Rgba, RgbaImage};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tryon_utils::RgbaColor;
use tryon_utils::config::RenderSettings;

/// Underlying luma above which a light divider switches to the shadow color.
const LIGHT_BACKGROUND_LUMA: f32 = 160.0;
const SHADOW: RgbaColor = RgbaColor::opaque(0x20, 0x20, 0x20);
const HANDLE_RING: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ViewMode {
    Before,
    After,
    Split { position: f32 },
    Mask,
}

impl ViewMode {
    pub fn split(position: f32) -> Self {
        ViewMode::Split {
            position: clamp_position(position),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Before => f.write_str("before"),
            ViewMode::After => f.write_str("after"),
            ViewMode::Split { position } => write!(f, "split:{position}"),
            ViewMode::Mask => f.write_str("mask"),
        }
    }
}

/// Parses `before`, `after`, `mask`, `split` or `split:<position>`.
impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "before" => Ok(ViewMode::Before),
            "after" => Ok(ViewMode::After),
            "mask" => Ok(ViewMode::Mask),
            "split" => Ok(ViewMode::split(0.5)),
            other => match other.strip_prefix("split:") {
                Some(value) => value
                    .parse::<f32>()
                    .map(ViewMode::split)
                    .map_err(|_| format!("invalid split position '{value}'")),
                None => Err(format!("unknown view mode '{s}'")),
            },
        }
    }
}

fn clamp_position(position: f32) -> f32 {
    if position.is_finite() {
        position.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Colors and sizes used when drawing views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewStyle {
    pub divider_width: u32,
    pub handle_radius: u32,
    pub divider_color: RgbaColor,
    pub mask_background: RgbaColor,
    pub mask_tint: RgbaColor,
}

impl Default for ViewStyle {
    fn default() -> Self {
        Self::from(&RenderSettings::default())
    }
}

impl From<&RenderSettings> for ViewStyle {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            divider_width: settings.divider_width.max(1),
            handle_radius: settings.handle_radius,
            divider_color: settings.divider_color,
            mask_background: settings.mask_background.to_opaque(),
            mask_tint: settings.mask_tint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("{layer} is {actual:?} but the original is {expected:?}")]
    SizeMismatch {
        layer: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

fn check(layer: &'static str, expected: (u32, u32), actual: (u32, u32)) -> Result<(), ViewError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ViewError::SizeMismatch {
            layer,
            expected,
            actual,
        })
    }
}

/// Column the split divider is centered on.
pub fn split_column(position: f32, width: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    let x = (clamp_position(position) * width as f32).round() as u32;
    x.min(width - 1)
}

/// Half-open column range `[start, end)` covered by the divider.
pub fn divider_columns(position: f32, width: u32, divider_width: u32) -> (u32, u32) {
    let center = split_column(position, width);
    let start = center.saturating_sub(divider_width / 2);
    let end = (start + divider_width.max(1)).min(width);
    (start, end)
}

pub fn compose_view(
    mode: ViewMode,
    original: &RgbaImage,
    after: &RgbaImage,
    mask: &GrayImage,
    style: &ViewStyle,
) -> Result<RgbaImage, ViewError> {
    let size = original.dimensions();
    match mode {
        ViewMode::Before => Ok(original.clone()),
        ViewMode::After => {
            check("after", size, after.dimensions())?;
            Ok(after.clone())
        }
        ViewMode::Split { position } => {
            check("after", size, after.dimensions())?;
            Ok(split_view(original, after, position, style))
        }
        ViewMode::Mask => {
            check("mask", size, mask.dimensions())?;
            Ok(mask_view(mask, style))
        }
    }
}

fn contrasting(color: RgbaColor, under: Rgba<u8>) -> RgbaColor {
    let luma = RgbaColor::opaque(under[0], under[1], under[2]).luma();
    if luma > LIGHT_BACKGROUND_LUMA && color.luma() > LIGHT_BACKGROUND_LUMA {
        SHADOW
    } else {
        color
    }
}

fn split_view(
    original: &RgbaImage,
    after: &RgbaImage,
    position: f32,
    style: &ViewStyle,
) -> RgbaImage {
    let (width, height) = original.dimensions();
    let mut out = RgbaImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }
    let (start, end) = divider_columns(position, width, style.divider_width);
    let row_len = width as usize * 4;

    out.par_chunks_mut(row_len)
        .zip(original.par_chunks(row_len))
        .zip(after.par_chunks(row_len))
        .for_each(|((dst, before_row), after_row)| {
            for x in 0..width as usize {
                let idx = x * 4;
                let px = &mut dst[idx..idx + 4];
                let x = x as u32;
                if x < start {
                    px.copy_from_slice(&before_row[idx..idx + 4]);
                } else if x >= end {
                    px.copy_from_slice(&after_row[idx..idx + 4]);
                } else {
                    let under =
                        Rgba([before_row[idx], before_row[idx + 1], before_row[idx + 2], 255]);
                    px.copy_from_slice(&contrasting(style.divider_color, under).to_pixel().0);
                }
            }
        });

    draw_handle(&mut out, (start + end) as f32 / 2.0, height as f32 / 2.0, style);
    out
}

fn draw_handle(out: &mut RgbaImage, cx: f32, cy: f32, style: &ViewStyle) {
    let radius = style.handle_radius as f32;
    if radius <= 0.0 {
        return;
    }
    let (width, height) = out.dimensions();
    let x0 = (cx - radius - 1.0).floor().max(0.0) as u32;
    let y0 = (cy - radius - 1.0).floor().max(0.0) as u32;
    let x1 = ((cx + radius + 1.0).ceil() as u32).min(width);
    let y1 = ((cy + radius + 1.0).ceil() as u32).min(height);
    let fill = style.divider_color.to_pixel();
    let ring = if style.divider_color.luma() > LIGHT_BACKGROUND_LUMA {
        SHADOW.to_pixel()
    } else {
        RgbaColor::WHITE.to_pixel()
    };

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance <= radius - HANDLE_RING {
                out.put_pixel(x, y, fill);
            } else if distance <= radius {
                out.put_pixel(x, y, ring);
            }
        }
    }
}

fn mask_view(mask: &GrayImage, style: &ViewStyle) -> RgbaImage {
    let (width, height) = mask.dimensions();
    let bg = style.mask_background;
    let tint = style.mask_tint;
    let mix = |from: u8, to: u8, m: f32| -> u8 {
        (f32::from(from) + (f32::from(to) - f32::from(from)) * m)
            .round()
            .clamp(0.0, 255.0) as u8
    };

    let mut out = RgbaImage::new(width, height);
    for (dst, value) in out.pixels_mut().zip(mask.pixels()) {
        let m = f32::from(value[0]) / 255.0;
        *dst = Rgba([
            mix(bg.red, tint.red, m),
            mix(bg.green, tint.green, m),
            mix(bg.blue, tint.blue, m),
            255,
        ]);
    }
    out
}

/// Maps pointer x positions straight to a split position while dragging.
///
/// Every `update` takes effect immediately; there is no debounce or
/// smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitDrag {
    width: u32,
    position: f32,
    dragging: bool,
}

impl SplitDrag {
    pub fn new(width: u32, position: f32) -> Self {
        Self {
            width,
            position: clamp_position(position),
            dragging: false,
        }
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn view(&self) -> ViewMode {
        ViewMode::Split {
            position: self.position,
        }
    }

    pub fn begin(&mut self, pointer_x: f32) -> f32 {
        self.dragging = true;
        self.update(pointer_x)
    }

    /// Move to `pointer_x`. Ignored when no drag is active.
    pub fn update(&mut self, pointer_x: f32) -> f32 {
        if self.dragging && self.width > 0 {
            self.position = clamp_position(pointer_x / self.width as f32);
        }
        self.position
    }

    pub fn end(&mut self) -> f32 {
        self.dragging = false;
        self.position
    }
}
