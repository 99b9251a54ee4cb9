//! Reference renderer on the CPU.
//!
//! Mirrors the GPU pass chain step for step, including 8-bit storage of the
//! intermediate blur textures, so the two backends agree to within one level
//! per channel. Rows are processed in parallel with rayon.

use image::{GrayImage, RgbaImage};
use log::{Level, debug};
use rayon::prelude::*;
use tryon_utils::{Frame, timing_guard};

use super::{
    EffectRenderer, PassKind, PassTrace, RenderBackend, RenderError,
    kernel::BlurKernel,
    resources::{ResourceState, ResourceTracker, TextureExtent, TextureSlot},
};
use crate::params::RenderParameters;

/// Largest side the CPU renderer accepts.
pub const CPU_MAX_TEXTURE_SIDE: u32 = 16_384;

fn quantize(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Horizontal Gaussian pass with clamp-to-edge sampling.
pub fn blur_horizontal(src: &RgbaImage, dst: &mut RgbaImage, kernel: &BlurKernel) {
    let (width, _) = src.dimensions();
    let row_len = width as usize * 4;
    let radius = kernel.radius() as i32;
    let max_x = width as i32 - 1;
    let src_raw: &[u8] = src;
    let dst_raw: &mut [u8] = dst;

    dst_raw
        .par_chunks_mut(row_len)
        .zip(src_raw.par_chunks(row_len))
        .for_each(|(out_row, in_row)| {
            for x in 0..width as i32 {
                let mut acc = [0.0f32; 4];
                for offset in -radius..=radius {
                    let sx = (x + offset).clamp(0, max_x) as usize * 4;
                    let weight = kernel.weight(offset);
                    for (c, value) in acc.iter_mut().enumerate() {
                        *value += weight * f32::from(in_row[sx + c]);
                    }
                }
                let base = x as usize * 4;
                for (c, value) in acc.iter().enumerate() {
                    out_row[base + c] = quantize(*value);
                }
            }
        });
}

/// Vertical Gaussian pass with clamp-to-edge sampling.
pub fn blur_vertical(src: &RgbaImage, dst: &mut RgbaImage, kernel: &BlurKernel) {
    let (width, height) = src.dimensions();
    let row_len = width as usize * 4;
    let radius = kernel.radius() as i32;
    let max_y = height as i32 - 1;
    let src_raw: &[u8] = src;
    let dst_raw: &mut [u8] = dst;

    dst_raw
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, out_row)| {
            let y = y as i32;
            for (i, out) in out_row.iter_mut().enumerate() {
                let mut acc = 0.0f32;
                for offset in -radius..=radius {
                    let sy = (y + offset).clamp(0, max_y) as usize;
                    acc += kernel.weight(offset) * f32::from(src_raw[sy * row_len + i]);
                }
                *out = quantize(acc);
            }
        });
}

/// Blend one pixel.
///
/// `m = mask / 255`; the original and blurred colors are mixed by
/// `m * intensity`, the tone stage (brightness, contrast, warmth) is applied
/// to that blend, and the toned color is mixed back in by `m`. Alpha comes
/// from the original.
pub fn compose_pixel(
    original: [u8; 4],
    blurred: [u8; 4],
    mask: u8,
    params: &RenderParameters,
) -> [u8; 4] {
    let m = f32::from(mask) / 255.0;
    let blend = m * params.intensity;
    let warm_r = f32::from(params.warmth_r) / 255.0 * params.warmth_alpha;
    let warm_b = f32::from(params.warmth_b) / 255.0 * params.warmth_alpha;

    let mut out = [0u8; 4];
    for c in 0..3 {
        let o = f32::from(original[c]) / 255.0;
        let b = f32::from(blurred[c]) / 255.0;
        let blended = o + (b - o) * blend;
        let mut toned = blended + params.brightness;
        toned = (toned - 0.5) * params.contrast + 0.5;
        match c {
            0 => toned += warm_r,
            2 => toned -= warm_b,
            _ => {}
        }
        let value = blended + (toned - blended) * m;
        out[c] = quantize(value.clamp(0.0, 1.0) * 255.0);
    }
    out[3] = original[3];
    out
}

/// Compose a full frame into `out`.
pub fn compose(
    original: &RgbaImage,
    blurred: &RgbaImage,
    mask: &GrayImage,
    params: &RenderParameters,
    out: &mut RgbaImage,
) {
    let width = original.width() as usize;
    let orig_raw: &[u8] = original;
    let blur_raw: &[u8] = blurred;
    let mask_raw: &[u8] = mask;
    let out_raw: &mut [u8] = out;

    out_raw
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                let i = (y * width + x) * 4;
                let px = |raw: &[u8]| [raw[i], raw[i + 1], raw[i + 2], raw[i + 3]];
                let pixel = compose_pixel(
                    px(orig_raw),
                    px(blur_raw),
                    mask_raw[y * width + x],
                    params,
                );
                row[x * 4..x * 4 + 4].copy_from_slice(&pixel);
            }
        });
}

/// Host-memory counterpart of the GPU texture set.
#[derive(Debug, Clone)]
pub struct CpuTextureSet {
    generation: u64,
    original: RgbaImage,
    ping: RgbaImage,
    pong: RgbaImage,
    mask: GrayImage,
    output: RgbaImage,
}

impl CpuTextureSet {
    fn allocate(extent: TextureExtent, generation: u64) -> Self {
        let (w, h) = extent.as_tuple();
        Self {
            generation,
            original: RgbaImage::new(w, h),
            ping: RgbaImage::new(w, h),
            pong: RgbaImage::new(w, h),
            mask: GrayImage::new(w, h),
            output: RgbaImage::new(w, h),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dimensions(&self, slot: TextureSlot) -> (u32, u32) {
        match slot {
            TextureSlot::Original => self.original.dimensions(),
            TextureSlot::Ping => self.ping.dimensions(),
            TextureSlot::Pong => self.pong.dimensions(),
            TextureSlot::Mask => self.mask.dimensions(),
            TextureSlot::Output => self.output.dimensions(),
        }
    }

    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }
}

#[derive(Debug)]
pub struct CpuRenderer {
    tracker: ResourceTracker,
    textures: Option<CpuTextureSet>,
    pending: PassTrace,
    trace: PassTrace,
    max_side: u32,
}

impl Default for CpuRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuRenderer {
    pub fn new() -> Self {
        Self::with_max_side(CPU_MAX_TEXTURE_SIDE)
    }

    pub fn with_max_side(max_side: u32) -> Self {
        Self {
            tracker: ResourceTracker::default(),
            textures: None,
            pending: PassTrace::default(),
            trace: PassTrace::default(),
            max_side,
        }
    }

    pub fn textures(&self) -> Option<&CpuTextureSet> {
        self.textures.as_ref()
    }
}

impl EffectRenderer for CpuRenderer {
    fn backend(&self) -> RenderBackend {
        RenderBackend::Cpu
    }

    fn prepare(&mut self, frame: &Frame) -> Result<(), RenderError> {
        let extent = TextureExtent::from(frame.dimensions()).validate(self.max_side)?;
        if self.tracker.needs_allocation(extent) {
            let generation = self.tracker.record_allocation(extent);
            self.textures = Some(CpuTextureSet::allocate(extent, generation));
            self.pending.push(PassKind::Allocate);
            debug!(
                target: "tryon::render",
                "allocated CPU texture set {}x{} (generation {generation})",
                extent.width,
                extent.height
            );
        }
        let set = self.textures.as_mut().ok_or(RenderError::NotPrepared)?;
        set.original.clone_from(frame.raster());
        self.pending.push(PassKind::UploadOriginal);
        Ok(())
    }

    fn upload_mask(&mut self, mask: &GrayImage) -> Result<(), RenderError> {
        let set = self.textures.as_mut().ok_or(RenderError::NotPrepared)?;
        if mask.dimensions() != set.mask.dimensions() {
            return Err(RenderError::MaskMismatch {
                mask: mask.dimensions(),
                textures: set.mask.dimensions(),
            });
        }
        set.mask.clone_from(mask);
        self.pending.push(PassKind::UploadMask);
        Ok(())
    }

    fn render(&mut self, params: &RenderParameters) -> Result<RgbaImage, RenderError> {
        let _guard = timing_guard("tryon_core::cpu_render", Level::Debug);
        let params = params.clamped();
        let set = self.textures.as_mut().ok_or(RenderError::NotPrepared)?;
        let mut trace = self.pending.take();

        let blurred = match BlurKernel::new(params.sigma) {
            Some(kernel) => {
                blur_horizontal(&set.original, &mut set.ping, &kernel);
                trace.push(PassKind::BlurHorizontal);
                blur_vertical(&set.ping, &mut set.pong, &kernel);
                trace.push(PassKind::BlurVertical);
                &set.pong
            }
            None => &set.original,
        };
        compose(&set.original, blurred, &set.mask, &params, &mut set.output);
        trace.push(PassKind::Compose);

        let image = set.output.clone();
        trace.push(PassKind::Readback);
        self.trace = trace;
        Ok(image)
    }

    fn resources(&self) -> ResourceState {
        self.tracker.state()
    }

    fn last_trace(&self) -> &PassTrace {
        &self.trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};

    #[test]
    fn blur_preserves_flat_images() {
        let src = RgbaImage::from_pixel(9, 7, Rgba([120, 60, 200, 255]));
        let kernel = BlurKernel::new(2.0).unwrap();
        let mut ping = RgbaImage::new(9, 7);
        let mut pong = RgbaImage::new(9, 7);
        blur_horizontal(&src, &mut ping, &kernel);
        blur_vertical(&ping, &mut pong, &kernel);
        assert_eq!(pong, src);
    }

    #[test]
    fn blur_spreads_a_single_bright_pixel() {
        let mut src = RgbaImage::from_pixel(21, 1, Rgba([0, 0, 0, 255]));
        src.put_pixel(10, 0, Rgba([255, 255, 255, 255]));
        let kernel = BlurKernel::new(1.5).unwrap();
        let mut out = RgbaImage::new(21, 1);
        blur_horizontal(&src, &mut out, &kernel);
        assert!(out.get_pixel(10, 0)[0] < 255);
        assert!(out.get_pixel(9, 0)[0] > 0);
        assert_eq!(out.get_pixel(9, 0)[0], out.get_pixel(11, 0)[0]);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn zero_mask_is_identity_even_with_tone() {
        let params = RenderParameters {
            intensity: 1.0,
            brightness: 0.3,
            contrast: 1.3,
            warmth_r: 20,
            warmth_b: 20,
            warmth_alpha: 1.0,
            ..RenderParameters::NEUTRAL
        };
        for value in [0u8, 1, 77, 128, 254, 255] {
            let px = [value, 255 - value, value / 2, 200];
            assert_eq!(compose_pixel(px, [0, 0, 0, 0], 0, &params), px);
        }
    }

    #[test]
    fn full_mask_full_intensity_returns_blur() {
        let params = RenderParameters {
            intensity: 1.0,
            ..RenderParameters::NEUTRAL
        };
        assert_eq!(
            compose_pixel([10, 20, 30, 40], [200, 100, 50, 0], 255, &params),
            [200, 100, 50, 40]
        );
    }

    #[test]
    fn warmth_shifts_red_up_and_blue_down() {
        let params = RenderParameters {
            warmth_r: 20,
            warmth_b: 10,
            warmth_alpha: 1.0,
            ..RenderParameters::NEUTRAL
        };
        let out = compose_pixel([100, 100, 100, 255], [100, 100, 100, 255], 255, &params);
        assert_eq!(out, [120, 100, 90, 255]);
    }

    #[test]
    fn render_requires_prepare() {
        let mut renderer = CpuRenderer::new();
        assert!(matches!(
            renderer.render(&RenderParameters::NEUTRAL),
            Err(RenderError::NotPrepared)
        ));
    }

    #[test]
    fn zero_sigma_skips_blur_passes() {
        let mut renderer = CpuRenderer::new();
        let frame = Frame::new(RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255])));
        renderer.prepare(&frame).unwrap();
        renderer
            .upload_mask(&GrayImage::from_pixel(4, 4, Luma([255])))
            .unwrap();
        let out = renderer
            .render(&RenderParameters {
                intensity: 1.0,
                ..RenderParameters::NEUTRAL
            })
            .unwrap();
        assert_eq!(out, *frame.raster());
        assert_eq!(
            renderer.last_trace().passes(),
            &[
                PassKind::Allocate,
                PassKind::UploadOriginal,
                PassKind::UploadMask,
                PassKind::Compose,
                PassKind::Readback
            ]
        );
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let mut renderer = CpuRenderer::new();
        renderer
            .prepare(&Frame::new(RgbaImage::new(4, 4)))
            .unwrap();
        assert!(matches!(
            renderer.upload_mask(&GrayImage::new(3, 4)),
            Err(RenderError::MaskMismatch { .. })
        ));
    }

    #[test]
    fn oversized_frames_fail_allocation() {
        let mut renderer = CpuRenderer::with_max_side(8);
        let err = renderer
            .prepare(&Frame::new(RgbaImage::new(9, 2)))
            .unwrap_err();
        assert!(matches!(err, RenderError::Allocation(_)));
        assert_eq!(renderer.resources().generation, 0);
    }
}
