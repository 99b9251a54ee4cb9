use image::{GrayImage, Luma, Rgba, RgbaImage};
use tryon_core::{
    CpuRenderer, EffectRenderer, FilterKey, FilterPresetResolver, PassKind, ProductFilterConfig,
    RenderError, RenderParameters, ResolveOptions,
    presets::{DeepEffect, EffectParams},
    render::{
        BlurKernel, TextureSlot,
        cpu::{blur_horizontal, blur_vertical},
        kernel::MAX_TAP_OFFSET,
    },
};
use tryon_utils::Frame;

fn textured(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let r = ((x * 37 + y * 11) % 251) as u8;
        let g = ((x * 5 + y * 29) % 241) as u8;
        let b = ((x * y + 17) % 239) as u8;
        Rgba([r, g, b, 255])
    })
}

fn direct_gaussian(src: &RgbaImage, kernel: &BlurKernel) -> RgbaImage {
    let (width, height) = src.dimensions();
    let radius = kernel.radius() as i32;
    RgbaImage::from_fn(width, height, |x, y| {
        let mut acc = [0.0f32; 4];
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let sx = (x as i32 + dx).clamp(0, width as i32 - 1) as u32;
                let sy = (y as i32 + dy).clamp(0, height as i32 - 1) as u32;
                let weight = kernel.weight(dx) * kernel.weight(dy);
                let px = src.get_pixel(sx, sy);
                for (c, value) in acc.iter_mut().enumerate() {
                    *value += weight * f32::from(px[c]);
                }
            }
        }
        Rgba(acc.map(|v| v.round().clamp(0.0, 255.0) as u8))
    })
}

fn max_channel_diff(a: &RgbaImage, b: &RgbaImage) -> u8 {
    a.pixels()
        .zip(b.pixels())
        .flat_map(|(pa, pb)| (0..4).map(move |c| pa[c].abs_diff(pb[c])))
        .max()
        .unwrap_or(0)
}

fn render_once(frame: &RgbaImage, mask: &GrayImage, params: &RenderParameters) -> RgbaImage {
    let mut renderer = CpuRenderer::new();
    renderer.prepare(&Frame::new(frame.clone())).unwrap();
    renderer.upload_mask(mask).unwrap();
    renderer.render(params).unwrap()
}

#[test]
fn separable_blur_matches_a_direct_2d_gaussian() {
    let src = textured(24, 18);
    for sigma in [0.8, 2.0, 3.5] {
        let kernel = BlurKernel::new(sigma).unwrap();
        let mut ping = RgbaImage::new(24, 18);
        let mut pong = RgbaImage::new(24, 18);
        blur_horizontal(&src, &mut ping, &kernel);
        blur_vertical(&ping, &mut pong, &kernel);

        let reference = direct_gaussian(&src, &kernel);
        let diff = max_channel_diff(&pong, &reference);
        assert!(diff <= 1, "sigma {sigma}: separable blur off by {diff}");
    }
}

#[test]
fn blank_mask_returns_the_frame_unchanged() {
    let frame = textured(20, 14);
    let mask = GrayImage::new(20, 14);
    let params = RenderParameters {
        intensity: 1.0,
        sigma: 3.0,
        brightness: 0.25,
        contrast: 1.25,
        warmth_r: 18,
        warmth_b: 12,
        warmth_alpha: 0.8,
    };
    assert_eq!(render_once(&frame, &mask, &params), frame);
}

#[test]
fn full_mask_at_full_intensity_returns_the_blur() {
    let frame = textured(20, 14);
    let mask = GrayImage::from_pixel(20, 14, Luma([255]));
    let params = RenderParameters {
        intensity: 1.0,
        sigma: 2.0,
        ..RenderParameters::NEUTRAL
    };

    let kernel = BlurKernel::new(2.0).unwrap();
    let mut ping = RgbaImage::new(20, 14);
    let mut expected = RgbaImage::new(20, 14);
    blur_horizontal(&frame, &mut ping, &kernel);
    blur_vertical(&ping, &mut expected, &kernel);
    for (out, original) in expected.pixels_mut().zip(frame.pixels()) {
        out[3] = original[3];
    }

    assert_eq!(render_once(&frame, &mask, &params), expected);
}

#[test]
fn higher_intensity_moves_further_from_the_original() {
    let frame = textured(16, 16);
    let mask = GrayImage::from_pixel(16, 16, Luma([255]));
    let distance = |intensity: f32| {
        let out = render_once(
            &frame,
            &mask,
            &RenderParameters {
                intensity,
                sigma: 2.5,
                ..RenderParameters::NEUTRAL
            },
        );
        out.pixels()
            .zip(frame.pixels())
            .map(|(a, b)| (0..3).map(|c| u32::from(a[c].abs_diff(b[c]))).sum::<u32>())
            .sum::<u32>()
    };
    let low = distance(0.2);
    let high = distance(0.9);
    assert!(high > low, "expected {high} > {low}");
    assert_eq!(distance(0.0), 0);
}

#[test]
fn wrinkle_preset_blurs_with_the_capped_radius() {
    let resolver = FilterPresetResolver::new(ResolveOptions::default());
    let params = resolver.resolve(&ProductFilterConfig::new("serum", FilterKey::Wrinkles));
    assert_eq!(params.sigma, 4.0);
    assert_eq!(params.intensity, 0.5);

    let kernel = BlurKernel::new(params.sigma).unwrap();
    assert_eq!(kernel.radius(), MAX_TAP_OFFSET);

    let mut renderer = CpuRenderer::new();
    renderer.prepare(&Frame::new(textured(32, 24))).unwrap();
    renderer
        .upload_mask(&GrayImage::from_pixel(32, 24, Luma([200])))
        .unwrap();
    renderer.render(&params).unwrap();
    let trace = renderer.last_trace();
    assert!(
        trace.position(PassKind::BlurHorizontal) < trace.position(PassKind::BlurVertical)
    );
    assert!(trace.position(PassKind::BlurVertical) < trace.position(PassKind::Compose));
}

#[test]
fn resizing_the_frame_makes_old_handles_stale() {
    let mut renderer = CpuRenderer::new();
    renderer.prepare(&Frame::new(textured(8, 8))).unwrap();
    let handle = renderer.handle(TextureSlot::Mask).unwrap();
    assert!(renderer.validate_handle(&handle).is_ok());

    renderer.prepare(&Frame::new(textured(8, 8))).unwrap();
    assert!(renderer.validate_handle(&handle).is_ok());
    assert_eq!(renderer.resources().generation, 1);

    renderer.prepare(&Frame::new(textured(16, 12))).unwrap();
    assert_eq!(renderer.resources().generation, 2);
    match renderer.validate_handle(&handle) {
        Err(RenderError::StaleResources { current, .. }) => assert_eq!(current, 2),
        other => panic!("expected stale handle, got {other:?}"),
    }

    let fresh = renderer.handle(TextureSlot::Output).unwrap();
    assert_eq!(fresh.extent.as_tuple(), (16, 12));
    assert!(matches!(
        renderer.upload_mask(&GrayImage::new(8, 8)),
        Err(RenderError::MaskMismatch { .. })
    ));
    for slot in TextureSlot::ALL {
        assert_eq!(
            renderer.textures().map(|set| set.dimensions(slot)),
            Some((16, 12))
        );
    }
}

#[test]
fn resolving_the_same_config_twice_is_idempotent() {
    let mut tuned = ProductFilterConfig::new("night-serum", FilterKey::Brightness);
    tuned.default_intensity = Some(0.6);
    tuned.webgl_config.sigma = Some(2.5);
    tuned.webgl_config.warmth_r = Some(9.0);
    tuned
        .deep_overrides
        .push(DeepEffect::new(true, EffectParams::Contrast { value: 1.15 }));

    let configs = [ProductFilterConfig::new("serum", FilterKey::Wrinkles), tuned];
    for tone_extensions in [false, true] {
        let resolver = FilterPresetResolver::new(ResolveOptions { tone_extensions });
        for config in &configs {
            let snapshot = config.clone();
            let first = resolver.resolve(config);
            let second = resolver.resolve(config);
            let id = config.product_id();
            assert_eq!(first, second, "{id} (tone extensions {tone_extensions})");
            assert_eq!(config, &snapshot);
        }
    }
}

fn wrinkles_on_mid_gray(tone_extensions: bool) -> RgbaImage {
    let resolver = FilterPresetResolver::new(ResolveOptions { tone_extensions });
    let params = resolver.resolve(&ProductFilterConfig::new("serum", FilterKey::Wrinkles));
    assert_eq!(params.intensity, 0.5);
    assert_eq!(params.sigma, 4.0);
    render_once(
        &RgbaImage::from_pixel(640, 480, Rgba([128, 128, 128, 255])),
        &GrayImage::from_pixel(640, 480, Luma([255])),
        &params,
    )
}

#[test]
fn wrinkles_on_mid_gray_keeps_brightness_without_tone_extensions() {
    let out = wrinkles_on_mid_gray(false);
    assert_eq!(out.dimensions(), (640, 480));
    assert!(out.pixels().all(|px| *px == Rgba([128, 128, 128, 255])));
}

#[test]
fn wrinkles_on_mid_gray_lifts_by_deep_brightness_with_tone_extensions() {
    let out = wrinkles_on_mid_gray(true);
    for px in out.pixels() {
        for c in 0..3 {
            let lift = i16::from(px[c]) - 128;
            assert!((25..=26).contains(&lift), "lift {lift} at {px:?}");
        }
        assert_eq!(px[3], 255);
    }
}
