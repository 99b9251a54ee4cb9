use criterion::{Criterion, criterion_group, criterion_main};
use image::RgbaImage;
use std::hint::black_box;
use std::time::Duration;
use tryon_core::{
    BrushStroke, DetectionParams, FaceZoneSynthesizer, MaskGenerator, MaskSource, ZoneWeights,
};
use tryon_utils::{Frame, Point};

fn build_frame() -> Frame {
    Frame::new(RgbaImage::from_fn(640, 480, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            image::Rgba([60, 50, 45, 255])
        } else {
            image::Rgba([210, 190, 175, 255])
        }
    }))
}

fn mask_synthesis_benchmark(c: &mut Criterion) {
    let frame = build_frame();
    let mut synthesizer = FaceZoneSynthesizer::new(DetectionParams {
        retry_delay: Duration::ZERO,
        ..DetectionParams::default()
    });
    let Ok(result) = synthesizer.detect(&frame) else {
        eprintln!("skipping mask synthesis benchmark: detection failed on the fixture");
        return;
    };
    let generator = MaskGenerator;
    let weights = ZoneWeights::uniform(0.8);

    c.bench_function("detect_face_zones", |b| {
        b.iter(|| black_box(synthesizer.detect(black_box(&frame)).ok()));
    });

    c.bench_function("synthesize_zone_mask", |b| {
        b.iter(|| {
            let mask = generator.render(
                640,
                480,
                MaskSource::Detection {
                    result: black_box(&result),
                    weights: &weights,
                },
            );
            black_box(mask.ok());
        });
    });

    let strokes: Vec<BrushStroke> = (0..8)
        .map(|i| {
            let y = 120.0 + i as f32 * 30.0;
            BrushStroke::new(
                (0..12).map(|j| Point::new(160.0 + j as f32 * 28.0, y)).collect(),
                14.0,
            )
        })
        .collect();
    c.bench_function("paint_brush_strokes", |b| {
        b.iter(|| {
            black_box(
                generator
                    .render(640, 480, MaskSource::Strokes(black_box(&strokes)))
                    .ok(),
            )
        });
    });
}

criterion_group!(benches, mask_synthesis_benchmark);
criterion_main!(benches);
