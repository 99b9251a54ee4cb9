use std::error::Error;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::{GenericImageView, Rgba, RgbaImage};
use serde_json::Value;
use tempfile::{TempDir, tempdir};

type TestResult = Result<(), Box<dyn Error>>;

struct Workspace {
    dir: TempDir,
    settings: PathBuf,
}

impl Workspace {
    fn new() -> Result<Self, Box<dyn Error>> {
        let dir = tempdir()?;
        let settings = dir.path().join("settings.json");
        // No pauses between detection retries in tests.
        fs::write(
            &settings,
            r#"{ "detection": { "retry_delay_ms": 0 }, "gpu": { "enabled": false } }"#,
        )?;
        Ok(Self { dir, settings })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write_image(&self, name: &str, image: &RgbaImage) -> Result<PathBuf, Box<dyn Error>> {
        let path = self.path(name);
        image.save(&path)?;
        Ok(path)
    }

    fn run(&self, input: &Path, extra: &[&str]) -> Result<Output, Box<dyn Error>> {
        let output = Command::new(env!("CARGO_BIN_EXE_tryon-cli"))
            .arg("--input")
            .arg(input)
            .arg("--config")
            .arg(&self.settings)
            .arg("--no-gpu")
            .args(extra)
            .env("RUST_LOG", "warn")
            .output()?;
        Ok(output)
    }
}

fn report(output: &Output) -> Result<Value, Box<dyn Error>> {
    let stdout = String::from_utf8(output.stdout.clone())?;
    Ok(serde_json::from_str(&stdout)?)
}

/// Smooth gradient; survives JPEG with little loss.
fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (60 + x * 2).min(255) as u8,
            (80 + y * 2).min(255) as u8,
            150,
            255,
        ])
    })
}

/// Sharp, evenly lit checkerboard the synthesizer accepts.
fn portrait(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgba([50, 45, 40, 255])
        } else {
            Rgba([215, 200, 190, 255])
        }
    })
}

fn mean_abs_diff(
    a: &RgbaImage,
    b: &image::DynamicImage,
    columns: Range<u32>,
    rows: Range<u32>,
) -> f64 {
    let mut total = 0u64;
    let mut count = 0u64;
    for y in rows {
        for x in columns.clone() {
            let pa = a.get_pixel(x, y);
            let pb = b.get_pixel(x, y);
            for c in 0..3 {
                total += u64::from(pa[c].abs_diff(pb[c]));
                count += 1;
            }
        }
    }
    total as f64 / count.max(1) as f64
}

#[test]
fn empty_mask_exports_the_input_unchanged() -> TestResult {
    let ws = Workspace::new()?;
    let source = gradient(80, 60);
    let input = ws.write_image("face.png", &source)?;
    let out = ws.path("out/after.jpg");

    let output = ws.run(
        &input,
        &["--mask", "none", "--quality", "95", "--output", out.to_str().unwrap()],
    )?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json = report(&output)?;
    assert_eq!(json["backend"], "cpu");
    assert_eq!(json["gpu"]["mode"], "disabled");
    assert!(json.get("renderer_error").is_none());
    assert_eq!(json["view"], "after");
    assert!(json.get("error").is_none());
    assert!(json["output"].as_str().is_some());

    let exported = image::open(&out)?;
    assert_eq!(exported.dimensions(), (80, 60));
    let diff = mean_abs_diff(&source, &exported, 0..80, 0..60);
    assert!(diff < 4.0, "JPEG differs from input by {diff:.2} on average");
    Ok(())
}

#[test]
fn auto_mask_reports_detected_zones() -> TestResult {
    let ws = Workspace::new()?;
    let input = ws.write_image("portrait.png", &portrait(640, 480))?;

    let output = ws.run(&input, &["--concern", "acne", "--view", "mask"])?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json = report(&output)?;
    assert_eq!(json["filter"], "acne");
    assert_eq!(json["detection"]["landmarks"], 68);
    assert_eq!(json["detection"]["retry_count"], 0);
    assert!(!json["detection"]["zones"].as_array().unwrap().is_empty());
    let passes: Vec<&str> = json["passes"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(passes.contains(&"compose"));
    assert_eq!(passes.last(), Some(&"readback"));
    Ok(())
}

#[test]
fn split_view_keeps_the_left_side_original() -> TestResult {
    let ws = Workspace::new()?;
    let source = portrait(80, 64);
    let input = ws.write_image("split.png", &source)?;
    let out = ws.path("split.jpg");

    let output = ws.run(
        &input,
        &[
            "--mask", "full", "--intensity", "1", "--sigma", "4", "--view", "split", "--split",
            "0.25", "--quality", "95", "--output", out.to_str().unwrap(),
        ],
    )?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(report(&output)?["view"], "split:0.25");

    let exported = image::open(&out)?;
    assert_eq!(exported.dimensions(), (80, 64));
    // Rows above the drag handle; the divider sits at column 20.
    let before_side = mean_abs_diff(&source, &exported, 0..16, 0..16);
    let after_side = mean_abs_diff(&source, &exported, 32..80, 0..16);
    assert!(
        after_side > before_side + 20.0,
        "expected blurred right side ({after_side:.1}) vs original left side ({before_side:.1})"
    );
    Ok(())
}

#[test]
fn brush_strokes_show_up_in_the_mask_view() -> TestResult {
    let ws = Workspace::new()?;
    let input = ws.write_image("strokes.png", &gradient(80, 64))?;
    let out = ws.path("mask.jpg");

    let output = ws.run(
        &input,
        &[
            "--mask", "strokes", "--stroke", "20,20;60,20", "--brush", "8", "--view", "mask",
            "--quality", "100", "--output", out.to_str().unwrap(),
        ],
    )?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let exported = image::open(&out)?.to_rgba8();
    let painted = exported.get_pixel(40, 20);
    let untouched = exported.get_pixel(40, 52);
    assert!(painted[0] > 200, "painted pixel {painted:?}");
    assert!(untouched[0] < 70, "background pixel {untouched:?}");
    Ok(())
}

#[test]
fn malformed_stroke_is_rejected() -> TestResult {
    let ws = Workspace::new()?;
    let input = ws.write_image("bad.png", &gradient(16, 16))?;
    let output = ws.run(&input, &["--mask", "strokes", "--stroke", "10;20"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid stroke"));
    Ok(())
}

#[test]
fn store_locks_the_filter_across_runs() -> TestResult {
    let ws = Workspace::new()?;
    let input = ws.write_image("face.png", &gradient(64, 48))?;
    let store = ws.path("state/filters.json");
    let store_arg = store.to_str().unwrap();

    let first = ws.run(
        &input,
        &[
            "--product", "eye-serum", "--concern", "wrinkles", "--store", store_arg, "--mask",
            "none",
        ],
    )?;
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    assert_eq!(report(&first)?["filter"], "wrinkles");
    let saved: Value = serde_json::from_str(&fs::read_to_string(&store)?)?;
    assert_eq!(
        saved["products"]["eye-serum"]["locked_filter_type"],
        "wrinkles"
    );

    let second = ws.run(
        &input,
        &["--product", "eye-serum", "--concern", "acne", "--store", store_arg, "--mask", "none"],
    )?;
    assert!(second.status.success(), "{}", String::from_utf8_lossy(&second.stderr));
    assert_eq!(report(&second)?["filter"], "wrinkles");
    Ok(())
}

#[test]
fn failed_detection_writes_an_error_report() -> TestResult {
    let ws = Workspace::new()?;
    let input = ws.write_image("dark.png", &RgbaImage::from_pixel(64, 64, Rgba([3, 3, 3, 255])))?;
    let report_path = ws.path("reports/run.json");

    let output = ws.run(&input, &["--report", report_path.to_str().unwrap()])?;
    assert!(!output.status.success());

    let json: Value = serde_json::from_str(&fs::read_to_string(&report_path)?)?;
    assert_eq!(json["error"]["category"], "max_retries");
    assert!(
        json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("retried automatically and still failed")
    );
    let hints = json["error"]["hints"].as_array().unwrap();
    assert!(hints.iter().any(|hint| hint["kind"] == "too_dark"));
    assert!(json.get("output").is_none());
    Ok(())
}
