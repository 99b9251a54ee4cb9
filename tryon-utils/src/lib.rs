//! Common helpers shared across the try-on crates.

/// Basic RGBA color type used for overlays and backgrounds.
pub mod color;
/// Application configuration and settings management.
pub mod config;
/// Shared GPU context initialization and readback helpers.
pub mod gpu;
/// Image loading and frame conversion.
pub mod image_utils;
/// Declarative macros for wgpu boilerplate.
pub mod macros;
/// Lossy still-image export.
pub mod output;
/// 2D point math used by landmark and mask geometry.
pub mod point;
/// Image quality analysis (brightness, contrast, Sobel sharpness).
pub mod quality;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use color::RgbaColor;
pub use gpu::{
    GpuAvailability, GpuContext, GpuContextOptions, GpuInitError, GpuStatusIndicator,
    GpuStatusMode,
};
pub use image_utils::{Frame, load_frame, load_image};
pub use output::{DEFAULT_JPEG_QUALITY, encode_jpeg, save_jpeg};
pub use point::Point;
pub use quality::{HintKind, QualityHint, QualityMetrics, analyze_quality};
pub use telemetry::{
    TimingGuard, configure as configure_telemetry, telemetry_allows, telemetry_enabled,
    telemetry_level, timing_guard, timing_guard_if,
};

/// Initialize logging once for CLI and test environments.
///
/// This function respects the `RUST_LOG` environment variable if it is set.
/// Otherwise, it falls back to the provided default filter level.
///
/// # Arguments
///
/// * `default_filter` - The `LevelFilter` to use if `RUST_LOG` is not set.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module("tryon::telemetry", LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
///
/// # Arguments
///
/// * `path` - The path to validate and normalize.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
