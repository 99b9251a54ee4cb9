//! Command-line argument definitions for tryon-cli.

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Render a product try-on preview for a still photo.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct RenderArgs {
    /// Input photo (PNG or JPEG).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to write the rendered view as JPEG.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Product identifier; configs are stored under this key.
    #[arg(long, default_value = "demo-product")]
    pub product: String,

    /// Display name of the product.
    #[arg(long)]
    pub name: Option<String>,

    /// Product category (serum, cream, cleanser, ...).
    #[arg(long, default_value = "")]
    pub category: String,

    /// Skin concern the product targets. Repeat for several.
    #[arg(long = "concern", value_name = "CONCERN")]
    pub concerns: Vec<String>,

    /// JSON product config store. Created on first use.
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Optional settings JSON. Defaults to `config/tryon_settings.json` when present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Feed deep contrast, warmth and brightness into the main render.
    #[arg(long, action = ArgAction::SetTrue)]
    pub tone_extensions: bool,

    /// Override the effect intensity (0-1).
    #[arg(long)]
    pub intensity: Option<f32>,

    /// Override the blur sigma in pixels.
    #[arg(long)]
    pub sigma: Option<f32>,

    /// Override the brightness offset (-0.3 to 0.3).
    #[arg(long)]
    pub brightness: Option<f32>,

    /// Where the effect applies.
    #[arg(long, value_enum, default_value_t = MaskArg::Auto)]
    pub mask: MaskArg,

    /// Brush stroke as `x,y` points separated by `;`. Repeat for several strokes.
    #[arg(long = "stroke", value_name = "POINTS")]
    pub strokes: Vec<String>,

    /// Brush radius in pixels for `--stroke`.
    #[arg(long, default_value_t = 12.0)]
    pub brush: f32,

    /// View to export.
    #[arg(long, value_enum, default_value_t = ViewArg::After)]
    pub view: ViewArg,

    /// Split position for `--view split` (0-1). Defaults to the settings file.
    #[arg(long)]
    pub split: Option<f32>,

    /// JPEG quality (1-100). Defaults to the settings file.
    #[arg(long)]
    pub quality: Option<u8>,

    /// Disable GPU rendering and use the CPU renderer.
    #[arg(long = "no-gpu", action = ArgAction::SetTrue)]
    pub no_gpu: bool,

    /// Control whether `WGPU_*` env vars influence GPU selection (`auto` or `ignore`).
    #[arg(long = "gpu-env", value_enum)]
    pub gpu_env: Option<GpuEnvMode>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,

    /// Also write the run summary JSON to this file.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum MaskArg {
    /// Synthesize face zones for the product's filter.
    Auto,
    /// Empty mask; the output equals the input.
    None,
    /// Effect everywhere.
    Full,
    /// Paint the `--stroke` paths.
    Strokes,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    Before,
    After,
    Split,
    Mask,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum GpuEnvMode {
    /// Respect environment overrides such as `WGPU_BACKEND`.
    Auto,
    /// Ignore environment overrides and rely solely on CLI/config.
    Ignore,
}

impl GpuEnvMode {
    pub fn respects_env(self) -> bool {
        matches!(self, GpuEnvMode::Auto)
    }
}
