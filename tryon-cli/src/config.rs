//! Configuration loading and CLI override logic.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::info;
use tryon_core::{BrushStroke, UserTuning, ViewMode};
use tryon_utils::{
    Point,
    config::{AppSettings, default_settings_path},
    normalize_path,
};

use crate::args::{RenderArgs, ViewArg};

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Apply command-line arguments to override loaded or default settings.
pub fn apply_cli_overrides(settings: &mut AppSettings, args: &RenderArgs) {
    if args.no_gpu {
        settings.gpu.enabled = false;
    }
    if let Some(mode) = args.gpu_env {
        settings.gpu.respect_env = mode.respects_env();
    }

    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim();
        if !normalized.is_empty() {
            let lower = normalized.to_ascii_lowercase();
            settings.telemetry.level = lower.clone();
            if lower == "off" {
                settings.telemetry.enabled = false;
            }
        }
    }

    if args.tone_extensions {
        settings.render.tone_extensions = true;
    }
    if let Some(position) = args.split {
        settings.render.split_position = position;
    }
    if let Some(quality) = args.quality {
        settings.export.jpeg_quality = quality;
    }
    settings.render.sanitize();
    settings.export.jpeg_quality = settings.export.jpeg_quality.clamp(1, 100);
}

pub fn user_tuning(args: &RenderArgs) -> UserTuning {
    UserTuning {
        intensity: args.intensity,
        sigma: args.sigma,
        brightness: args.brightness,
    }
}

pub fn view_mode(view: ViewArg, settings: &AppSettings) -> ViewMode {
    match view {
        ViewArg::Before => ViewMode::Before,
        ViewArg::After => ViewMode::After,
        ViewArg::Split => ViewMode::split(settings.render.split_position),
        ViewArg::Mask => ViewMode::Mask,
    }
}

/// Parse `x,y;x,y;...` into a brush stroke.
pub fn parse_stroke(raw: &str, radius: f32) -> Result<BrushStroke> {
    let points = raw
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_point)
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("invalid stroke '{raw}'"))?;
    if points.is_empty() {
        bail!("stroke '{raw}' has no points");
    }
    if !(radius.is_finite() && radius > 0.0) {
        bail!("brush radius must be positive (got {radius})");
    }
    Ok(BrushStroke::new(points, radius))
}

fn parse_point(part: &str) -> Result<Point> {
    let (x, y) = part
        .split_once(',')
        .with_context(|| format!("expected x,y but found '{part}'"))?;
    let x: f32 = x.trim().parse().with_context(|| format!("bad x in '{part}'"))?;
    let y: f32 = y.trim().parse().with_context(|| format!("bad y in '{part}'"))?;
    Ok(Point::new(x, y))
}

/// Display form of a path for reports.
pub fn display_path(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
