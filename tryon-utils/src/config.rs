//! Shared configuration types consumed across the try-on workspace.
//!
//! Everything here serializes to a single JSON document so the CLI (and any
//! future front end) can load, tweak and persist the same settings.

use crate::{color::RgbaColor, gpu::GpuContextOptions, output::DEFAULT_JPEG_QUALITY};

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Face-zone detection parameters and retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Minimum confidence a synthesized detection needs on the first attempt.
    pub confidence_threshold: f32,
    /// Smallest accepted face box, as a fraction of the shorter image side.
    pub min_face_size: f32,
    /// Largest accepted face box, as a fraction of the shorter image side.
    pub max_face_size: f32,
    /// Retries allowed after the first failed attempt.
    pub max_retries: u32,
    /// Retry automatically with relaxed parameters on failure.
    pub auto_retry: bool,
    /// Pause between retries in milliseconds.
    pub retry_delay_ms: u64,
    /// Hard upper bound for a whole detection call, retries included.
    pub timeout_ms: u64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            min_face_size: 0.2,
            max_face_size: 0.9,
            max_retries: 3,
            auto_retry: true,
            retry_delay_ms: 250,
            timeout_ms: 15_000,
        }
    }
}

/// Render and view preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Apply preset contrast/warmth/brightness extras in the main render, not
    /// only in admin previews.
    pub tone_extensions: bool,
    /// Initial split position for the before/after view (0.0-1.0).
    pub split_position: f32,
    /// Divider thickness in pixels.
    pub divider_width: u32,
    /// Radius of the split drag handle in pixels.
    pub handle_radius: u32,
    /// Divider and handle color.
    pub divider_color: RgbaColor,
    /// Opaque backdrop behind the mask view.
    pub mask_background: RgbaColor,
    /// Color used to visualize mask coverage.
    pub mask_tint: RgbaColor,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            tone_extensions: false,
            split_position: 0.5,
            divider_width: 2,
            handle_radius: 12,
            divider_color: RgbaColor::WHITE,
            mask_background: RgbaColor::opaque(0x1E, 0x1E, 0x1E),
            mask_tint: RgbaColor::opaque(0xFF, 0x4F, 0x9A),
        }
    }
}

impl RenderSettings {
    /// Clamp values to sensible ranges.
    pub fn sanitize(&mut self) {
        if !self.split_position.is_finite() {
            self.split_position = 0.5;
        }
        self.split_position = self.split_position.clamp(0.0, 1.0);
        self.divider_width = self.divider_width.clamp(1, 16);
        self.mask_background = self.mask_background.to_opaque();
    }
}

/// Export preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        self.level
            .trim()
            .parse::<LevelFilter>()
            .unwrap_or(LevelFilter::Debug)
    }
}

/// GPU-specific runtime preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuSettings {
    /// Whether GPU rendering should be attempted (auto-detect by default).
    pub enabled: bool,
    /// Respect `WGPU_*` environment overrides when initializing the backend.
    pub respect_env: bool,
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            respect_env: true,
        }
    }
}

impl From<&GpuSettings> for GpuContextOptions {
    fn from(settings: &GpuSettings) -> Self {
        GpuContextOptions {
            enabled: settings.enabled,
            respect_env: settings.respect_env,
            ..Default::default()
        }
    }
}

/// Persistent application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub detection: DetectionSettings,
    pub render: RenderSettings,
    pub export: ExportSettings,
    pub telemetry: TelemetrySettings,
    pub gpu: GpuSettings,
}

impl AppSettings {
    /// Load settings from a JSON file. Missing sections fall back to defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        settings.render.sanitize();
        settings.export.jpeg_quality = settings.export.jpeg_quality.clamp(1, 100);
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, overwriting any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}

/// Returns the default path for persisted settings (`config/tryon_settings.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/tryon_settings.json"))
        .unwrap_or_else(|_| PathBuf::from("config/tryon_settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_settings_round_trip() {
        let file = NamedTempFile::new().expect("tempfile");
        let settings = AppSettings::default();
        settings.save_to_path(file.path()).expect("save");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.detection, settings.detection);
        assert_eq!(loaded.render, settings.render);
        assert_eq!(loaded.export, settings.export);
        assert_eq!(loaded.telemetry.level, settings.telemetry.level);
        assert_eq!(loaded.gpu.enabled, settings.gpu.enabled);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = NamedTempFile::new().expect("tempfile");
        let json = r#"{
            "detection": { "confidence_threshold": 0.6, "max_retries": 5 },
            "render": { "tone_extensions": true, "split_position": 3.0 }
        }"#;
        fs::write(file.path(), json).expect("write custom settings");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.detection.confidence_threshold, 0.6);
        assert_eq!(loaded.detection.max_retries, 5);
        assert_eq!(loaded.detection.timeout_ms, 15_000);
        assert!(loaded.render.tone_extensions);
        assert_eq!(loaded.render.split_position, 1.0);
        assert_eq!(loaded.export.jpeg_quality, 90);
        assert!(loaded.gpu.enabled);
        assert_eq!(loaded.telemetry.level_filter(), LevelFilter::Debug);
    }

    #[test]
    fn mask_background_is_forced_opaque() {
        let mut render = RenderSettings {
            mask_background: RgbaColor {
                red: 10,
                green: 10,
                blue: 10,
                alpha: 0,
            },
            ..RenderSettings::default()
        };
        render.sanitize();
        assert_eq!(render.mask_background.alpha, 255);
    }

    #[test]
    fn telemetry_level_parses_variants() {
        let telemetry = TelemetrySettings {
            level: "TRACE".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Trace);

        let telemetry = TelemetrySettings {
            level: "nonsense".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Debug);
    }

    #[test]
    fn gpu_settings_map_to_context_options() {
        let options: GpuContextOptions = (&GpuSettings {
            enabled: false,
            respect_env: false,
        })
            .into();
        assert!(!options.enabled);
        assert!(!options.respect_env);
    }
}
