//! Turns a product's filter configuration into concrete render parameters.
//!
//! Layers are applied in a fixed order and each one only touches the fields
//! it actually sets:
//!
//! 1. preset defaults for the locked filter key,
//! 2. the product's own default intensity/sigma/brightness,
//! 3. deep tone extras (contrast, warmth, brightness lift), only when tone
//!    extensions are switched on,
//! 4. the admin `webgl_config` overrides,
//! 5. clamping into the legal ranges.

use log::debug;
use tryon_utils::config::RenderSettings;

use crate::{
    params::RenderParameters,
    presets::{DeepConfig, FilterPreset, preset},
    product::ProductFilterConfig,
};

/// Switches that change how deep effects reach the main render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Feed enabled deep contrast, warmth and brightness into the render.
    pub tone_extensions: bool,
}

impl From<&RenderSettings> for ResolveOptions {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            tone_extensions: settings.tone_extensions,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FilterPresetResolver {
    options: ResolveOptions,
}

impl FilterPresetResolver {
    pub fn new(options: ResolveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Preset backing a configuration.
    pub fn preset_for(&self, config: &ProductFilterConfig) -> &'static FilterPreset {
        preset(config.locked_filter_type())
    }

    /// Preset deep config with the product's per-effect overrides applied.
    pub fn effective_deep(&self, config: &ProductFilterConfig) -> DeepConfig {
        self.preset_for(config)
            .deep
            .with_overrides(&config.deep_overrides)
    }

    pub fn resolve(&self, config: &ProductFilterConfig) -> RenderParameters {
        let preset = self.preset_for(config);
        let mut params = RenderParameters {
            intensity: preset.defaults.intensity,
            sigma: preset.defaults.sigma,
            brightness: preset.defaults.brightness,
            ..RenderParameters::NEUTRAL
        };

        if let Some(intensity) = config.default_intensity {
            params.intensity = intensity;
        }
        if let Some(sigma) = config.default_sigma {
            params.sigma = sigma;
        }
        if let Some(brightness) = config.default_brightness {
            params.brightness = brightness;
        }

        if self.options.tone_extensions {
            let deep = self.effective_deep(config);
            if let Some(contrast) = deep.contrast.effective_value() {
                params.contrast = contrast;
            }
            if let Some((r_plus, b_minus, alpha)) = deep.warmth_tint() {
                params.warmth_r = RenderParameters::warmth_step(r_plus);
                params.warmth_b = RenderParameters::warmth_step(b_minus);
                params.warmth_alpha = alpha;
            }
            if let Some(lift) = deep.brightness.effective_value() {
                params.brightness += lift / 100.0;
            }
        }

        let overrides = &config.webgl_config;
        if let Some(intensity) = overrides.intensity {
            params.intensity = intensity;
        }
        if let Some(sigma) = overrides.sigma {
            params.sigma = sigma;
        }
        if let Some(brightness) = overrides.brightness {
            params.brightness = brightness;
        }
        if let Some(contrast) = overrides.contrast {
            params.contrast = contrast;
        }
        if let Some(warmth_r) = overrides.warmth_r {
            params.warmth_r = RenderParameters::warmth_step(warmth_r);
        }
        if let Some(warmth_b) = overrides.warmth_b {
            params.warmth_b = RenderParameters::warmth_step(warmth_b);
        }
        if let Some(alpha) = overrides.warmth_alpha {
            params.warmth_alpha = alpha;
        }

        let params = params.clamped();
        debug!(
            target: "tryon::config",
            "resolved {} for product '{}': {:?}",
            preset.key,
            config.product_id(),
            params
        );
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::{DeepEffect, EffectParams, FilterKey};

    fn wrinkles() -> ProductFilterConfig {
        ProductFilterConfig::new("w-1", FilterKey::Wrinkles)
    }

    #[test]
    fn preset_defaults_without_extensions() {
        let params = FilterPresetResolver::default().resolve(&wrinkles());
        assert_eq!(params.intensity, 0.5);
        assert_eq!(params.sigma, 4.0);
        assert_eq!(params.brightness, 0.0);
        assert_eq!(params.contrast, 1.0);
        assert_eq!(params.warmth_alpha, 0.0);
    }

    #[test]
    fn deep_brightness_lifts_with_extensions() {
        let resolver = FilterPresetResolver::new(ResolveOptions {
            tone_extensions: true,
        });
        let params = resolver.resolve(&wrinkles());
        assert!((params.brightness - 0.10).abs() < 1e-6);
        // Wrinkles keeps contrast and warmth disabled.
        assert_eq!(params.contrast, 1.0);
        assert_eq!(params.warmth_alpha, 0.0);
    }

    #[test]
    fn brightness_preset_feeds_tone_extras() {
        let resolver = FilterPresetResolver::new(ResolveOptions {
            tone_extensions: true,
        });
        let params = resolver.resolve(&ProductFilterConfig::new("b-1", FilterKey::Brightness));
        assert_eq!(params.contrast, 1.05);
        assert_eq!(params.warmth_r, 6);
        assert_eq!(params.warmth_b, 3);
        assert_eq!(params.warmth_alpha, 0.35);
        assert!((params.brightness - 0.23).abs() < 1e-6);
    }

    #[test]
    fn product_defaults_then_admin_overrides() {
        let mut config = wrinkles();
        config.default_intensity = Some(0.7);
        config.default_sigma = Some(2.0);
        config.webgl_config.sigma = Some(6.0);
        config.webgl_config.contrast = Some(5.0);

        let params = FilterPresetResolver::default().resolve(&config);
        assert_eq!(params.intensity, 0.7);
        assert_eq!(params.sigma, 6.0);
        assert_eq!(params.contrast, 1.3);
    }

    #[test]
    fn admin_override_beats_deep_extras() {
        let mut config = wrinkles();
        config.webgl_config.brightness = Some(-0.05);
        let resolver = FilterPresetResolver::new(ResolveOptions {
            tone_extensions: true,
        });
        assert_eq!(resolver.resolve(&config).brightness, -0.05);
    }

    #[test]
    fn deep_overrides_can_enable_disabled_effects() {
        let mut config = wrinkles();
        config
            .deep_overrides
            .push(DeepEffect::new(true, EffectParams::Contrast { value: 1.2 }));
        let resolver = FilterPresetResolver::new(ResolveOptions {
            tone_extensions: true,
        });
        assert_eq!(resolver.resolve(&config).contrast, 1.2);
        assert_eq!(FilterPresetResolver::default().resolve(&config).contrast, 1.0);
    }
}
