//! Built-in filter presets.
//!
//! Each product is locked to exactly one of five filter keys. A preset bundles
//! the default blend parameters for that key with a set of "deep" sub-effects
//! whose numeric fields feed the resolver and the zone weighting of
//! synthesized masks. The registry is a process-wide constant table; nothing
//! writes to it after start-up.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Locked filter key of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKey {
    Wrinkles,
    Brightness,
    Spots,
    Acne,
    Firmness,
}

impl FilterKey {
    pub const ALL: [FilterKey; 5] = [
        FilterKey::Wrinkles,
        FilterKey::Brightness,
        FilterKey::Spots,
        FilterKey::Acne,
        FilterKey::Firmness,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterKey::Wrinkles => "wrinkles",
            FilterKey::Brightness => "brightness",
            FilterKey::Spots => "spots",
            FilterKey::Acne => "acne",
            FilterKey::Firmness => "firmness",
        }
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        FilterKey::ALL
            .into_iter()
            .find(|key| key.as_str() == needle)
            .ok_or_else(|| {
                format!("unknown filter '{s}'; expected wrinkles, brightness, spots, acne or firmness")
            })
    }
}

/// Kind discriminant of a deep sub-effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Smooth,
    Brightness,
    Contrast,
    Warmth,
    ToneUnify,
    Blemish,
    ContourLift,
}

/// Numeric payload of a deep sub-effect, tagged by kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectParams {
    Smooth { radius: f32 },
    /// Brightness lift in percent (10 = +0.10 normalized).
    Brightness { value: f32 },
    /// Contrast multiplier around mid-gray.
    Contrast { value: f32 },
    /// Red lift and blue cut in 8-bit channel steps, blended by `alpha`.
    Warmth { r_plus: f32, b_minus: f32, alpha: f32 },
    ToneUnify { opacity: f32 },
    Blemish { radius: f32 },
    ContourLift { opacity: f32 },
}

impl EffectParams {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectParams::Smooth { .. } => EffectKind::Smooth,
            EffectParams::Brightness { .. } => EffectKind::Brightness,
            EffectParams::Contrast { .. } => EffectKind::Contrast,
            EffectParams::Warmth { .. } => EffectKind::Warmth,
            EffectParams::ToneUnify { .. } => EffectKind::ToneUnify,
            EffectParams::Blemish { .. } => EffectKind::Blemish,
            EffectParams::ContourLift { .. } => EffectKind::ContourLift,
        }
    }

    /// The single scalar that characterizes this effect.
    pub fn primary_value(&self) -> f32 {
        match *self {
            EffectParams::Smooth { radius } | EffectParams::Blemish { radius } => radius,
            EffectParams::Brightness { value } | EffectParams::Contrast { value } => value,
            EffectParams::Warmth { alpha, .. } => alpha,
            EffectParams::ToneUnify { opacity } | EffectParams::ContourLift { opacity } => opacity,
        }
    }
}

/// A deep sub-effect: an on/off switch plus its typed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeepEffect {
    pub enabled: bool,
    #[serde(flatten)]
    pub params: EffectParams,
}

impl DeepEffect {
    pub const fn new(enabled: bool, params: EffectParams) -> Self {
        Self { enabled, params }
    }

    pub fn kind(&self) -> EffectKind {
        self.params.kind()
    }

    /// Primary value when the effect is enabled, `None` otherwise.
    pub fn effective_value(&self) -> Option<f32> {
        self.enabled.then(|| self.params.primary_value())
    }
}

/// Full deep configuration of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeepConfig {
    pub smooth: DeepEffect,
    pub brightness: DeepEffect,
    pub contrast: DeepEffect,
    pub warmth: DeepEffect,
    pub tone_unify: DeepEffect,
    pub blemish: DeepEffect,
    pub contour_lift: DeepEffect,
}

impl DeepConfig {
    pub fn effect(&self, kind: EffectKind) -> &DeepEffect {
        match kind {
            EffectKind::Smooth => &self.smooth,
            EffectKind::Brightness => &self.brightness,
            EffectKind::Contrast => &self.contrast,
            EffectKind::Warmth => &self.warmth,
            EffectKind::ToneUnify => &self.tone_unify,
            EffectKind::Blemish => &self.blemish,
            EffectKind::ContourLift => &self.contour_lift,
        }
    }

    fn effect_mut(&mut self, kind: EffectKind) -> &mut DeepEffect {
        match kind {
            EffectKind::Smooth => &mut self.smooth,
            EffectKind::Brightness => &mut self.brightness,
            EffectKind::Contrast => &mut self.contrast,
            EffectKind::Warmth => &mut self.warmth,
            EffectKind::ToneUnify => &mut self.tone_unify,
            EffectKind::Blemish => &mut self.blemish,
            EffectKind::ContourLift => &mut self.contour_lift,
        }
    }

    /// Replace the slot matching each override's kind.
    pub fn with_overrides<'a>(
        mut self,
        overrides: impl IntoIterator<Item = &'a DeepEffect>,
    ) -> Self {
        for effect in overrides {
            *self.effect_mut(effect.kind()) = *effect;
        }
        self
    }

    /// Warmth as `(r_plus, b_minus, alpha)` when enabled.
    pub fn warmth_tint(&self) -> Option<(f32, f32, f32)> {
        match self.warmth.params {
            EffectParams::Warmth {
                r_plus,
                b_minus,
                alpha,
            } if self.warmth.enabled => Some((r_plus, b_minus, alpha)),
            _ => None,
        }
    }
}

/// Default blend parameters of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresetDefaults {
    pub intensity: f32,
    pub sigma: f32,
    pub brightness: f32,
}

/// A named, immutable filter preset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterPreset {
    pub key: FilterKey,
    pub label: &'static str,
    pub defaults: PresetDefaults,
    pub deep: DeepConfig,
}

const fn deep(
    smooth: (bool, f32),
    brightness: (bool, f32),
    contrast: (bool, f32),
    warmth: (bool, f32, f32, f32),
    tone_unify: (bool, f32),
    blemish: (bool, f32),
    contour_lift: (bool, f32),
) -> DeepConfig {
    DeepConfig {
        smooth: DeepEffect::new(smooth.0, EffectParams::Smooth { radius: smooth.1 }),
        brightness: DeepEffect::new(brightness.0, EffectParams::Brightness { value: brightness.1 }),
        contrast: DeepEffect::new(contrast.0, EffectParams::Contrast { value: contrast.1 }),
        warmth: DeepEffect::new(
            warmth.0,
            EffectParams::Warmth {
                r_plus: warmth.1,
                b_minus: warmth.2,
                alpha: warmth.3,
            },
        ),
        tone_unify: DeepEffect::new(
            tone_unify.0,
            EffectParams::ToneUnify {
                opacity: tone_unify.1,
            },
        ),
        blemish: DeepEffect::new(blemish.0, EffectParams::Blemish { radius: blemish.1 }),
        contour_lift: DeepEffect::new(
            contour_lift.0,
            EffectParams::ContourLift {
                opacity: contour_lift.1,
            },
        ),
    }
}

static PRESETS: [FilterPreset; 5] = [
    FilterPreset {
        key: FilterKey::Wrinkles,
        label: "Wrinkle Smoothing",
        defaults: PresetDefaults {
            intensity: 0.5,
            sigma: 4.0,
            brightness: 0.0,
        },
        deep: deep(
            (true, 4.0),
            (true, 10.0),
            (false, 1.0),
            (false, 0.0, 0.0, 0.0),
            (true, 0.3),
            (false, 2.0),
            (false, 0.0),
        ),
    },
    FilterPreset {
        key: FilterKey::Brightness,
        label: "Brightening",
        defaults: PresetDefaults {
            intensity: 0.4,
            sigma: 2.0,
            brightness: 0.08,
        },
        deep: deep(
            (true, 2.0),
            (true, 15.0),
            (true, 1.05),
            (true, 6.0, 3.0, 0.35),
            (true, 0.5),
            (false, 2.0),
            (false, 0.0),
        ),
    },
    FilterPreset {
        key: FilterKey::Spots,
        label: "Spot Correction",
        defaults: PresetDefaults {
            intensity: 0.6,
            sigma: 3.0,
            brightness: 0.02,
        },
        deep: deep(
            (true, 3.0),
            (true, 5.0),
            (false, 1.0),
            (false, 0.0, 0.0, 0.0),
            (true, 0.6),
            (true, 3.0),
            (false, 0.0),
        ),
    },
    FilterPreset {
        key: FilterKey::Acne,
        label: "Acne Care",
        defaults: PresetDefaults {
            intensity: 0.7,
            sigma: 5.0,
            brightness: 0.0,
        },
        deep: deep(
            (true, 5.0),
            (false, 0.0),
            (false, 1.0),
            (false, 0.0, 0.0, 0.0),
            (true, 0.4),
            (true, 4.0),
            (false, 0.0),
        ),
    },
    FilterPreset {
        key: FilterKey::Firmness,
        label: "Firming",
        defaults: PresetDefaults {
            intensity: 0.45,
            sigma: 3.0,
            brightness: 0.03,
        },
        deep: deep(
            (true, 3.0),
            (true, 8.0),
            (true, 1.12),
            (true, 8.0, 4.0, 0.3),
            (false, 0.2),
            (false, 2.0),
            (true, 0.35),
        ),
    },
];

/// All registered presets, in registry order.
pub fn presets() -> &'static [FilterPreset] {
    &PRESETS
}

/// The preset for a filter key. Every key has exactly one preset.
pub fn preset(key: FilterKey) -> &'static FilterPreset {
    match key {
        FilterKey::Wrinkles => &PRESETS[0],
        FilterKey::Brightness => &PRESETS[1],
        FilterKey::Spots => &PRESETS[2],
        FilterKey::Acne => &PRESETS[3],
        FilterKey::Firmness => &PRESETS[4],
    }
}

/// Find a preset by key name (case-insensitive).
pub fn preset_by_name(name: &str) -> Option<&'static FilterPreset> {
    name.parse::<FilterKey>().ok().map(preset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_one_preset_per_key() {
        assert_eq!(presets().len(), 5);
        for key in FilterKey::ALL {
            assert_eq!(preset(key).key, key);
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(
            preset_by_name(" Wrinkles ").map(|p| p.key),
            Some(FilterKey::Wrinkles)
        );
        assert_eq!(
            preset_by_name("ACNE").map(|p| p.label),
            Some("Acne Care")
        );
        assert!(preset_by_name("glow").is_none());
    }

    #[test]
    fn wrinkles_defaults_match_catalog() {
        let wrinkles = preset(FilterKey::Wrinkles);
        assert_eq!(wrinkles.defaults.intensity, 0.5);
        assert_eq!(wrinkles.defaults.sigma, 4.0);
        assert_eq!(wrinkles.defaults.brightness, 0.0);
        assert_eq!(wrinkles.deep.brightness.effective_value(), Some(10.0));
    }

    #[test]
    fn slots_hold_matching_kinds() {
        for preset in presets() {
            for kind in [
                EffectKind::Smooth,
                EffectKind::Brightness,
                EffectKind::Contrast,
                EffectKind::Warmth,
                EffectKind::ToneUnify,
                EffectKind::Blemish,
                EffectKind::ContourLift,
            ] {
                assert_eq!(preset.deep.effect(kind).kind(), kind, "{}", preset.label);
            }
        }
    }

    #[test]
    fn disabled_effect_has_no_effective_value() {
        let effect = DeepEffect::new(false, EffectParams::Contrast { value: 1.2 });
        assert_eq!(effect.effective_value(), None);
        assert_eq!(effect.params.primary_value(), 1.2);
    }

    #[test]
    fn overrides_replace_by_kind() {
        let base = preset(FilterKey::Wrinkles).deep;
        let warm = DeepEffect::new(
            true,
            EffectParams::Warmth {
                r_plus: 12.0,
                b_minus: 6.0,
                alpha: 0.5,
            },
        );
        let merged = base.with_overrides([&warm]);
        assert_eq!(merged.warmth_tint(), Some((12.0, 6.0, 0.5)));
        assert_eq!(merged.smooth, base.smooth);
    }

    #[test]
    fn deep_effect_json_is_flat_and_tagged() {
        let effect = DeepEffect::new(true, EffectParams::ToneUnify { opacity: 0.4 });
        let json = serde_json::to_value(effect).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "enabled": true, "kind": "tone_unify", "opacity": 0.4f32 })
        );
        let back: DeepEffect = serde_json::from_value(json).unwrap();
        assert_eq!(back, effect);
    }
}
