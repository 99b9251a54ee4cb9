//! Render parameters and their legal ranges.

use serde::{Deserialize, Serialize};

pub const INTENSITY_RANGE: (f32, f32) = (0.0, 1.0);
pub const BRIGHTNESS_RANGE: (f32, f32) = (-0.3, 0.3);
pub const CONTRAST_RANGE: (f32, f32) = (0.8, 1.3);
/// Warmth channel deltas, in 8-bit steps.
pub const WARMTH_RANGE: (f32, f32) = (0.0, 20.0);

/// Fully resolved numeric inputs of one render.
///
/// Values outside the legal ranges never reach a renderer; every entry point
/// goes through [`RenderParameters::clamped`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParameters {
    /// Blend weight of the blurred image under full mask coverage.
    pub intensity: f32,
    /// Gaussian standard deviation in pixels. `0` disables the blur passes.
    pub sigma: f32,
    /// Additive brightness in normalized units.
    pub brightness: f32,
    /// Contrast multiplier around mid-gray; `1.0` is neutral.
    pub contrast: f32,
    /// Red lift in 8-bit steps.
    pub warmth_r: u8,
    /// Blue cut in 8-bit steps.
    pub warmth_b: u8,
    /// Blend factor of the warmth tint.
    pub warmth_alpha: f32,
}

impl Default for RenderParameters {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

fn clamp_or(value: f32, (low, high): (f32, f32), fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(low, high)
    } else {
        fallback
    }
}

impl RenderParameters {
    /// Parameters that leave every pixel untouched.
    pub const NEUTRAL: RenderParameters = RenderParameters {
        intensity: 0.0,
        sigma: 0.0,
        brightness: 0.0,
        contrast: 1.0,
        warmth_r: 0,
        warmth_b: 0,
        warmth_alpha: 0.0,
    };

    /// Clamp every field into its legal range. Non-finite values fall back to
    /// the neutral value of that field.
    pub fn clamped(self) -> Self {
        let sigma = if self.sigma.is_finite() {
            self.sigma.max(0.0)
        } else {
            0.0
        };
        Self {
            intensity: clamp_or(self.intensity, INTENSITY_RANGE, 0.0),
            sigma,
            brightness: clamp_or(self.brightness, BRIGHTNESS_RANGE, 0.0),
            contrast: clamp_or(self.contrast, CONTRAST_RANGE, 1.0),
            warmth_r: self.warmth_r.min(WARMTH_RANGE.1 as u8),
            warmth_b: self.warmth_b.min(WARMTH_RANGE.1 as u8),
            warmth_alpha: clamp_or(self.warmth_alpha, (0.0, 1.0), 0.0),
        }
    }

    /// Round and clamp a warmth delta into a channel step count.
    pub fn warmth_step(value: f32) -> u8 {
        clamp_or(value, WARMTH_RANGE, 0.0).round() as u8
    }

    /// Apply session-level slider values on top of resolved parameters.
    pub fn with_tuning(self, tuning: &UserTuning) -> Self {
        Self {
            intensity: tuning.intensity.unwrap_or(self.intensity),
            sigma: tuning.sigma.unwrap_or(self.sigma),
            brightness: tuning.brightness.unwrap_or(self.brightness),
            ..self
        }
        .clamped()
    }

    /// True when the tone stage is an identity.
    pub fn tone_is_neutral(&self) -> bool {
        self.brightness == 0.0
            && self.contrast == 1.0
            && (self.warmth_alpha == 0.0 || (self.warmth_r == 0 && self.warmth_b == 0))
    }
}

/// Numeric sliders an end user may move. The filter key is never part of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserTuning {
    pub intensity: Option<f32>,
    pub sigma: Option<f32>,
    pub brightness: Option<f32>,
}

impl UserTuning {
    pub fn is_empty(&self) -> bool {
        self.intensity.is_none() && self.sigma.is_none() && self.brightness.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping_keeps_fields_in_range() {
        let wild = RenderParameters {
            intensity: 4.0,
            sigma: -3.0,
            brightness: -0.9,
            contrast: 2.0,
            warmth_r: 200,
            warmth_b: 21,
            warmth_alpha: 1.5,
        }
        .clamped();
        assert_eq!(wild.intensity, 1.0);
        assert_eq!(wild.sigma, 0.0);
        assert_eq!(wild.brightness, -0.3);
        assert_eq!(wild.contrast, 1.3);
        assert_eq!(wild.warmth_r, 20);
        assert_eq!(wild.warmth_b, 20);
        assert_eq!(wild.warmth_alpha, 1.0);
    }

    #[test]
    fn non_finite_values_fall_back_to_neutral() {
        let params = RenderParameters {
            intensity: f32::NAN,
            sigma: f32::INFINITY,
            contrast: f32::NAN,
            ..RenderParameters::NEUTRAL
        }
        .clamped();
        assert_eq!(params, RenderParameters::NEUTRAL);
    }

    #[test]
    fn tuning_overrides_only_given_sliders() {
        let base = RenderParameters {
            intensity: 0.5,
            sigma: 4.0,
            ..RenderParameters::NEUTRAL
        };
        let tuned = base.with_tuning(&UserTuning {
            intensity: Some(0.8),
            ..UserTuning::default()
        });
        assert_eq!(tuned.intensity, 0.8);
        assert_eq!(tuned.sigma, 4.0);
    }

    #[test]
    fn warmth_steps_round_and_clamp() {
        assert_eq!(RenderParameters::warmth_step(6.4), 6);
        assert_eq!(RenderParameters::warmth_step(6.5), 7);
        assert_eq!(RenderParameters::warmth_step(-2.0), 0);
        assert_eq!(RenderParameters::warmth_step(99.0), 20);
    }

    #[test]
    fn neutral_tone_detection() {
        assert!(RenderParameters::NEUTRAL.tone_is_neutral());
        let warm_but_invisible = RenderParameters {
            warmth_r: 8,
            ..RenderParameters::NEUTRAL
        };
        assert!(warm_but_invisible.tone_is_neutral());
    }
}
