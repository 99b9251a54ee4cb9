//! Gaussian kernel shared by both blur implementations.

/// Largest tap offset either direction; the shader loop is unrolled to this.
pub const MAX_TAP_OFFSET: u32 = 10;
/// Sigmas at or below this disable blurring.
pub const SIGMA_EPSILON: f32 = 1e-6;

/// Normalized 1D Gaussian weights for offsets `-radius..=radius`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlurKernel {
    sigma: f32,
    radius: u32,
    weights: Vec<f32>,
}

impl BlurKernel {
    /// Build a kernel, or `None` when `sigma` is too small to blur anything.
    pub fn new(sigma: f32) -> Option<Self> {
        if !sigma.is_finite() || sigma <= SIGMA_EPSILON {
            return None;
        }
        let radius = Self::radius_for(sigma);
        let two_sigma_sq = 2.0 * sigma * sigma;
        let mut weights: Vec<f32> = (-(radius as i32)..=radius as i32)
            .map(|offset| {
                let d = offset as f32;
                (-(d * d) / two_sigma_sq).exp()
            })
            .collect();
        let total: f32 = weights.iter().sum();
        for weight in &mut weights {
            *weight /= total;
        }
        Some(Self {
            sigma,
            radius,
            weights,
        })
    }

    /// `min(floor(3σ), 10)`.
    pub fn radius_for(sigma: f32) -> u32 {
        ((3.0 * sigma).floor().max(0.0) as u32).min(MAX_TAP_OFFSET)
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Weights indexed by `offset + radius`.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn weight(&self, offset: i32) -> f32 {
        let index = offset + self.radius as i32;
        if index < 0 {
            return 0.0;
        }
        self.weights.get(index as usize).copied().unwrap_or(0.0)
    }
}
