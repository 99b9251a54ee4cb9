//! Engine-level error taxonomy and advisory warnings.

use serde::Serialize;
use thiserror::Error;
use tryon_utils::{QualityHint, QualityMetrics};

use crate::detection::DetectionError;
use crate::mask::MaskError;
use crate::render::{AllocationError, CompileError, RenderError};
use crate::store::ConfigError;
use crate::view::ViewError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("shader program failed to build: {0}")]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error(transparent)]
    Render(RenderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    View(#[from] ViewError),
    #[error(transparent)]
    Mask(#[from] MaskError),
    #[error("export failed: {0}")]
    Export(String),
    #[error("no frame loaded")]
    NoFrame,
}

/// Compile and allocation failures keep their own categories even when they
/// surface through a renderer call.
impl From<RenderError> for EngineError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Compile(err) => EngineError::Compile(err),
            RenderError::Allocation(err) => EngineError::Allocation(err),
            other => EngineError::Render(other),
        }
    }
}

impl EngineError {
    /// Stable identifier used in reports and telemetry.
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::Compile(_) => "compile",
            EngineError::Allocation(_) => "allocation",
            EngineError::Detection(DetectionError::MaxRetries { .. }) => "max_retries",
            EngineError::Detection(DetectionError::Failed { .. }) => "detection_failed",
            EngineError::Detection(DetectionError::Timeout { .. }) => "timeout",
            EngineError::Render(_) => "render",
            EngineError::Config(_) => "config",
            EngineError::View(_) => "view",
            EngineError::Mask(_) => "mask",
            EngineError::Export(_) => "export",
            EngineError::NoFrame => "no_frame",
        }
    }

    /// Message shown to the person using the app.
    pub fn user_message(&self) -> &'static str {
        match self {
            EngineError::Compile(_) | EngineError::Allocation(_) => {
                "This device hit an environment limitation while setting up the effect. Try a smaller photo or switch off GPU rendering."
            }
            EngineError::Detection(DetectionError::MaxRetries { .. }) => {
                "We retried automatically and still failed to find a face. Improve the lighting or framing and take a new photo."
            }
            EngineError::Detection(DetectionError::Failed { .. }) => {
                "No face was found in this photo."
            }
            EngineError::Detection(DetectionError::Timeout { .. }) => {
                "Face detection took too long. Please try again."
            }
            EngineError::Render(_) => "The effect could not be rendered for this photo.",
            EngineError::Config(_) => "Product settings could not be loaded or saved.",
            EngineError::View(_) | EngineError::Mask(_) => {
                "The preview is out of date with the current photo. Reload the photo."
            }
            EngineError::Export(_) => "The image could not be saved.",
            EngineError::NoFrame => "Load a photo first.",
        }
    }

    /// Hints worth showing next to the message, most severe first.
    pub fn hints(&self) -> &[QualityHint] {
        match self {
            EngineError::Detection(err) => err.hints(),
            _ => &[],
        }
    }
}

/// Non-fatal advice that rendering went ahead on a poor frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityWarning {
    pub score: u8,
    pub hints: Vec<QualityHint>,
}

impl QualityWarning {
    /// `None` when the frame passed every quality check.
    pub fn from_metrics(metrics: &QualityMetrics) -> Option<Self> {
        if metrics.is_good_quality && metrics.hints.is_empty() {
            return None;
        }
        Some(Self {
            score: metrics.score,
            hints: metrics.hints.clone(),
        })
    }
}
