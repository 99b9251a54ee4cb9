//! JSON run summary printed after every invocation.

use serde::Serialize;
use tryon_core::{
    DetectionResult, EngineError, FilterKey, PassTrace, QualityWarning, RenderBackend,
    RenderParameters,
};
use tryon_utils::{QualityHint, QualityMetrics, gpu::GpuStatusIndicator};

#[derive(Debug, Serialize)]
pub struct DetectionSummary {
    pub confidence: f32,
    pub retry_count: u32,
    pub processing_time_ms: u64,
    pub landmarks: usize,
    pub zones: Vec<&'static str>,
}

impl From<&DetectionResult> for DetectionSummary {
    fn from(result: &DetectionResult) -> Self {
        Self {
            confidence: result.confidence,
            retry_count: result.retry_count,
            processing_time_ms: result.processing_time_ms,
            landmarks: result.landmarks.len(),
            zones: result.zones.iter().map(|zone| zone.name.as_str()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QualitySummary {
    pub score: u8,
    pub is_good_quality: bool,
    pub brightness: f32,
    pub contrast: f32,
    pub sharpness: f32,
    pub hints: Vec<QualityHint>,
}

impl From<&QualityMetrics> for QualitySummary {
    fn from(metrics: &QualityMetrics) -> Self {
        Self {
            score: metrics.score,
            is_good_quality: metrics.is_good_quality,
            brightness: metrics.brightness,
            contrast: metrics.contrast,
            sharpness: metrics.sharpness,
            hints: metrics.hints.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorSummary {
    pub category: &'static str,
    pub message: &'static str,
    pub detail: String,
    pub hints: Vec<QualityHint>,
}

impl From<&EngineError> for ErrorSummary {
    fn from(err: &EngineError) -> Self {
        Self {
            category: err.category(),
            message: err.user_message(),
            detail: err.to_string(),
            hints: err.hints().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub input: String,
    pub product_id: String,
    pub filter: FilterKey,
    pub tone_extensions: bool,
    pub backend: RenderBackend,
    pub gpu: GpuStatusIndicator,
    pub parameters: RenderParameters,
    pub quality: Option<QualitySummary>,
    pub detection: Option<DetectionSummary>,
    pub warnings: Vec<QualityWarning>,
    pub view: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub passes: PassTrace,
    /// Renderer setup failure that forced the CPU fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renderer_error: Option<ErrorSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSummary>,
}
