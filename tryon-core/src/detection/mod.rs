//! Face-zone synthesis with confidence scoring and a bounded retry loop.
//!
//! There is no trained model behind this module. A detection is synthesized
//! from the frame's quality metrics: a centered face box, a 68-point landmark
//! template and the zones derived from it. What makes it behave like a real
//! detector is the scoring. Poor lighting, flat contrast, blur and low
//! resolution all lower the confidence, and an attempt only succeeds when the
//! confidence clears the (progressively relaxed) threshold.

pub mod landmarks;
pub mod zones;

use std::{
    fmt,
    thread,
    time::{Duration, Instant},
};

use image::RgbaImage;
use log::{Level, debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tryon_utils::{
    Frame, Point, QualityHint, QualityMetrics, analyze_quality, config::DetectionSettings,
    timing_guard,
};

pub use landmarks::{BoundingBox, LANDMARK_COUNT, synthesize_landmarks};
pub use zones::{FaceZone, ZoneExtent, ZoneName, derive_zones};

/// Confidence before any quality penalty.
pub const BASE_CONFIDENCE: f32 = 0.85;
pub const BRIGHTNESS_PENALTY: f32 = 0.10;
pub const CONTRAST_PENALTY: f32 = 0.15;
pub const SHARPNESS_PENALTY: f32 = 0.20;
pub const RESOLUTION_PENALTY: f32 = 0.10;
/// Face box side relative to the shorter image side.
pub const FACE_RATIO: f32 = 0.6;
/// Threshold relaxation per retry.
pub const THRESHOLD_STEP: f32 = 0.1;
/// Relaxed thresholds never drop below this.
pub const THRESHOLD_FLOOR: f32 = 0.3;
/// Face size bounds widen by this much per retry.
pub const FACE_SIZE_STEP: f32 = 0.02;
/// Reported confidence caps.
pub const POOR_QUALITY_CAP: f32 = 0.90;
pub const GOOD_QUALITY_CAP: f32 = 0.98;
/// Slack when comparing confidence sums against relaxed thresholds.
const CONFIDENCE_EPSILON: f32 = 1e-4;

/// Detection parameters for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    pub confidence_threshold: f32,
    pub min_face_size: f32,
    pub max_face_size: f32,
    pub max_retries: u32,
    pub auto_retry: bool,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self::from(&DetectionSettings::default())
    }
}

impl From<&DetectionSettings> for DetectionParams {
    fn from(settings: &DetectionSettings) -> Self {
        Self {
            confidence_threshold: settings.confidence_threshold.clamp(0.0, 1.0),
            min_face_size: settings.min_face_size.max(0.0),
            max_face_size: settings.max_face_size.max(settings.min_face_size),
            max_retries: settings.max_retries,
            auto_retry: settings.auto_retry,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

impl DetectionParams {
    /// Parameters for retry number `retry`, always relaxed from `self`.
    pub fn relaxed(&self, retry: u32) -> Self {
        if retry == 0 {
            return *self;
        }
        let step = retry as f32;
        Self {
            confidence_threshold: (self.confidence_threshold - THRESHOLD_STEP * step)
                .max(THRESHOLD_FLOOR),
            min_face_size: (self.min_face_size - FACE_SIZE_STEP * step).max(0.0),
            max_face_size: (self.max_face_size + FACE_SIZE_STEP * step).min(1.0),
            ..*self
        }
    }
}

/// Stage of the detection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStage {
    Analyzing,
    Detecting,
    Mapping,
    Calibrating,
    Complete,
    Error,
}

impl fmt::Display for DetectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DetectionStage::Analyzing => "analyzing",
            DetectionStage::Detecting => "detecting",
            DetectionStage::Mapping => "mapping",
            DetectionStage::Calibrating => "calibrating",
            DetectionStage::Complete => "complete",
            DetectionStage::Error => "error",
        };
        f.write_str(label)
    }
}

/// Outcome of a successful detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub detected: bool,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
    pub landmarks: Vec<Point>,
    pub zones: Vec<FaceZone>,
    pub quality: QualityMetrics,
    pub parameters_used: DetectionParams,
    pub processing_time_ms: u64,
    pub retry_count: u32,
}

impl DetectionResult {
    pub fn zone(&self, name: ZoneName) -> Option<&FaceZone> {
        self.zones.iter().find(|zone| zone.name == name)
    }
}

/// Why a single attempt did not produce a face.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptFailure {
    #[error("frame has no pixels")]
    EmptyFrame,
    #[error("confidence {confidence:.2} is below the threshold {threshold:.2}")]
    LowConfidence { confidence: f32, threshold: f32 },
    #[error("face size {ratio:.2} is outside the accepted range {min:.2}-{max:.2}")]
    FaceSizeOutOfRange { ratio: f32, min: f32, max: f32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("no face found after {attempts} attempts: {last_failure}")]
    MaxRetries {
        attempts: u32,
        last_failure: AttemptFailure,
        hints: Vec<QualityHint>,
    },
    #[error("no face found: {failure}")]
    Failed {
        failure: AttemptFailure,
        hints: Vec<QualityHint>,
    },
    #[error("face detection timed out after {elapsed_ms} ms (limit {limit_ms} ms)")]
    Timeout { elapsed_ms: u64, limit_ms: u64 },
}

impl DetectionError {
    /// Remediation hints from the last analyzed frame, most severe first.
    pub fn hints(&self) -> &[QualityHint] {
        match self {
            DetectionError::MaxRetries { hints, .. } | DetectionError::Failed { hints, .. } => {
                hints
            }
            DetectionError::Timeout { .. } => &[],
        }
    }
}

/// Raw confidence for a frame, before clamping into the reported range.
pub fn raw_confidence(quality: &QualityMetrics) -> f32 {
    let mut confidence = BASE_CONFIDENCE;
    if !quality.brightness_ok() {
        confidence -= BRIGHTNESS_PENALTY;
    }
    if !quality.contrast_ok() {
        confidence -= CONTRAST_PENALTY;
    }
    if !quality.sharpness_ok() {
        confidence -= SHARPNESS_PENALTY;
    }
    if quality.resolution.is_below_480p() {
        confidence -= RESOLUTION_PENALTY;
    }
    confidence
}

enum AttemptOutcome {
    Found(Box<DetectionResult>),
    Missed {
        failure: AttemptFailure,
        hints: Vec<QualityHint>,
    },
    TimedOut,
}

/// Retrying face-zone synthesizer.
///
/// Stages advance strictly `analyzing → detecting → mapping → calibrating`
/// and end in `complete` or `error`. A failed attempt loops back to
/// `analyzing` with relaxed parameters until the retry budget is spent.
#[derive(Debug)]
pub struct FaceZoneSynthesizer {
    base: DetectionParams,
    stage: Option<DetectionStage>,
    transitions: Vec<DetectionStage>,
    retry_count: u32,
}

impl FaceZoneSynthesizer {
    pub fn new(base: DetectionParams) -> Self {
        Self {
            base,
            stage: None,
            transitions: Vec::new(),
            retry_count: 0,
        }
    }

    pub fn params(&self) -> &DetectionParams {
        &self.base
    }

    /// Current stage; `None` before the first call to [`Self::detect`].
    pub fn stage(&self) -> Option<DetectionStage> {
        self.stage
    }

    /// Every stage entered during the last call, in order.
    pub fn transitions(&self) -> &[DetectionStage] {
        &self.transitions
    }

    /// Retries performed during the last call.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn enter(&mut self, stage: DetectionStage) {
        debug!(target: "tryon::detect", "stage -> {stage}");
        self.stage = Some(stage);
        self.transitions.push(stage);
    }

    fn timeout_error(&mut self, started: Instant) -> DetectionError {
        self.enter(DetectionStage::Error);
        DetectionError::Timeout {
            elapsed_ms: started.elapsed().as_millis() as u64,
            limit_ms: self.base.timeout.as_millis() as u64,
        }
    }

    /// Run detection on `frame`, retrying with relaxed parameters on failure.
    pub fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectionError> {
        let _guard = timing_guard("tryon_core::detect", Level::Debug);
        let started = Instant::now();
        let deadline = started.checked_add(self.base.timeout);
        let expired = |now: Instant| deadline.is_some_and(|limit| now >= limit);

        self.transitions.clear();
        self.retry_count = 0;

        loop {
            let params = self.base.relaxed(self.retry_count);
            match self.attempt(frame.raster(), &params, started, &expired) {
                AttemptOutcome::Found(mut result) => {
                    result.retry_count = self.retry_count;
                    result.processing_time_ms = started.elapsed().as_millis() as u64;
                    self.enter(DetectionStage::Complete);
                    info!(
                        target: "tryon::detect",
                        "face zones synthesized (confidence {:.2}, {} retries)",
                        result.confidence,
                        self.retry_count
                    );
                    return Ok(*result);
                }
                AttemptOutcome::TimedOut => return Err(self.timeout_error(started)),
                AttemptOutcome::Missed { failure, hints } => {
                    if !self.base.auto_retry {
                        self.enter(DetectionStage::Error);
                        return Err(DetectionError::Failed { failure, hints });
                    }
                    if self.retry_count >= self.base.max_retries {
                        self.enter(DetectionStage::Error);
                        return Err(DetectionError::MaxRetries {
                            attempts: self.retry_count + 1,
                            last_failure: failure,
                            hints,
                        });
                    }
                    self.retry_count += 1;
                    warn!(
                        target: "tryon::detect",
                        "attempt {} failed ({failure}); retrying with relaxed parameters",
                        self.retry_count
                    );

                    let wait = match deadline {
                        Some(limit) => {
                            let remaining = limit.saturating_duration_since(Instant::now());
                            if remaining.is_zero() {
                                return Err(self.timeout_error(started));
                            }
                            self.base.retry_delay.min(remaining)
                        }
                        None => self.base.retry_delay,
                    };
                    if !wait.is_zero() {
                        thread::sleep(wait);
                    }
                    if expired(Instant::now()) {
                        return Err(self.timeout_error(started));
                    }
                }
            }
        }
    }

    fn attempt(
        &mut self,
        raster: &RgbaImage,
        params: &DetectionParams,
        started: Instant,
        expired: &dyn Fn(Instant) -> bool,
    ) -> AttemptOutcome {
        if expired(Instant::now()) {
            return AttemptOutcome::TimedOut;
        }
        self.enter(DetectionStage::Analyzing);
        let (width, height) = raster.dimensions();
        if width == 0 || height == 0 {
            return AttemptOutcome::Missed {
                failure: AttemptFailure::EmptyFrame,
                hints: Vec::new(),
            };
        }
        let quality = analyze_quality(raster);

        if expired(Instant::now()) {
            return AttemptOutcome::TimedOut;
        }
        self.enter(DetectionStage::Detecting);
        let raw = raw_confidence(&quality);
        let ratio = FACE_RATIO;
        if ratio < params.min_face_size || ratio > params.max_face_size {
            return AttemptOutcome::Missed {
                failure: AttemptFailure::FaceSizeOutOfRange {
                    ratio,
                    min: params.min_face_size,
                    max: params.max_face_size,
                },
                hints: quality.hints,
            };
        }
        if raw + CONFIDENCE_EPSILON < params.confidence_threshold {
            return AttemptOutcome::Missed {
                failure: AttemptFailure::LowConfidence {
                    confidence: raw,
                    threshold: params.confidence_threshold,
                },
                hints: quality.hints,
            };
        }
        let cap = if quality.is_good_quality {
            GOOD_QUALITY_CAP
        } else {
            POOR_QUALITY_CAP
        };
        let confidence = raw.max(params.confidence_threshold).min(cap);
        let side = width.min(height) as f32 * ratio;
        let bounding_box = BoundingBox::centered(width, height, side);

        if expired(Instant::now()) {
            return AttemptOutcome::TimedOut;
        }
        self.enter(DetectionStage::Mapping);
        let landmarks = synthesize_landmarks(&bounding_box);

        if expired(Instant::now()) {
            return AttemptOutcome::TimedOut;
        }
        self.enter(DetectionStage::Calibrating);
        let zones = derive_zones(&bounding_box, &landmarks, confidence);

        AttemptOutcome::Found(Box::new(DetectionResult {
            detected: true,
            confidence,
            bounding_box,
            landmarks,
            zones,
            quality,
            parameters_used: *params,
            processing_time_ms: started.elapsed().as_millis() as u64,
            retry_count: 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checkerboard(width: u32, height: u32) -> Frame {
        Frame::new(RgbaImage::from_fn(width, height, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgba([40, 40, 40, 255])
            } else {
                Rgba([210, 210, 210, 255])
            }
        }))
    }

    fn fast_params() -> DetectionParams {
        DetectionParams {
            retry_delay: Duration::ZERO,
            ..DetectionParams::default()
        }
    }

    #[test]
    fn relaxation_is_relative_to_the_base() {
        let base = DetectionParams::default();
        let second = base.relaxed(2);
        assert!((second.confidence_threshold - 0.5).abs() < 1e-6);
        assert!((second.min_face_size - 0.16).abs() < 1e-6);
        assert!((second.max_face_size - 0.94).abs() < 1e-6);
        assert_eq!(base.relaxed(20).confidence_threshold, THRESHOLD_FLOOR);
        assert_eq!(base.relaxed(0), base);
    }

    #[test]
    fn good_frame_passes_the_state_machine_in_order() {
        let mut synth = FaceZoneSynthesizer::new(fast_params());
        let result = synth.detect(&checkerboard(640, 480)).expect("detects");
        assert!(result.detected);
        assert_eq!(result.retry_count, 0);
        assert_eq!(result.landmarks.len(), LANDMARK_COUNT);
        assert_eq!(result.zones.len(), ZoneName::ALL.len());
        assert!(result.confidence >= 0.7 && result.confidence <= GOOD_QUALITY_CAP);
        assert_eq!(
            synth.transitions(),
            &[
                DetectionStage::Analyzing,
                DetectionStage::Detecting,
                DetectionStage::Mapping,
                DetectionStage::Calibrating,
                DetectionStage::Complete,
            ]
        );
    }

    #[test]
    fn raw_confidence_subtracts_penalties() {
        let dark = analyze_quality(&RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 255])));
        assert!((raw_confidence(&dark) - 0.30).abs() < 1e-5);
        let good = analyze_quality(checkerboard(640, 480).raster());
        assert!((raw_confidence(&good) - BASE_CONFIDENCE).abs() < 1e-6);
    }

    #[test]
    fn disabled_auto_retry_fails_after_one_attempt() {
        let mut synth = FaceZoneSynthesizer::new(DetectionParams {
            auto_retry: false,
            ..fast_params()
        });
        let frame = Frame::new(RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 255])));
        match synth.detect(&frame) {
            Err(DetectionError::Failed { failure, hints }) => {
                assert!(matches!(failure, AttemptFailure::LowConfidence { .. }));
                assert!(!hints.is_empty());
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(synth.retry_count(), 0);
        assert_eq!(synth.stage(), Some(DetectionStage::Error));
    }

    #[test]
    fn face_size_bounds_are_enforced() {
        let mut synth = FaceZoneSynthesizer::new(DetectionParams {
            min_face_size: 0.7,
            max_face_size: 0.9,
            max_retries: 1,
            ..fast_params()
        });
        match synth.detect(&checkerboard(640, 480)) {
            Err(DetectionError::MaxRetries { last_failure, .. }) => {
                assert!(matches!(last_failure, AttemptFailure::FaceSizeOutOfRange { .. }));
            }
            other => panic!("expected size failure, got {other:?}"),
        }
    }

    #[test]
    fn empty_frame_is_reported() {
        let mut synth = FaceZoneSynthesizer::new(DetectionParams {
            auto_retry: false,
            ..fast_params()
        });
        let err = synth.detect(&Frame::new(RgbaImage::new(0, 0))).unwrap_err();
        assert!(matches!(
            err,
            DetectionError::Failed {
                failure: AttemptFailure::EmptyFrame,
                ..
            }
        ));
    }
}
