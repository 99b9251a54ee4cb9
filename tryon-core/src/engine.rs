//! Session orchestrator: one frame, one mask, one renderer.
//!
//! Parameter changes are stamped with a generation. Renders carry the frame
//! epoch, mask generation and parameter generation they were started with,
//! and [`TryOnEngine::publish`] refuses any output built from older inputs
//! than the one already on display, or from a frame that has since been
//! replaced. Only the latest slider value, stroke and frame ever reach the
//! screen.

use image::{GrayImage, RgbaImage};
use log::{Level, debug, info};
use serde::Serialize;
use tryon_utils::{Frame, QualityMetrics, analyze_quality, encode_jpeg, timing_guard};

use crate::detection::{DetectionResult, FaceZoneSynthesizer};
use crate::error::{EngineError, QualityWarning};
use crate::mask::{BrushStroke, MaskBuffer, MaskGenerator, MaskMode, ZoneWeights};
use crate::params::{RenderParameters, UserTuning};
use crate::render::{CpuRenderer, EffectRenderer, PassTrace, RenderBackend};
use crate::view::{ViewMode, ViewStyle, compose_view};

/// Parameters captured at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterSnapshot {
    pub generation: u64,
    pub parameters: RenderParameters,
}

/// A finished render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutput {
    #[serde(skip)]
    pub image: RgbaImage,
    /// Parameter generation this frame was rendered with.
    pub generation: u64,
    pub parameters: RenderParameters,
    pub backend: RenderBackend,
    pub warnings: Vec<QualityWarning>,
    /// Inputs captured when the render started.
    #[serde(skip)]
    inputs: InputStamp,
}

impl RenderOutput {
    pub fn inputs(&self) -> InputStamp {
        self.inputs
    }
}

/// Identity of the inputs behind a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputStamp {
    pub frame: u64,
    pub parameters: u64,
    pub mask: u64,
}

impl InputStamp {
    /// True when any input of `self` is newer than the same input of `other`.
    fn has_newer_input_than(&self, other: &InputStamp) -> bool {
        self.frame > other.frame || self.parameters > other.parameters || self.mask > other.mask
    }
}

#[derive(Debug)]
pub struct TryOnEngine {
    renderer: Box<dyn EffectRenderer>,
    style: ViewStyle,
    frame: Option<Frame>,
    frame_epoch: u64,
    quality: Option<QualityMetrics>,
    frame_uploaded: bool,
    mask: MaskBuffer,
    /// (resource generation, mask generation) of the last mask upload.
    mask_uploaded: Option<(u64, u64)>,
    parameters: RenderParameters,
    parameter_generation: u64,
    published: Option<RenderOutput>,
    last_detection: Option<DetectionResult>,
}

impl TryOnEngine {
    pub fn new(renderer: Box<dyn EffectRenderer>, style: ViewStyle) -> Self {
        Self {
            renderer,
            style,
            frame: None,
            frame_epoch: 0,
            quality: None,
            frame_uploaded: false,
            mask: MaskBuffer::new(0, 0),
            mask_uploaded: None,
            parameters: RenderParameters::NEUTRAL,
            parameter_generation: 0,
            published: None,
            last_detection: None,
        }
    }

    /// Engine backed by the CPU reference renderer.
    pub fn with_cpu(style: ViewStyle) -> Self {
        Self::new(Box::new(CpuRenderer::new()), style)
    }

    pub fn backend(&self) -> RenderBackend {
        self.renderer.backend()
    }

    pub fn renderer(&self) -> &dyn EffectRenderer {
        self.renderer.as_ref()
    }

    pub fn last_trace(&self) -> &PassTrace {
        self.renderer.last_trace()
    }

    pub fn style(&self) -> &ViewStyle {
        &self.style
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn quality(&self) -> Option<&QualityMetrics> {
        self.quality.as_ref()
    }

    /// Replace the current frame. A size change clears the mask; the cached
    /// detection always goes.
    pub fn load_frame(&mut self, frame: Frame) {
        let (width, height) = frame.dimensions();
        self.mask.resize(width, height);
        self.quality = Some(analyze_quality(frame.raster()));
        self.frame = Some(frame);
        self.frame_epoch += 1;
        self.frame_uploaded = false;
        self.last_detection = None;
        info!(target: "tryon::render", "loaded {width}x{height} frame");
    }

    pub fn parameters(&self) -> RenderParameters {
        self.parameters
    }

    pub fn parameter_generation(&self) -> u64 {
        self.parameter_generation
    }

    /// Set parameters; out-of-range values are clamped.
    pub fn set_parameters(&mut self, parameters: RenderParameters) -> u64 {
        self.parameters = parameters.clamped();
        self.parameter_generation += 1;
        self.parameter_generation
    }

    /// Apply end-user tuning on top of the current parameters.
    pub fn tune(&mut self, tuning: &UserTuning) -> u64 {
        self.set_parameters(self.parameters.with_tuning(tuning))
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            generation: self.parameter_generation,
            parameters: self.parameters,
        }
    }

    pub fn mask(&self) -> &GrayImage {
        self.mask.image()
    }

    pub fn mask_generation(&self) -> u64 {
        self.mask.generation()
    }

    pub fn mask_mode(&self) -> MaskMode {
        self.mask.mode()
    }

    pub fn paint(&mut self, stroke: &BrushStroke) -> Result<(), EngineError> {
        self.require_frame()?;
        self.mask.apply(stroke);
        Ok(())
    }

    pub fn reset_mask(&mut self) {
        self.mask.reset();
    }

    /// Manual mask with every pixel at `value`.
    pub fn fill_mask(&mut self, value: u8) -> Result<(), EngineError> {
        self.require_frame()?;
        self.mask.fill(value);
        Ok(())
    }

    /// Run detection on the current frame and replace the mask with the
    /// synthesized zones. On failure the mask is left as it was.
    pub fn synthesize_mask(
        &mut self,
        synthesizer: &mut FaceZoneSynthesizer,
        weights: &ZoneWeights,
    ) -> Result<&DetectionResult, EngineError> {
        let frame = self.frame.as_ref().ok_or(EngineError::NoFrame)?;
        let (width, height) = frame.dimensions();
        let result = synthesizer.detect(frame)?;
        let mask = MaskGenerator.synthesize(width, height, &result, weights);
        self.mask.replace(mask)?;
        debug!(
            target: "tryon::detect",
            "synthesized mask from {} zones (confidence {:.2})",
            result.zones.len(),
            result.confidence
        );
        Ok(self.last_detection.insert(result))
    }

    pub fn last_detection(&self) -> Option<&DetectionResult> {
        self.last_detection.as_ref()
    }

    fn require_frame(&self) -> Result<&Frame, EngineError> {
        self.frame.as_ref().ok_or(EngineError::NoFrame)
    }

    fn stamp(&self, parameters: u64) -> InputStamp {
        InputStamp {
            frame: self.frame_epoch,
            parameters,
            mask: self.mask.generation(),
        }
    }

    /// Bring the renderer's textures in line with the current frame and mask.
    fn sync_renderer(&mut self) -> Result<(), EngineError> {
        let frame = self.frame.as_ref().ok_or(EngineError::NoFrame)?;
        if !self.frame_uploaded {
            self.renderer.prepare(frame)?;
            self.frame_uploaded = true;
        }
        let resources = self.renderer.resources().generation;
        let wanted = (resources, self.mask.generation());
        if self.mask_uploaded != Some(wanted) {
            self.renderer.upload_mask(self.mask.image())?;
            self.mask_uploaded = Some(wanted);
        }
        Ok(())
    }

    /// Render with `snapshot` without publishing the result.
    pub fn render_snapshot(
        &mut self,
        snapshot: ParameterSnapshot,
    ) -> Result<RenderOutput, EngineError> {
        let _guard = timing_guard("tryon_core::engine_render", Level::Debug);
        let inputs = self.stamp(snapshot.generation);
        self.sync_renderer()?;
        let image = self.renderer.render(&snapshot.parameters)?;
        let warnings = self
            .quality
            .as_ref()
            .and_then(QualityWarning::from_metrics)
            .into_iter()
            .collect();
        Ok(RenderOutput {
            image,
            generation: snapshot.generation,
            parameters: snapshot.parameters,
            backend: self.renderer.backend(),
            warnings,
            inputs,
        })
    }

    /// Make `output` the displayed frame unless it was rendered from a frame
    /// that has since been replaced, or the output already shown was built
    /// from newer inputs.
    pub fn publish(&mut self, output: RenderOutput) -> bool {
        if output.inputs.frame < self.frame_epoch {
            debug!(
                target: "tryon::render",
                "dropping render of replaced frame (epoch {} < {})",
                output.inputs.frame,
                self.frame_epoch
            );
            return false;
        }
        if let Some(current) = &self.published
            && current.inputs.has_newer_input_than(&output.inputs)
        {
            debug!(
                target: "tryon::render",
                "dropping stale render ({:?} behind {:?})",
                output.inputs,
                current.inputs
            );
            return false;
        }
        self.published = Some(output);
        true
    }

    /// The displayed output, if any.
    pub fn published(&self) -> Option<&RenderOutput> {
        self.published.as_ref()
    }

    /// Render the current parameters and publish the result.
    pub fn render(&mut self) -> Result<&RenderOutput, EngineError> {
        let output = self.render_snapshot(self.snapshot())?;
        self.publish(output);
        self.published().ok_or(EngineError::NoFrame)
    }

    fn is_current(&self) -> bool {
        self.published
            .as_ref()
            .is_some_and(|output| output.inputs == self.stamp(self.parameter_generation))
    }

    /// Compose `mode` from the current frame, re-rendering only when an
    /// input changed since the last published output.
    pub fn view(&mut self, mode: ViewMode) -> Result<RgbaImage, EngineError> {
        self.require_frame()?;
        if !self.is_current() {
            self.render()?;
        }
        let frame = self.require_frame()?;
        let after = self.published().ok_or(EngineError::NoFrame)?;
        Ok(compose_view(
            mode,
            frame.raster(),
            &after.image,
            self.mask.image(),
            &self.style,
        )?)
    }

    /// Encode `mode` as a lossy JPEG.
    pub fn export_jpeg(&mut self, mode: ViewMode, quality: u8) -> Result<Vec<u8>, EngineError> {
        let image = self.view(mode)?;
        encode_jpeg(&image, quality).map_err(|err| EngineError::Export(format!("{err:#}")))
    }
}
