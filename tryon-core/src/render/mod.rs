//! Two-pass separable blur plus masked compose, on the CPU or through wgpu.
//!
//! A render cycle is `prepare(frame)` → `upload_mask(mask)` →
//! `render(params)`. `prepare` (re)allocates the texture set when the frame
//! size changes and uploads the original pixels; `render` runs
//! horizontal blur → vertical blur → compose and reads the result back.
//! A sigma at or below [`kernel::SIGMA_EPSILON`] skips both blur passes and
//! compose samples the original directly.

pub mod blur;
pub mod compose;
pub mod cpu;
pub mod gpu;
pub mod kernel;
pub mod resources;
pub mod shader;
pub mod textures;

use std::fmt;

use image::{GrayImage, RgbaImage};
use serde::Serialize;
use thiserror::Error;
use tryon_utils::Frame;

use crate::params::RenderParameters;

pub use cpu::CpuRenderer;
pub use gpu::WgpuRenderer;
pub use kernel::BlurKernel;
pub use resources::{ResourceState, TextureExtent, TextureHandle, TextureSlot};
pub use shader::{CompileError, ShaderProgramManager, ShaderStage};

/// Which implementation produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderBackend {
    Cpu,
    Gpu,
}

impl fmt::Display for RenderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RenderBackend::Cpu => "cpu",
            RenderBackend::Gpu => "gpu",
        })
    }
}

/// A unit of work recorded in the pass trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Allocate,
    UploadOriginal,
    UploadMask,
    BlurHorizontal,
    BlurVertical,
    Compose,
    Readback,
}

/// Ordered record of the passes issued since the previous render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassTrace(Vec<PassKind>);

impl PassTrace {
    pub fn passes(&self) -> &[PassKind] {
        &self.0
    }

    pub fn contains(&self, pass: PassKind) -> bool {
        self.0.contains(&pass)
    }

    pub fn position(&self, pass: PassKind) -> Option<usize> {
        self.0.iter().position(|p| *p == pass)
    }

    pub(crate) fn push(&mut self, pass: PassKind) {
        self.0.push(pass);
    }

    pub(crate) fn take(&mut self) -> PassTrace {
        std::mem::take(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("cannot allocate {width}x{height} textures: dimensions must be non-zero")]
    ZeroSize { width: u32, height: u32 },
    #[error("cannot allocate {width}x{height} textures: device limit is {max}px per side")]
    TooLarge { width: u32, height: u32, max: u32 },
    #[error("texture allocation failed: {0}")]
    Device(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("render called before any frame was prepared")]
    NotPrepared,
    #[error("texture handle {handle:?} is stale (current generation {current})")]
    StaleResources { handle: TextureHandle, current: u64 },
    #[error("mask is {mask:?} but textures are {textures:?}")]
    MaskMismatch { mask: (u32, u32), textures: (u32, u32) },
    #[error("program '{program}' has no uniform buffer in slot {slot}")]
    MissingUniform { program: &'static str, slot: usize },
    #[error("GPU error during {operation}: {message}")]
    Device {
        operation: &'static str,
        message: String,
    },
}

/// A renderer that owns its textures for the current frame size.
pub trait EffectRenderer: fmt::Debug {
    fn backend(&self) -> RenderBackend;

    /// Allocate (if the size changed) and upload the original pixels.
    fn prepare(&mut self, frame: &Frame) -> Result<(), RenderError>;

    /// Upload the effect mask. Must match the prepared frame size.
    fn upload_mask(&mut self, mask: &GrayImage) -> Result<(), RenderError>;

    /// Run the pass chain and read the composed frame back.
    fn render(&mut self, params: &RenderParameters) -> Result<RgbaImage, RenderError>;

    /// Extent and generation of the texture set.
    fn resources(&self) -> ResourceState;

    /// Handle to one texture of the current set.
    fn handle(&self, slot: TextureSlot) -> Option<TextureHandle> {
        self.resources().handle(slot)
    }

    /// Check that `handle` still refers to the live texture set.
    fn validate_handle(&self, handle: &TextureHandle) -> Result<(), RenderError> {
        self.resources().validate(handle)
    }

    /// Passes issued by the most recent [`EffectRenderer::render`], including
    /// any allocation and uploads that preceded it.
    fn last_trace(&self) -> &PassTrace;
}
