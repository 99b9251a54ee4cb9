//! wgpu renderer: blur-H → blur-V → compose in one command buffer.

use std::sync::Arc;

use image::{GrayImage, RgbaImage};
use log::{Level, debug, trace};
use tryon_utils::gpu::{read_texture_rgba8, write_texture};
use tryon_utils::{Frame, GpuContext, timing_guard};

use super::blur::BlurPass;
use super::compose::{BlurredSource, ComposePass};
use super::kernel::BlurKernel;
use super::resources::{ResourceState, TextureExtent};
use super::shader::ShaderProgramManager;
use super::textures::TextureResourceManager;
use super::{EffectRenderer, PassKind, PassTrace, RenderBackend, RenderError};
use crate::params::RenderParameters;

#[derive(Debug)]
pub struct WgpuRenderer {
    context: Arc<GpuContext>,
    shaders: ShaderProgramManager,
    textures: TextureResourceManager,
    blur: BlurPass,
    compose: ComposePass,
    pending: PassTrace,
    trace: PassTrace,
}

impl WgpuRenderer {
    /// Compile both programs up front. A compile failure here means the
    /// renderer cannot be used at all.
    pub fn new(context: Arc<GpuContext>) -> Result<Self, RenderError> {
        let mut shaders = ShaderProgramManager::new(Arc::clone(&context));
        let blur = BlurPass::new(&mut shaders)?;
        let compose = ComposePass::new(&mut shaders)?;
        debug!(
            target: "tryon::gpu",
            "wgpu renderer ready on {} ({} programs)",
            context.adapter_info().name,
            shaders.len()
        );
        Ok(Self {
            textures: TextureResourceManager::new(Arc::clone(&context)),
            context,
            shaders,
            blur,
            compose,
            pending: PassTrace::default(),
            trace: PassTrace::default(),
        })
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    pub fn shaders(&self) -> &ShaderProgramManager {
        &self.shaders
    }

    fn extent(&self) -> Result<TextureExtent, RenderError> {
        self.textures.state().extent.ok_or(RenderError::NotPrepared)
    }
}

impl EffectRenderer for WgpuRenderer {
    fn backend(&self) -> RenderBackend {
        RenderBackend::Gpu
    }

    fn prepare(&mut self, frame: &Frame) -> Result<(), RenderError> {
        let extent = TextureExtent::from(frame.dimensions());
        if self.textures.ensure(extent)? {
            self.pending.push(PassKind::Allocate);
        }
        let set = self.textures.textures().ok_or(RenderError::NotPrepared)?;
        write_texture(
            self.context.queue(),
            &set.original.texture,
            frame.raster().as_raw(),
            extent.width,
            extent.height,
            4,
        );
        self.pending.push(PassKind::UploadOriginal);
        Ok(())
    }

    fn upload_mask(&mut self, mask: &GrayImage) -> Result<(), RenderError> {
        let extent = self.extent()?;
        if mask.dimensions() != extent.as_tuple() {
            return Err(RenderError::MaskMismatch {
                mask: mask.dimensions(),
                textures: extent.as_tuple(),
            });
        }
        let set = self.textures.textures().ok_or(RenderError::NotPrepared)?;
        write_texture(
            self.context.queue(),
            &set.mask.texture,
            mask.as_raw(),
            extent.width,
            extent.height,
            1,
        );
        self.pending.push(PassKind::UploadMask);
        Ok(())
    }

    fn render(&mut self, params: &RenderParameters) -> Result<RgbaImage, RenderError> {
        let _guard = timing_guard("tryon_core::gpu_render", Level::Debug);
        let params = params.clamped();
        let extent = self.extent()?;
        let set = self.textures.textures().ok_or(RenderError::NotPrepared)?;
        let device = self.context.device();
        let queue = self.context.queue();
        let mut passes = self.pending.take();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tryon_render_encoder"),
        });
        let blurred = match BlurKernel::new(params.sigma) {
            Some(kernel) => {
                self.blur.encode(
                    device,
                    queue,
                    &mut encoder,
                    set,
                    self.textures.sampler(),
                    &kernel,
                    extent.as_tuple(),
                )?;
                passes.push(PassKind::BlurHorizontal);
                passes.push(PassKind::BlurVertical);
                BlurredSource::Pong
            }
            None => {
                trace!(target: "tryon::render", "sigma {} bypasses blur", params.sigma);
                BlurredSource::Original
            }
        };
        self.compose.encode(
            device,
            queue,
            &mut encoder,
            set,
            self.textures.sampler(),
            blurred,
            &params,
        )?;
        passes.push(PassKind::Compose);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        queue.submit(std::iter::once(encoder.finish()));
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::Device {
                operation: "render submission",
                message: err.to_string(),
            });
        }

        let image = read_texture_rgba8(
            &self.context,
            &set.output.texture,
            extent.width,
            extent.height,
        )
        .map_err(|err| RenderError::Device {
            operation: "readback",
            message: format!("{err:#}"),
        })?;
        passes.push(PassKind::Readback);
        self.trace = passes;
        Ok(image)
    }

    fn resources(&self) -> ResourceState {
        self.textures.state()
    }

    fn last_trace(&self) -> &PassTrace {
        &self.trace
    }
}
