//! Separable Gaussian blur as two fullscreen passes of one program.
//!
//! Pass 1 samples `original` along x into `ping`; pass 2 samples `ping`
//! along y into `pong`. The direction lives in a uniform, and each pass has
//! its own uniform slot so both can be recorded into one encoder.

use std::sync::Arc;

use bytemuck::bytes_of;
use tryon_utils::{gpu_uniforms, sampler_entry, texture_entry, uniform_buffer_entry};

use super::RenderError;
use super::kernel::BlurKernel;
use super::shader::{
    BLUR_WGSL, CompileError, FULLSCREEN_WGSL, Program, ProgramDescriptor, ShaderProgramManager,
};
use super::textures::{COLOR_FORMAT, TextureSet};

gpu_uniforms!(pub BlurUniforms, 2, {
    texel_size: [f32; 2],
    direction: [f32; 2],
    sigma: f32,
    radius: u32,
});

const HORIZONTAL: usize = 0;
const VERTICAL: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurDirection {
    Horizontal,
    Vertical,
}

impl BlurDirection {
    fn vector(self) -> [f32; 2] {
        match self {
            BlurDirection::Horizontal => [1.0, 0.0],
            BlurDirection::Vertical => [0.0, 1.0],
        }
    }

    fn slot(self) -> usize {
        match self {
            BlurDirection::Horizontal => HORIZONTAL,
            BlurDirection::Vertical => VERTICAL,
        }
    }
}

impl BlurUniforms {
    pub fn new(kernel: &BlurKernel, direction: BlurDirection, width: u32, height: u32) -> Self {
        Self {
            texel_size: [1.0 / width as f32, 1.0 / height as f32],
            direction: direction.vector(),
            sigma: kernel.sigma(),
            radius: kernel.radius(),
            __padding: [0; 2],
        }
    }
}

#[derive(Debug)]
pub struct BlurPass {
    program: Arc<Program>,
}

impl BlurPass {
    pub const KEY: &'static str = "tryon_blur";

    pub fn new(shaders: &mut ShaderProgramManager) -> Result<Self, CompileError> {
        let layout = [texture_entry!(0), sampler_entry!(1), uniform_buffer_entry!(2)];
        let program = shaders.get_or_compile(&ProgramDescriptor {
            key: Self::KEY,
            vertex_source: FULLSCREEN_WGSL,
            fragment_source: BLUR_WGSL,
            layout: &layout,
            target_format: COLOR_FORMAT,
            uniform_size: std::mem::size_of::<BlurUniforms>() as u64,
            uniform_slots: 2,
        })?;
        let program = program.ensure_uniform_slots(2)?;
        Ok(Self { program })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Record horizontal then vertical passes. `pong` holds the result.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        textures: &TextureSet,
        sampler: &wgpu::Sampler,
        kernel: &BlurKernel,
        (width, height): (u32, u32),
    ) -> Result<(), RenderError> {
        self.encode_pass(
            device,
            queue,
            encoder,
            &textures.original.view,
            &textures.ping.view,
            sampler,
            BlurUniforms::new(kernel, BlurDirection::Horizontal, width, height),
            BlurDirection::Horizontal,
        )?;
        self.encode_pass(
            device,
            queue,
            encoder,
            &textures.ping.view,
            &textures.pong.view,
            sampler,
            BlurUniforms::new(kernel, BlurDirection::Vertical, width, height),
            BlurDirection::Vertical,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_pass(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        target: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        uniforms: BlurUniforms,
        direction: BlurDirection,
    ) -> Result<(), RenderError> {
        let uniform = self.program.require_uniform(direction.slot())?;
        queue.write_buffer(uniform, 0, bytes_of(&uniforms));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(match direction {
                BlurDirection::Horizontal => "tryon_blur_bg_horizontal",
                BlurDirection::Vertical => "tryon_blur_bg_vertical",
            }),
            layout: self.program.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform.as_entire_binding(),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tryon_blur_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(self.program.pipeline());
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}
