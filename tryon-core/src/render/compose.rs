//! Mask-weighted compose of original and blurred frames.

use std::sync::Arc;

use bytemuck::bytes_of;
use tryon_utils::{gpu_uniforms, sampler_entry, texture_entry, uniform_buffer_entry};

use super::RenderError;
use super::shader::{
    COMPOSE_WGSL, CompileError, FULLSCREEN_WGSL, Program, ProgramDescriptor, ShaderProgramManager,
};
use super::textures::{COLOR_FORMAT, TextureSet};
use crate::params::RenderParameters;

gpu_uniforms!(pub ComposeUniforms, 2, {
    intensity: f32,
    brightness: f32,
    contrast: f32,
    warmth_r: f32,
    warmth_b: f32,
    warmth_alpha: f32,
});

impl From<&RenderParameters> for ComposeUniforms {
    fn from(params: &RenderParameters) -> Self {
        Self {
            intensity: params.intensity,
            brightness: params.brightness,
            contrast: params.contrast,
            warmth_r: f32::from(params.warmth_r),
            warmth_b: f32::from(params.warmth_b),
            warmth_alpha: params.warmth_alpha,
            __padding: [0; 2],
        }
    }
}

/// Which texture stands in for the blurred layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurredSource {
    /// Output of the vertical blur pass.
    Pong,
    /// Blur bypassed; compose reads the original twice.
    Original,
}

#[derive(Debug)]
pub struct ComposePass {
    program: Arc<Program>,
}

impl ComposePass {
    pub const KEY: &'static str = "tryon_compose";

    pub fn new(shaders: &mut ShaderProgramManager) -> Result<Self, CompileError> {
        let layout = [
            texture_entry!(0),
            texture_entry!(1),
            texture_entry!(2),
            sampler_entry!(3),
            uniform_buffer_entry!(4),
        ];
        let program = shaders.get_or_compile(&ProgramDescriptor {
            key: Self::KEY,
            vertex_source: FULLSCREEN_WGSL,
            fragment_source: COMPOSE_WGSL,
            layout: &layout,
            target_format: COLOR_FORMAT,
            uniform_size: std::mem::size_of::<ComposeUniforms>() as u64,
            uniform_slots: 1,
        })?;
        let program = program.ensure_uniform_slots(1)?;
        Ok(Self { program })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        textures: &TextureSet,
        sampler: &wgpu::Sampler,
        blurred: BlurredSource,
        params: &RenderParameters,
    ) -> Result<(), RenderError> {
        let uniform = self.program.require_uniform(0)?;
        queue.write_buffer(uniform, 0, bytes_of(&ComposeUniforms::from(params)));

        let blurred_view = match blurred {
            BlurredSource::Pong => &textures.pong.view,
            BlurredSource::Original => &textures.original.view,
        };
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tryon_compose_bg"),
            layout: self.program.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&textures.original.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(blurred_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&textures.mask.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: uniform.as_entire_binding(),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tryon_compose_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &textures.output.view,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_take_resolved_parameters() {
        let params = RenderParameters {
            intensity: 0.5,
            sigma: 4.0,
            brightness: 0.1,
            contrast: 1.05,
            warmth_r: 6,
            warmth_b: 3,
            warmth_alpha: 0.35,
        };
        let uniforms = ComposeUniforms::from(&params);
        assert_eq!(std::mem::size_of::<ComposeUniforms>(), 32);
        assert_eq!(uniforms.warmth_r, 6.0);
        assert_eq!(uniforms.warmth_b, 3.0);
        assert_eq!(uniforms.contrast, 1.05);
    }
}
