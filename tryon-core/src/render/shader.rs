//! Shader program lifecycle: compile both stages, link a render pipeline,
//! cache the result by program key.
//!
//! Each stage is compiled inside its own validation error scope so a bad
//! source is reported against the stage that failed. Uniform buffers are
//! created once at link time and owned by the [`Program`]; passes write
//! into them by slot index instead of looking anything up per draw.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, error};
use pollster::block_on;
use serde::Serialize;
use thiserror::Error;
use tryon_utils::GpuContext;

use super::RenderError;

pub const FULLSCREEN_WGSL: &str = include_str!("shaders/fullscreen.wgsl");
pub const BLUR_WGSL: &str = include_str!("shaders/blur.wgsl");
pub const COMPOSE_WGSL: &str = include_str!("shaders/compose.wgsl");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    Vertex,
    Fragment,
    /// Pipeline creation after both stages compiled.
    Link,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Link => "link",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed: {log}")]
pub struct CompileError {
    pub stage: ShaderStage,
    pub log: String,
}

/// Everything needed to build one fullscreen render program.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDescriptor<'a> {
    /// Cache key; one program per key.
    pub key: &'static str,
    pub vertex_source: &'a str,
    pub fragment_source: &'a str,
    pub layout: &'a [wgpu::BindGroupLayoutEntry],
    pub target_format: wgpu::TextureFormat,
    /// Byte size of the uniform block, or 0 for none.
    pub uniform_size: u64,
    /// Number of independent uniform buffers to allocate at link time.
    pub uniform_slots: usize,
}

/// A linked, validated program.
#[derive(Debug)]
pub struct Program {
    id: u64,
    key: &'static str,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniforms: Vec<wgpu::Buffer>,
}

impl Program {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn uniform(&self, slot: usize) -> Option<&wgpu::Buffer> {
        self.uniforms.get(slot)
    }

    pub fn uniform_slots(&self) -> usize {
        self.uniforms.len()
    }

    /// Uniform buffer of `slot`, or [`RenderError::MissingUniform`].
    pub fn require_uniform(&self, slot: usize) -> Result<&wgpu::Buffer, RenderError> {
        self.uniform(slot).ok_or(RenderError::MissingUniform {
            program: self.key,
            slot,
        })
    }

    /// Fail at link time when a cached program carries fewer uniform
    /// buffers than a pass writes to.
    pub fn ensure_uniform_slots(
        self: Arc<Self>,
        wanted: usize,
    ) -> Result<Arc<Self>, CompileError> {
        if self.uniforms.len() < wanted {
            return Err(CompileError {
                stage: ShaderStage::Link,
                log: format!(
                    "program '{}' has {} uniform buffers, pass needs {wanted}",
                    self.key,
                    self.uniforms.len()
                ),
            });
        }
        Ok(self)
    }
}

/// Compiles and caches render programs for one device.
#[derive(Debug)]
pub struct ShaderProgramManager {
    context: Arc<GpuContext>,
    programs: HashMap<&'static str, Arc<Program>>,
    next_id: u64,
}

impl ShaderProgramManager {
    pub fn new(context: Arc<GpuContext>) -> Self {
        Self {
            context,
            programs: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    pub fn program(&self, key: &str) -> Option<Arc<Program>> {
        self.programs.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Return the cached program for `desc.key`, compiling it on first use.
    ///
    /// A failure leaves the cache untouched; any modules created before the
    /// failing stage are dropped with the error.
    pub fn get_or_compile(
        &mut self,
        desc: &ProgramDescriptor<'_>,
    ) -> Result<Arc<Program>, CompileError> {
        if let Some(program) = self.programs.get(desc.key) {
            return Ok(Arc::clone(program));
        }
        let program = Arc::new(self.compile(desc)?);
        self.programs.insert(desc.key, Arc::clone(&program));
        Ok(program)
    }

    /// Compile and link without touching the cache.
    pub fn compile(&mut self, desc: &ProgramDescriptor<'_>) -> Result<Program, CompileError> {
        let device = self.context.device();

        let vertex = self.compile_stage(desc.key, ShaderStage::Vertex, desc.vertex_source)?;
        let fragment = self.compile_stage(desc.key, ShaderStage::Fragment, desc.fragment_source)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(desc.key),
            entries: desc.layout,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.key),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.key),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some("main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some("main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });
        if let Some(err) = block_on(device.pop_error_scope()) {
            return Err(self.fail(desc.key, ShaderStage::Link, err));
        }

        let uniforms = if desc.uniform_size == 0 {
            Vec::new()
        } else {
            (0..desc.uniform_slots)
                .map(|slot| {
                    device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(&format!("{}_uniforms_{slot}", desc.key)),
                        size: desc.uniform_size,
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    })
                })
                .collect()
        };

        let id = self.next_id;
        self.next_id += 1;
        debug!(
            target: "tryon::gpu",
            "linked program '{}' (id {id}, {} uniform slot(s))",
            desc.key,
            uniforms.len()
        );
        Ok(Program {
            id,
            key: desc.key,
            pipeline,
            bind_group_layout,
            uniforms,
        })
    }

    fn compile_stage(
        &self,
        key: &str,
        stage: ShaderStage,
        source: &str,
    ) -> Result<wgpu::ShaderModule, CompileError> {
        let device = self.context.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{key}_{stage}")),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        match block_on(device.pop_error_scope()) {
            Some(err) => Err(self.fail(key, stage, err)),
            None => Ok(module),
        }
    }

    fn fail(&self, key: &str, stage: ShaderStage, err: wgpu::Error) -> CompileError {
        let log = err.to_string();
        error!(target: "tryon::gpu", "program '{key}' failed at {stage} stage: {log}");
        CompileError { stage, log }
    }
}
