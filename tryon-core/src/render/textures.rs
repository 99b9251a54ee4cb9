//! GPU texture set for one frame size.
//!
//! `allocate` always replaces all five textures together. wgpu zero-fills
//! new textures, so nothing from a differently sized frame survives.

use std::sync::Arc;

use log::{debug, info};
use pollster::block_on;
use tryon_utils::GpuContext;

use super::AllocationError;
use super::resources::{ResourceState, ResourceTracker, TextureExtent, TextureHandle, TextureSlot};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Textures of one allocation generation.
#[derive(Debug)]
pub struct TextureSet {
    pub original: GpuTexture,
    pub ping: GpuTexture,
    pub pong: GpuTexture,
    pub mask: GpuTexture,
    pub output: GpuTexture,
}

impl TextureSet {
    pub fn get(&self, slot: TextureSlot) -> &GpuTexture {
        match slot {
            TextureSlot::Original => &self.original,
            TextureSlot::Ping => &self.ping,
            TextureSlot::Pong => &self.pong,
            TextureSlot::Mask => &self.mask,
            TextureSlot::Output => &self.output,
        }
    }
}

fn slot_spec(slot: TextureSlot) -> (&'static str, wgpu::TextureFormat, wgpu::TextureUsages) {
    use wgpu::TextureUsages as U;
    match slot {
        TextureSlot::Original => (
            "tryon_original",
            COLOR_FORMAT,
            U::TEXTURE_BINDING | U::COPY_DST,
        ),
        TextureSlot::Ping => (
            "tryon_blur_ping",
            COLOR_FORMAT,
            U::RENDER_ATTACHMENT | U::TEXTURE_BINDING,
        ),
        TextureSlot::Pong => (
            "tryon_blur_pong",
            COLOR_FORMAT,
            U::RENDER_ATTACHMENT | U::TEXTURE_BINDING,
        ),
        TextureSlot::Mask => ("tryon_mask", MASK_FORMAT, U::TEXTURE_BINDING | U::COPY_DST),
        TextureSlot::Output => (
            "tryon_output",
            COLOR_FORMAT,
            U::RENDER_ATTACHMENT | U::COPY_SRC,
        ),
    }
}

#[derive(Debug)]
pub struct TextureResourceManager {
    context: Arc<GpuContext>,
    sampler: wgpu::Sampler,
    tracker: ResourceTracker,
    set: Option<TextureSet>,
}

impl TextureResourceManager {
    pub fn new(context: Arc<GpuContext>) -> Self {
        let sampler = context.device().create_sampler(&wgpu::SamplerDescriptor {
            label: Some("tryon_linear_clamp"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self {
            context,
            sampler,
            tracker: ResourceTracker::default(),
            set: None,
        }
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn state(&self) -> ResourceState {
        self.tracker.state()
    }

    pub fn textures(&self) -> Option<&TextureSet> {
        self.set.as_ref()
    }

    /// Resolve a handle, refusing ones from an older generation.
    pub fn resolve(&self, handle: &TextureHandle) -> Result<&GpuTexture, super::RenderError> {
        self.tracker.state().validate(handle)?;
        self.set
            .as_ref()
            .map(|set| set.get(handle.slot))
            .ok_or(super::RenderError::NotPrepared)
    }

    /// Make sure a set of `extent` exists. Returns `true` when a new
    /// generation was allocated.
    pub fn ensure(&mut self, extent: TextureExtent) -> Result<bool, AllocationError> {
        if self.set.is_some() && !self.tracker.needs_allocation(extent) {
            return Ok(false);
        }
        self.allocate(extent)?;
        Ok(true)
    }

    /// Allocate a fresh set of `extent`, dropping the previous one.
    pub fn allocate(&mut self, extent: TextureExtent) -> Result<u64, AllocationError> {
        let extent = extent.validate(self.context.max_texture_dimension())?;
        let device = self.context.device();

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let make = |slot| self.create(slot, extent);
        let set = TextureSet {
            original: make(TextureSlot::Original),
            ping: make(TextureSlot::Ping),
            pong: make(TextureSlot::Pong),
            mask: make(TextureSlot::Mask),
            output: make(TextureSlot::Output),
        };
        let validation = block_on(device.pop_error_scope());
        let oom = block_on(device.pop_error_scope());
        if let Some(err) = oom.or(validation) {
            // Keep the previous set; the tracker is only advanced on success.
            return Err(AllocationError::Device(err.to_string()));
        }

        self.set = Some(set);
        let generation = self.tracker.record_allocation(extent);
        info!(
            target: "tryon::render",
            "allocated {}x{} texture set (generation {generation})",
            extent.width,
            extent.height
        );
        Ok(generation)
    }

    fn create(&self, slot: TextureSlot, extent: TextureExtent) -> GpuTexture {
        let (label, format, usage) = slot_spec(slot);
        let texture = self.context.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        debug!(target: "tryon::render", "created {label} ({format:?})");
        GpuTexture { texture, view }
    }
}
