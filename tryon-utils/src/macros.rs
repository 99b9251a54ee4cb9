//! Macros for reducing wgpu boilerplate in the render passes.
//!
//! The passes are fullscreen fragment programs, so every bind group layout is
//! built from the same three entry kinds: sampled 2D textures, one filtering
//! sampler and one uniform block.

/// Creates a fragment-visible, filterable 2D float texture layout entry.
///
/// # Example
///
/// ```ignore
/// let entry = texture_entry!(0);
/// ```
#[macro_export]
macro_rules! texture_entry {
    ($binding:expr) => {
        wgpu::BindGroupLayoutEntry {
            binding: $binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }
    };
}

/// Creates a fragment-visible filtering sampler layout entry.
#[macro_export]
macro_rules! sampler_entry {
    ($binding:expr) => {
        wgpu::BindGroupLayoutEntry {
            binding: $binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        }
    };
}

/// Creates a uniform buffer layout entry visible to the fragment stage.
///
/// # Example
///
/// ```ignore
/// let entry = uniform_buffer_entry!(2);
/// ```
#[macro_export]
macro_rules! uniform_buffer_entry {
    ($binding:expr) => {
        wgpu::BindGroupLayoutEntry {
            binding: $binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    };
}

/// Maps a `MAP_READ` buffer, waits for the device and copies the bytes out.
///
/// Evaluates to `anyhow::Result<Vec<u8>>` and checks the byte count against
/// `$expected_len`.
///
/// # Example
///
/// ```ignore
/// let bytes = gpu_readback!(staging, device, expected_len, "compose output")?;
/// ```
#[macro_export]
macro_rules! gpu_readback {
    ($readback:expr, $device:expr, $expected_len:expr, $operation:literal) => {{
        use std::sync::mpsc;

        let slice = $readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = sender.send(res);
        });

        $device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|err| anyhow::anyhow!("device poll failed during {}: {err}", $operation))?;

        receiver
            .recv()
            .map_err(|_| anyhow::anyhow!("GPU {} map callback dropped", $operation))?
            .map_err(|err| anyhow::anyhow!("GPU {} map error: {err}", $operation))?;

        let mapped = slice.get_mapped_range();
        let bytes: Vec<u8> = mapped.to_vec();
        drop(mapped);
        $readback.unmap();

        anyhow::ensure!(
            bytes.len() == $expected_len,
            "unexpected GPU {} output size (expected {}, got {})",
            $operation,
            $expected_len,
            bytes.len()
        );

        Ok::<Vec<u8>, anyhow::Error>(bytes)
    }};
}

/// Defines a `#[repr(C)]` uniform block with explicit trailing padding.
///
/// WGSL uniform structs round up to 16 bytes, so pad with
/// `(16 - (field_bytes % 16)) / 4` `u32`s. `vec2<f32>` fields are 8-byte
/// aligned and must start on an even 4-byte slot.
///
/// # Example
///
/// ```ignore
/// gpu_uniforms!(pub BlurUniforms, 2, {
///     texel_size: [f32; 2],
///     direction: [f32; 2],
///     sigma: f32,
///     radius: u32,
/// });
/// ```
#[macro_export]
macro_rules! gpu_uniforms {
    ($vis:vis $name:ident, $padding:expr, { $($field:ident: $ty:ty),+ $(,)? }) => {
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
        $vis struct $name {
            $(pub $field: $ty,)+
            pub __padding: [u32; $padding],
        }
    };
}
