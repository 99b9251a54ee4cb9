//! GPU context management helpers built on top of `wgpu`.
//!
//! Device/queue setup lives here so the engine and the CLI share one
//! initialization path, while callers can still fall back to the CPU
//! renderer when no compatible adapter is present.

pub mod readback;

pub use readback::{padded_bytes_per_row, read_texture_rgba8, write_texture};

use std::sync::Arc;

use crate::telemetry::telemetry_allows;
use log::{Level, debug, info, log, warn};
use pollster::block_on;
use serde::Serialize;
use thiserror::Error;
use wgpu::{
    AdapterInfo, Backends, Device, DeviceDescriptor, ExperimentalFeatures, Features, Instance,
    InstanceDescriptor, InstanceFlags, Limits, PowerPreference, Queue, RequestAdapterError,
    RequestAdapterOptions, RequestDeviceError, Trace,
};

/// High-level configuration for creating a [`GpuContext`].
#[derive(Clone, Debug)]
pub struct GpuContextOptions {
    /// Whether GPU rendering is enabled at all.
    pub enabled: bool,
    /// Allow environment variables (e.g. `WGPU_BACKEND`) to override defaults.
    pub respect_env: bool,
    /// Which backends should be considered.
    pub backends: Backends,
    /// Instance flags (debug/validation toggles).
    pub flags: InstanceFlags,
    /// Adapter preference (high-performance vs low-power).
    pub power_preference: PowerPreference,
    /// Force wgpu to pick its fallback (software) adapter.
    pub force_fallback_adapter: bool,
    /// Optional debug label for the logical device.
    pub label: Option<String>,
}

impl Default for GpuContextOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            respect_env: true,
            backends: Backends::PRIMARY,
            flags: InstanceFlags::from_build_config(),
            power_preference: PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            label: Some("tryon_device".to_string()),
        }
    }
}

impl GpuContextOptions {
    /// Convenience helper for explicitly disabling GPU usage.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Result of attempting to initialize a GPU context while supporting CPU fallback.
#[derive(Debug)]
pub enum GpuAvailability {
    /// GPU resources are ready to use.
    Available(Arc<GpuContext>),
    /// GPU rendering was turned off by configuration (CLI flag, settings file).
    Disabled { reason: String },
    /// GPU initialization failed; callers should use the CPU renderer.
    Unavailable { error: GpuInitError },
}

impl GpuAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn context(&self) -> Option<&Arc<GpuContext>> {
        match self {
            Self::Available(ctx) => Some(ctx),
            _ => None,
        }
    }
}

/// GPU availability categories mirrored in CLI output and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuStatusMode {
    /// Render passes run on the GPU.
    Available,
    /// GPU explicitly disabled by configuration.
    Disabled,
    /// GPU initialization failed and rendering fell back to the CPU.
    Fallback,
}

impl GpuStatusMode {
    /// Returns a stable identifier for telemetry output.
    pub fn as_str(self) -> &'static str {
        match self {
            GpuStatusMode::Available => "available",
            GpuStatusMode::Disabled => "disabled",
            GpuStatusMode::Fallback => "fallback",
        }
    }
}

/// Serializable snapshot of GPU availability and adapter metadata.
#[derive(Debug, Clone, Serialize)]
pub struct GpuStatusIndicator {
    pub mode: GpuStatusMode,
    /// Short summary string.
    pub summary: String,
    /// Failure or disable reason, when there is one.
    pub detail: Option<String>,
    pub adapter_name: Option<String>,
    /// Backend label (Vulkan, Metal, Dx12, etc.).
    pub backend: Option<String>,
}

impl GpuStatusIndicator {
    /// Derive a status indicator from an initialization outcome.
    pub fn from_availability(availability: &GpuAvailability) -> Self {
        match availability {
            GpuAvailability::Available(ctx) => {
                let info = ctx.adapter_info();
                Self {
                    mode: GpuStatusMode::Available,
                    summary: format!("Using {}", info.name),
                    detail: None,
                    adapter_name: Some(info.name.clone()),
                    backend: Some(format!("{:?}", info.backend)),
                }
            }
            GpuAvailability::Disabled { reason } => Self {
                mode: GpuStatusMode::Disabled,
                summary: "GPU disabled".to_string(),
                detail: Some(reason.clone()),
                adapter_name: None,
                backend: None,
            },
            GpuAvailability::Unavailable { error } => Self {
                mode: GpuStatusMode::Fallback,
                summary: "GPU fallback to CPU renderer".to_string(),
                detail: Some(error.to_string()),
                adapter_name: None,
                backend: None,
            },
        }
    }

    /// Log this status as a JSON telemetry event when telemetry is enabled.
    pub fn emit_telemetry(&self) {
        if !telemetry_allows(Level::Info) {
            return;
        }

        #[derive(Serialize)]
        struct Payload<'a> {
            event: &'static str,
            #[serde(flatten)]
            status: &'a GpuStatusIndicator,
        }

        match serde_json::to_string(&Payload {
            event: "gpu_status",
            status: self,
        }) {
            Ok(json) => log!(target: "tryon::telemetry", Level::Info, "{json}"),
            Err(err) => warn!(
                target: "tryon::telemetry",
                "failed to serialize GPU telemetry payload: {err}"
            ),
        }
    }
}

/// Shared GPU device/queue wrapper with a little bit of metadata.
#[derive(Debug)]
pub struct GpuContext {
    device: Device,
    queue: Queue,
    info: AdapterInfo,
    limits: Limits,
}

impl GpuContext {
    /// Initialize a new GPU context with the provided options.
    pub fn initialize(options: &GpuContextOptions) -> Result<Self, GpuInitError> {
        if !options.enabled {
            return Err(GpuInitError::Disabled);
        }

        let mut instance_desc = if options.respect_env {
            InstanceDescriptor::from_env_or_default()
        } else {
            InstanceDescriptor::default()
        };
        let backends = if options.respect_env {
            options.backends.with_env()
        } else {
            options.backends
        };
        instance_desc.backends = backends;
        instance_desc.flags = if options.respect_env {
            options.flags.with_env()
        } else {
            options.flags
        };

        let instance = Instance::new(&instance_desc);
        let adapter = block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: options.power_preference,
            force_fallback_adapter: options.force_fallback_adapter,
            compatible_surface: None,
        }))
        .map_err(|source| GpuInitError::Adapter { backends, source })?;

        let info = adapter.get_info();
        // Render-to-texture with Rgba8Unorm/R8Unorm fits inside the downlevel defaults.
        let limits = Limits::downlevel_defaults().using_resolution(adapter.limits());
        debug!(
            target: "tryon::gpu",
            "Requesting device on '{}' with max 2D texture {}",
            info.name, limits.max_texture_dimension_2d
        );

        let (device, queue) = block_on(adapter.request_device(&DeviceDescriptor {
            label: options.label.as_deref(),
            required_features: Features::empty(),
            required_limits: limits.clone(),
            experimental_features: ExperimentalFeatures::default(),
            memory_hints: Default::default(),
            trace: Trace::default(),
        }))?;

        info!(
            target: "tryon::gpu",
            "Using GPU adapter '{}' ({:?}/{:?})",
            info.name, info.backend, info.device_type
        );

        Ok(Self {
            device,
            queue,
            info,
            limits,
        })
    }

    /// Attempt to create a GPU context and gracefully fall back to CPU if that fails.
    pub fn init_with_fallback(options: &GpuContextOptions) -> GpuAvailability {
        match Self::initialize(options) {
            Ok(ctx) => GpuAvailability::Available(Arc::new(ctx)),
            Err(GpuInitError::Disabled) => GpuAvailability::Disabled {
                reason: "GPU rendering disabled via configuration".to_string(),
            },
            Err(err) => {
                warn!(
                    target: "tryon::gpu",
                    "GPU initialization failed ({err}); falling back to CPU renderer."
                );
                GpuAvailability::Unavailable { error: err }
            }
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.info
    }

    /// Largest texture edge this device accepts.
    pub fn max_texture_dimension(&self) -> u32 {
        self.limits.max_texture_dimension_2d
    }
}

/// Tracks GPU initialization failures and reasons for CPU fallback.
#[derive(Debug, Error)]
pub enum GpuInitError {
    #[error("GPU adapter request failed for {backends:?}: {source}")]
    Adapter {
        backends: Backends,
        #[source]
        source: RequestAdapterError,
    },
    #[error("GPU device creation failed: {0}")]
    Device(#[from] RequestDeviceError),
    #[error("GPU acceleration disabled")]
    Disabled,
    /// The device came up but the render programs could not be built.
    #[error("GPU renderer setup failed: {0}")]
    Renderer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_options_skip_gpu_setup() {
        let options = GpuContextOptions::disabled();
        match GpuContext::init_with_fallback(&options) {
            GpuAvailability::Disabled { .. } => {}
            other => panic!("expected GPU to be disabled, got {other:?}"),
        }
    }

    #[test]
    fn status_from_disabled_availability() {
        let availability = GpuAvailability::Disabled {
            reason: "--no-gpu".into(),
        };
        let status = GpuStatusIndicator::from_availability(&availability);
        assert_eq!(status.mode, GpuStatusMode::Disabled);
        assert_eq!(status.detail.as_deref(), Some("--no-gpu"));
        assert_eq!(status.mode.as_str(), "disabled");
        assert!(!availability.is_available());
        assert!(availability.context().is_none());
    }
}
