//! Renderer selection with CPU fallback.

use log::{info, warn};
use tryon_core::{CpuRenderer, EffectRenderer, EngineError, RenderError, WgpuRenderer};
use tryon_utils::{
    GpuAvailability, GpuContext, GpuContextOptions, GpuInitError,
    config::AppSettings,
    gpu::{GpuStatusIndicator, GpuStatusMode},
};

pub struct CliRenderer {
    pub renderer: Box<dyn EffectRenderer>,
    pub status: GpuStatusIndicator,
    /// Why the wgpu renderer could not be built, when it was attempted.
    pub setup_error: Option<EngineError>,
}

/// Pick the wgpu renderer when a device is available, otherwise the CPU one.
pub fn select_renderer(settings: &AppSettings) -> CliRenderer {
    let availability = if settings.gpu.enabled {
        GpuContext::init_with_fallback(&GpuContextOptions::from(&settings.gpu))
    } else {
        GpuAvailability::Disabled {
            reason: "disabled via settings or --no-gpu".to_string(),
        }
    };

    let (renderer, status, setup_error): (Box<dyn EffectRenderer>, _, _) = match &availability {
        GpuAvailability::Available(context) => match WgpuRenderer::new(context.clone()) {
            Ok(renderer) => (
                Box::new(renderer),
                GpuStatusIndicator::from_availability(&availability),
                None,
            ),
            Err(err) => {
                let (status, err) = renderer_fallback(err);
                (Box::new(CpuRenderer::new()), status, Some(err))
            }
        },
        _ => (
            Box::new(CpuRenderer::new()),
            GpuStatusIndicator::from_availability(&availability),
            None,
        ),
    };

    log_gpu_status(&status);
    status.emit_telemetry();
    CliRenderer {
        renderer,
        status,
        setup_error,
    }
}

/// Fallback status for a wgpu renderer that failed to build. Shader compile
/// and allocation failures keep their own error category.
fn renderer_fallback(err: RenderError) -> (GpuStatusIndicator, EngineError) {
    let err = EngineError::from(err);
    warn!(
        "GPU renderer setup failed ({}): {err}; falling back to CPU renderer.",
        err.category()
    );
    let fallback = GpuAvailability::Unavailable {
        error: GpuInitError::Renderer(err.to_string()),
    };
    (GpuStatusIndicator::from_availability(&fallback), err)
}

fn log_gpu_status(status: &GpuStatusIndicator) {
    match status.mode {
        GpuStatusMode::Available => info!(
            "GPU rendering enabled on {} ({})",
            status.adapter_name.as_deref().unwrap_or("unknown adapter"),
            status.backend.as_deref().unwrap_or("unknown backend")
        ),
        GpuStatusMode::Disabled => info!(
            "GPU rendering disabled: {}",
            status.detail.as_deref().unwrap_or("no reason given")
        ),
        GpuStatusMode::Fallback => warn!(
            "GPU unavailable, using CPU renderer: {}",
            status.detail.as_deref().unwrap_or("unknown error")
        ),
    }
}
