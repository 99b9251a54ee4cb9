//! Face try-on compositing engine.
//!
//! A product resolves to [`RenderParameters`] through its locked filter
//! preset. A mask (painted or synthesized from face zones) limits where the
//! effect lands, and a renderer runs blur and compose passes on the CPU or
//! through wgpu. [`TryOnEngine`] ties these together for one session.

/// Face-zone synthesis with quality-gated retries.
pub mod detection;
/// Session orchestrator.
pub mod engine;
/// Engine error taxonomy.
pub mod error;
/// Painted and synthesized effect masks.
pub mod mask;
/// Resolved render parameters and their legal ranges.
pub mod params;
/// Static filter preset registry.
pub mod presets;
/// Products and their persisted filter configuration.
pub mod product;
/// Blur and compose passes (CPU reference and wgpu).
pub mod render;
/// Product config to render parameter resolution.
pub mod resolver;
/// Persistence contract for product configs.
pub mod store;
/// Before/after/split/mask views.
pub mod view;

pub use detection::{
    DetectionError, DetectionParams, DetectionResult, DetectionStage, FaceZone,
    FaceZoneSynthesizer, ZoneName,
};
pub use engine::{InputStamp, ParameterSnapshot, RenderOutput, TryOnEngine};
pub use error::{EngineError, QualityWarning};
pub use mask::{BrushStroke, MaskBuffer, MaskGenerator, MaskMode, MaskSource, ZoneWeights};
pub use params::{RenderParameters, UserTuning};
pub use presets::{FilterKey, FilterPreset, preset, preset_by_name, presets};
pub use product::{Product, ProductFilterConfig, RenderOverrides};
pub use render::{
    CpuRenderer, EffectRenderer, PassKind, PassTrace, RenderBackend, RenderError, WgpuRenderer,
};
pub use resolver::{FilterPresetResolver, ResolveOptions};
pub use store::{
    ConfigError, ConfigStore, JsonFileConfigStore, MemoryConfigStore, ProductConfigs,
};
pub use view::{SplitDrag, ViewMode, ViewStyle, compose_view};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
