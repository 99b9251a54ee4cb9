mod args;
mod config;
mod gpu;
mod report;

use std::{fs, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tryon_core::{
    BrushStroke, ConfigStore, DetectionParams, EngineError, FaceZoneSynthesizer,
    FilterPresetResolver, JsonFileConfigStore, MemoryConfigStore, Product, ProductConfigs,
    ProductFilterConfig, ResolveOptions, TryOnEngine, ViewStyle, ZoneWeights,
};
use tryon_utils::{
    config::AppSettings, configure_telemetry, init_logging, load_frame, save_jpeg,
};

use crate::{
    args::{MaskArg, RenderArgs},
    config::{
        apply_cli_overrides, display_path, load_settings, parse_stroke, user_tuning, view_mode,
    },
    gpu::{CliRenderer, select_renderer},
    report::{DetectionSummary, ErrorSummary, QualitySummary, RunReport},
};

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = RenderArgs::parse();

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);
    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    let strokes = args
        .strokes
        .iter()
        .map(|raw| parse_stroke(raw, args.brush))
        .collect::<Result<Vec<_>>>()?;
    if args.mask == MaskArg::Strokes && strokes.is_empty() {
        warn!("--mask strokes given without any --stroke; the mask stays empty");
    }

    let frame = load_frame(&args.input)
        .with_context(|| format!("failed to load input {}", args.input.display()))?;

    let product = Product::new(
        args.product.clone(),
        args.name.clone().unwrap_or_else(|| args.product.clone()),
        args.category.clone(),
    )
    .with_concerns(args.concerns.iter().cloned());
    let product_config = match &args.store {
        Some(path) => product_config(JsonFileConfigStore::open(path)?, &product)?,
        None => product_config(MemoryConfigStore::new(), &product)?,
    };

    let resolver = FilterPresetResolver::new(ResolveOptions::from(&settings.render));
    let parameters = resolver
        .resolve(&product_config)
        .with_tuning(&user_tuning(&args));
    info!(
        "Product '{}' uses the '{}' filter",
        product_config.product_id(),
        product_config.locked_filter_type()
    );

    let CliRenderer {
        renderer,
        status,
        setup_error,
    } = select_renderer(&settings);
    let mut engine = TryOnEngine::new(renderer, ViewStyle::from(&settings.render));
    engine.load_frame(frame);
    engine.set_parameters(parameters);

    let outcome = prepare_mask(
        &mut engine,
        args.mask,
        &strokes,
        &settings,
        &resolver,
        &product_config,
    );
    let mode = view_mode(args.view, &settings);
    let outcome = outcome.and_then(|()| {
        let image = engine.view(mode)?;
        if let Some(path) = &args.output {
            save_jpeg(path, &image, settings.export.jpeg_quality)
                .map_err(|err| EngineError::Export(format!("{err:#}")))?;
            info!("Saved {} view to {}", mode, path.display());
        }
        Ok(())
    });

    let report = RunReport {
        input: display_path(&args.input),
        product_id: product_config.product_id().to_string(),
        filter: product_config.locked_filter_type(),
        tone_extensions: settings.render.tone_extensions,
        backend: engine.backend(),
        gpu: status,
        parameters: engine.parameters(),
        quality: engine.quality().map(QualitySummary::from),
        detection: engine.last_detection().map(DetectionSummary::from),
        warnings: engine
            .published()
            .map(|output| output.warnings.clone())
            .unwrap_or_default(),
        view: mode.to_string(),
        output: match (&args.output, &outcome) {
            (Some(path), Ok(())) => Some(display_path(path)),
            _ => None,
        },
        passes: engine.last_trace().clone(),
        renderer_error: setup_error.as_ref().map(ErrorSummary::from),
        error: outcome.as_ref().err().map(ErrorSummary::from),
    };

    let json = serde_json::to_string_pretty(&report).context("failed to serialize run report")?;
    println!("{json}");
    if let Some(path) = &args.report {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, &json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
    }

    outcome.map_err(|err| {
        warn!("{}", err.user_message());
        anyhow::Error::new(err)
    })
}

fn product_config<S: ConfigStore>(store: S, product: &Product) -> Result<Arc<ProductFilterConfig>> {
    Ok(ProductConfigs::new(store).config_for(product)?)
}

fn prepare_mask(
    engine: &mut TryOnEngine,
    mask: MaskArg,
    strokes: &[BrushStroke],
    settings: &AppSettings,
    resolver: &FilterPresetResolver,
    product_config: &ProductFilterConfig,
) -> Result<(), EngineError> {
    match mask {
        MaskArg::None => {}
        MaskArg::Full => engine.fill_mask(255)?,
        MaskArg::Strokes => {
            for stroke in strokes {
                engine.paint(stroke)?;
            }
        }
        MaskArg::Auto => {
            let mut synthesizer =
                FaceZoneSynthesizer::new(DetectionParams::from(&settings.detection));
            let weights = ZoneWeights::for_preset(resolver.preset_for(product_config));
            let result = engine.synthesize_mask(&mut synthesizer, &weights)?;
            info!(
                "Synthesized {} zones (confidence {:.2}, {} retries)",
                result.zones.len(),
                result.confidence,
                result.retry_count
            );
        }
    }
    Ok(())
}
