use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use pdp_runner::pipeline::{self, Orchestrator, StageId, StageRegistry, Variant, VariantOutcome};
use pdp_runner::{PipelineConfig, PipelineContext};

/// Run the PDP variants over a tracked point-configuration dataset.
///
/// Settings come from `--config` (a flat JSON object), then the
/// `AV_DATASET` / `AV_RESULTS_DIR` environment variables, then the flags
/// below.
#[derive(Parser)]
#[command(name = "pdp-runner", version)]
struct Cli {
    /// Source dataset: headerless CSV with columns conID,tstID,poiID,x,y.
    dataset: Option<PathBuf>,

    /// Settings file (flat JSON object of toggles and parameters).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving derived datasets and stage output.
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Skip the fundamental variant.
    #[arg(long)]
    no_fundamental: bool,

    /// Run the buffer variant.
    #[arg(long)]
    buffer: bool,

    /// Run the rough variant.
    #[arg(long)]
    rough: bool,

    /// Run the buffer + rough variant.
    #[arg(long)]
    buffer_rough: bool,

    /// Buffer offset along x.
    #[arg(long)]
    buffer_x: Option<f64>,

    /// Buffer offset along y.
    #[arg(long)]
    buffer_y: Option<f64>,

    /// Enable an analysis stage by toggle name (repeatable), e.g. N_VA_HeatMap.
    #[arg(long = "stage", value_name = "TOGGLE")]
    stages: Vec<StageId>,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        config.apply_env();

        if let Some(dataset) = self.dataset {
            config.dataset_name = dataset;
        }
        if let Some(dir) = self.results_dir {
            config.results_dir = Some(dir);
        }
        if self.no_fundamental {
            config.variants.set(Variant::Fundamental, false);
        }
        for (flag, variant) in [
            (self.buffer, Variant::Buffer),
            (self.rough, Variant::Rough),
            (self.buffer_rough, Variant::BufferRough),
        ] {
            if flag {
                config.variants.set(variant, true);
            }
        }
        if let Some(x) = self.buffer_x {
            config.buffer_x = x;
        }
        if let Some(y) = self.buffer_y {
            config.buffer_y = y;
        }
        for stage in self.stages {
            config.stages.set(stage, true);
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the run finished but some variant failed.
fn run(cli: Cli) -> Result<bool> {
    let config = cli.into_config()?;
    log::debug!("Effective settings: {}", serde_json::to_string(&config)?);

    let orchestrator = Orchestrator::new(StageRegistry::with_builtin());
    log::debug!("Stage registry: {:?}", orchestrator.registry());

    let handle = pipeline::spawn(orchestrator, PipelineContext::new(config))?;
    let (_, ctx, result) = handle.join()?;
    let report = result?;

    for (variant, outcome) in &report.variants {
        match outcome {
            VariantOutcome::Disabled => {}
            VariantOutcome::Completed { dataset, stages } => log::info!(
                "PDP {variant}: {} ({} stage runs)",
                dataset.display(),
                stages.len()
            ),
            VariantOutcome::Failed { error } => log::error!("PDP {variant}: {error}"),
            VariantOutcome::Cancelled => log::warn!("PDP {variant}: cancelled"),
        }
    }
    log::info!("Current dataset: {} ({})", ctx.dataset_name().display(), ctx.cardinalities());

    let clean = report.failures().next().is_none();
    Ok(clean)
}
