//! Variant orchestration: Fundamental → Buffer → Rough → Buffer+Rough.
//!
//! Each enabled variant selects (or produces) its dataset, makes it the
//! context's current dataset, then runs the enabled analysis stages against
//! it. Variants run strictly one after another on the calling thread:
//!
//! ```text
//!   Idle ──► Fundamental ──► Buffer ──► Rough ──► Buffer+Rough ──► Complete
//!             (copy+load)    (transform)  (reselect)  (transform+relocate)
//! ```
//!
//! A failure inside Fundamental, or any malformed-input error, aborts the
//! run. Any other failure is logged against its variant and the run moves on.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::stage::{Invocation, StageId, StageRegistry};
use super::variant::{Artifact, Variant};
use super::worker::CancelToken;
use crate::context::PipelineContext;
use crate::data::buffer::buffer_file;
use crate::data::loader::load_dataset;
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// One analysis-stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRun {
    pub stage: StageId,
    pub invocation: Invocation,
}

/// What happened to a variant during a run.
#[derive(Debug)]
pub enum VariantOutcome {
    /// Toggle off; never entered.
    Disabled,
    /// Dataset selected and every enabled stage attempted.
    Completed {
        dataset: PathBuf,
        stages: Vec<StageRun>,
    },
    /// The variant produced no results.
    Failed { error: PipelineError },
    /// Cancellation was observed before the variant (or its remaining
    /// stages) could run.
    Cancelled,
}

/// Summary of one [`Orchestrator::run`].
#[derive(Debug)]
pub struct RunReport {
    /// Stages run once against the source dataset before any variant.
    pub overview: Vec<StageRun>,
    /// One entry per variant, in visiting order.
    pub variants: Vec<(Variant, VariantOutcome)>,
    pub elapsed: Duration,
    /// `true` only for the run that emitted the completion report.
    pub completion_reported: bool,
}

impl RunReport {
    pub fn outcome(&self, variant: Variant) -> Option<&VariantOutcome> {
        self.variants
            .iter()
            .find(|(v, _)| *v == variant)
            .map(|(_, outcome)| outcome)
    }

    /// Every stage invocation of the run, overview first.
    pub fn stage_runs(&self) -> impl Iterator<Item = &StageRun> {
        self.overview.iter().chain(self.variants.iter().flat_map(|(_, outcome)| {
            match outcome {
                VariantOutcome::Completed { stages, .. } => stages.as_slice(),
                _ => &[][..],
            }
        }))
    }

    /// Variants that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (Variant, &PipelineError)> {
        self.variants.iter().filter_map(|(v, outcome)| match outcome {
            VariantOutcome::Failed { error } => Some((*v, error)),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives the PDP variants over a [`PipelineContext`].
///
/// The orchestrator owns the stage registry (so it knows which stages have
/// already run) and a one-shot completion guard: however many times
/// [`run`](Self::run) is called, completion is reported once.
#[derive(Debug)]
pub struct Orchestrator {
    registry: StageRegistry,
    cancel: CancelToken,
    completion_reported: bool,
    /// Where Buffer+Rough's transform writes before relocation.
    working_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(registry: StageRegistry) -> Self {
        Self {
            registry,
            cancel: CancelToken::default(),
            completion_reported: false,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Override the working location used by Buffer+Rough.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut StageRegistry {
        &mut self.registry
    }

    /// A handle that requests cooperative cancellation of this orchestrator.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run every enabled variant in the fixed order.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned: failures inside Fundamental,
    /// malformed input anywhere, or an unusable results directory. Failures
    /// of later variants are recorded in the returned [`RunReport`].
    ///
    /// A cancellation request pending when the run starts is honoured; the
    /// run that observes it also clears it, so a later `run` on the same
    /// orchestrator starts fresh.
    pub fn run(&mut self, ctx: &mut PipelineContext) -> Result<RunReport> {
        let result = self.run_variants(ctx);
        if self.cancel.is_cancelled() {
            log::debug!("Clearing observed cancellation request");
            self.cancel.reset();
        }
        result
    }

    fn run_variants(&mut self, ctx: &mut PipelineContext) -> Result<RunReport> {
        let started = Instant::now();

        let results_dir = ctx.results_dir();
        std::fs::create_dir_all(&results_dir).map_err(|e| PipelineError::io(&results_dir, e))?;
        log::info!("Dataset: {}", ctx.source().display());
        log::info!("Results: {}", results_dir.display());

        let overview = self.run_overview(ctx)?;

        let mut variants = Vec::with_capacity(Variant::ORDER.len());
        for variant in Variant::ORDER {
            if !ctx.config.variants.enabled(variant) {
                variants.push((variant, VariantOutcome::Disabled));
                continue;
            }
            if self.cancel.is_cancelled() {
                log::warn!("Cancellation requested; skipping PDP {variant}");
                variants.push((variant, VariantOutcome::Cancelled));
                continue;
            }

            log::info!("STARTING PDP: {variant}");
            ctx.activate(variant);
            let result = self.run_variant(variant, ctx);
            ctx.deactivate();

            let outcome = match result {
                Ok((stages, false)) => VariantOutcome::Completed {
                    dataset: ctx.dataset_name().to_path_buf(),
                    stages,
                },
                Ok((_, true)) => VariantOutcome::Cancelled,
                Err(error) if variant.failure_is_fatal() || error.is_format() => {
                    log::error!("PDP {variant} failed, aborting run: {error}");
                    return Err(error);
                }
                Err(error) => {
                    log::error!("PDP {variant} produced no results: {error}");
                    VariantOutcome::Failed { error }
                }
            };
            variants.push((variant, outcome));
        }

        let elapsed = started.elapsed();
        let completion_reported = !self.cancel.is_cancelled() && !self.completion_reported;
        if completion_reported {
            self.completion_reported = true;
            log::info!("ALL PDP PROCESSING COMPLETE!");
            log::info!(
                "Total time elapsed: {:.3} sec ({:.2} min)",
                elapsed.as_secs_f64(),
                elapsed.as_secs_f64() / 60.0
            );
        }

        Ok(RunReport {
            overview,
            variants,
            elapsed,
            completion_reported,
        })
    }

    // -- variant entry --

    /// Select the variant's dataset, then run its stages. The flag is `true`
    /// when cancellation cut the stage list short.
    fn run_variant(
        &mut self,
        variant: Variant,
        ctx: &mut PipelineContext,
    ) -> Result<(Vec<StageRun>, bool)> {
        match variant {
            Variant::Fundamental => enter_fundamental(ctx)?,
            Variant::Buffer => enter_buffer(ctx, None)?,
            Variant::Rough => enter_rough(ctx)?,
            Variant::BufferRough => enter_buffer(ctx, Some(&self.working_dir))?,
        }

        let tst = ctx.cardinalities().tst;
        if let Some(window) = ctx.config.window_length_tst {
            if window > tst {
                log::error!(
                    "window_length_tst ({window}) exceeds the number of timestamps ({tst}) in {}",
                    ctx.dataset_name().display()
                );
            }
        }
        log::info!("{}", ctx.cardinalities());

        self.run_stages(&StageId::PER_VARIANT, ctx)
    }

    /// Invoke the enabled stages of `order` against the current dataset.
    fn run_stages(
        &mut self,
        order: &[StageId],
        ctx: &PipelineContext,
    ) -> Result<(Vec<StageRun>, bool)> {
        let mut runs = Vec::new();
        for &stage in order.iter().filter(|id| ctx.config.stages.enabled(**id)) {
            if self.cancel.is_cancelled() {
                log::warn!("Cancellation requested; skipping remaining stages from {stage}");
                return Ok((runs, true));
            }
            match self.registry.invoke(stage, ctx) {
                Ok(invocation) => runs.push(StageRun { stage, invocation }),
                Err(err @ PipelineError::AdapterUnavailable(_)) => {
                    log::warn!("{err}; skipping");
                }
                Err(err) => return Err(err),
            }
        }
        Ok((runs, false))
    }

    /// Stages that look at the raw source once, before any variant.
    fn run_overview(&mut self, ctx: &mut PipelineContext) -> Result<Vec<StageRun>> {
        if !StageId::OVERVIEW.iter().any(|id| ctx.config.stages.enabled(*id)) {
            return Ok(Vec::new());
        }

        let source = ctx.source().to_path_buf();
        match load_dataset(&source) {
            Ok(dataset) => ctx.set_current(source, dataset),
            Err(err) if err.is_format() => return Err(err),
            Err(err) => {
                log::error!("Overview stages skipped: {err}");
                return Ok(Vec::new());
            }
        }

        let mut runs = Vec::new();
        for stage in StageId::OVERVIEW {
            if !ctx.config.stages.enabled(stage) || self.cancel.is_cancelled() {
                continue;
            }
            match self.registry.invoke(stage, ctx) {
                Ok(invocation) => runs.push(StageRun { stage, invocation }),
                Err(err @ PipelineError::AdapterUnavailable(_)) => log::warn!("{err}; skipping"),
                Err(err) => log::error!("Overview stage failed: {err}"),
            }
        }
        Ok(runs)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(StageRegistry::with_builtin())
    }
}

// ---------------------------------------------------------------------------
// Dataset selection per variant
// ---------------------------------------------------------------------------

/// Copy the source to the fundamental artifact (unless they are the same
/// file) and load it.
fn enter_fundamental(ctx: &mut PipelineContext) -> Result<()> {
    let source = ctx.source().to_path_buf();
    let artifact = ctx.artifact_path(Artifact::Fundamental);

    if !source.is_file() {
        return Err(PipelineError::NotFound { path: source });
    }
    if absolute(&source) != absolute(&artifact) {
        std::fs::copy(&source, &artifact).map_err(|e| PipelineError::io(&artifact, e))?;
    }

    let dataset = load_dataset(&artifact)?;
    ctx.set_current(artifact, dataset);
    Ok(())
}

/// Buffer the current dataset's file into the buffer artifact and load it.
///
/// With `working_dir`, the transform writes there first and the file is
/// relocated into the results directory before loading.
fn enter_buffer(ctx: &mut PipelineContext, working_dir: Option<&Path>) -> Result<()> {
    let prefix = ctx.config.artifact_prefix.clone();
    let artifact = ctx.artifact_path(Artifact::Buffer);

    // Never buffer an already-buffered file.
    let input = if Artifact::Buffer.matches(ctx.dataset_name(), &prefix) {
        ctx.source().to_path_buf()
    } else {
        ctx.dataset_name().to_path_buf()
    };

    let produced = match working_dir {
        Some(dir) => Artifact::Buffer.path_in(dir, &prefix),
        None => artifact.clone(),
    };
    buffer_file(&input, &produced, ctx.config.buffer_x, ctx.config.buffer_y)?;
    if produced != artifact {
        relocate(&produced, &artifact)?;
    }

    if !artifact.is_file() {
        return Err(PipelineError::ArtifactMissing { path: artifact });
    }
    log::info!("Buffer dataset created: {}", artifact.display());

    let dataset = load_dataset(&artifact)?;
    ctx.set_current(artifact, dataset);
    Ok(())
}

/// Re-select the fundamental artifact. Roughness itself is applied by the
/// stages' metric computation.
fn enter_rough(ctx: &mut PipelineContext) -> Result<()> {
    let artifact = ctx.artifact_path(Artifact::Fundamental);
    if !artifact.is_file() {
        return Err(PipelineError::NotFound { path: artifact });
    }
    let dataset = load_dataset(&artifact)?;
    ctx.set_current(artifact, dataset);
    Ok(())
}

/// Move `from` to `to`, replacing `to`. Falls back to copy + remove across
/// filesystems.
fn relocate(from: &Path, to: &Path) -> Result<()> {
    if absolute(from) == absolute(to) || !from.exists() {
        return Ok(());
    }
    log::debug!("Relocating {} to {}", from.display(), to.display());
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to).map_err(|e| PipelineError::io(to, e))?;
        std::fs::remove_file(from).map_err(|e| PipelineError::io(from, e))?;
    }
    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
