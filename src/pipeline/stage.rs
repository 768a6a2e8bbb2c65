use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::context::PipelineContext;
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// StageId – the toggle-keyed analysis stages
// ---------------------------------------------------------------------------

/// Identifier of an optional analysis stage, keyed by its toggle name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageId {
    /// Pairwise distance matrices (`N_PDP`). Every later stage reads them.
    DistanceMatrix,
    StaticAbsolute,
    HeatMap,
    HClust,
    Mds,
    InequalityMatrices,
    TopK,
    TennisCourt,
}

impl StageId {
    pub const ALL: [StageId; 8] = [
        StageId::DistanceMatrix,
        StageId::StaticAbsolute,
        StageId::HeatMap,
        StageId::HClust,
        StageId::Mds,
        StageId::InequalityMatrices,
        StageId::TopK,
        StageId::TennisCourt,
    ];

    /// Stages run once per variant, in this order. Distance matrices come
    /// first because the others consume them.
    pub const PER_VARIANT: [StageId; 6] = [
        StageId::DistanceMatrix,
        StageId::HeatMap,
        StageId::HClust,
        StageId::Mds,
        StageId::InequalityMatrices,
        StageId::TopK,
    ];

    /// Stages run once before any variant, against the source dataset.
    pub const OVERVIEW: [StageId; 2] = [StageId::StaticAbsolute, StageId::TennisCourt];

    pub fn toggle_name(self) -> &'static str {
        match self {
            StageId::DistanceMatrix => "N_PDP",
            StageId::StaticAbsolute => "N_VA_StaticAbsolute",
            StageId::HeatMap => "N_VA_HeatMap",
            StageId::HClust => "N_VA_HClust",
            StageId::Mds => "N_VA_Mds",
            StageId::InequalityMatrices => "N_VA_InequalityMatrices",
            StageId::TopK => "N_VA_TopK",
            StageId::TennisCourt => "N_VA_TennisCourt",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.toggle_name())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageId::ALL
            .into_iter()
            .find(|id| id.toggle_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<_> = StageId::ALL.iter().map(|id| id.toggle_name()).collect();
                format!("unknown stage '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

// ---------------------------------------------------------------------------
// Stage – the capability every adapter provides
// ---------------------------------------------------------------------------

/// An analysis-stage adapter.
///
/// Adapters get no dataset argument: they read the current dataset from the
/// context on every call and must not cache it between calls.
pub trait Stage: Send {
    fn run(&self, ctx: &PipelineContext) -> anyhow::Result<()>;
}

impl<F> Stage for F
where
    F: Fn(&PipelineContext) -> anyhow::Result<()> + Send,
{
    fn run(&self, ctx: &PipelineContext) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Whether a stage ran for the first time or was forced to re-run against a
/// refreshed dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    FirstUse,
    Rerun,
}

// ---------------------------------------------------------------------------
// StageRegistry
// ---------------------------------------------------------------------------

/// Adapters available to the orchestrator, populated at start-up.
#[derive(Default)]
pub struct StageRegistry {
    adapters: BTreeMap<StageId, Box<dyn Stage>>,
    initialized: BTreeSet<StageId>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the adapters shipped with this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            StageId::DistanceMatrix,
            super::distance::DistanceMatrixStage,
        );
        registry
    }

    /// Register (or replace) the adapter for `id`.
    pub fn register(&mut self, id: StageId, stage: impl Stage + 'static) {
        if self.adapters.insert(id, Box::new(stage)).is_some() {
            log::debug!("Replaced adapter for {id}");
        }
    }

    pub fn is_registered(&self, id: StageId) -> bool {
        self.adapters.contains_key(&id)
    }

    /// Whether `id` has been invoked at least once.
    pub fn is_initialized(&self, id: StageId) -> bool {
        self.initialized.contains(&id)
    }

    /// Run the adapter for `id` against the context as it is right now.
    ///
    /// # Errors
    ///
    /// [`PipelineError::AdapterUnavailable`] if nothing is registered for
    /// `id`; [`PipelineError::Stage`] if the adapter fails.
    pub fn invoke(&mut self, id: StageId, ctx: &PipelineContext) -> Result<Invocation, PipelineError> {
        let stage = self
            .adapters
            .get(&id)
            .ok_or(PipelineError::AdapterUnavailable(id))?;

        let invocation = if self.initialized.insert(id) {
            log::info!("Running {id}");
            Invocation::FirstUse
        } else {
            log::info!("Re-running {id} against {}", ctx.dataset_name().display());
            Invocation::Rerun
        };

        stage.run(ctx).map_err(|e| PipelineError::Stage {
            stage: id,
            message: format!("{e:#}"),
        })?;
        Ok(invocation)
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .field("initialized", &self.initialized)
            .finish()
    }
}
