use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::data::model::{Cardinalities, PointDataset};
use crate::pipeline::variant::{Artifact, Variant};

// ---------------------------------------------------------------------------
// Current dataset
// ---------------------------------------------------------------------------

/// The dataset stage adapters must consult: where it lives and what it holds.
#[derive(Debug, Clone)]
pub struct CurrentDataset {
    pub path: PathBuf,
    pub dataset: PointDataset,
}

// ---------------------------------------------------------------------------
// Pipeline context
// ---------------------------------------------------------------------------

/// Everything a run shares between the orchestrator and the stage adapters.
///
/// Adapters only ever see `&PipelineContext`; the current dataset and the
/// active variant are written by the orchestrator alone, between stages.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub config: PipelineConfig,

    /// Externally supplied source dataset. Never overwritten by a run.
    source: PathBuf,

    /// Dataset considered authoritative right now (None until a variant
    /// has loaded one).
    current: Option<CurrentDataset>,

    /// The variant whose stages are executing, if any. At most one.
    active: Option<Variant>,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            source: config.dataset_name.clone(),
            config,
            current: None,
            active: None,
        }
    }

    /// The externally supplied source dataset.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Path of the current dataset, falling back to the source before any
    /// variant has run.
    pub fn dataset_name(&self) -> &Path {
        self.current
            .as_ref()
            .map_or(self.source.as_path(), |c| c.path.as_path())
    }

    pub fn current(&self) -> Option<&CurrentDataset> {
        self.current.as_ref()
    }

    /// Cardinalities of the current dataset (zeros before any load).
    pub fn cardinalities(&self) -> Cardinalities {
        self.current
            .as_ref()
            .map(|c| c.dataset.cardinalities)
            .unwrap_or_default()
    }

    pub fn active(&self) -> Option<Variant> {
        self.active
    }

    pub fn is_active(&self, variant: Variant) -> bool {
        self.active == Some(variant)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.config.results_dir()
    }

    pub fn artifact_path(&self, artifact: Artifact) -> PathBuf {
        artifact.path_in(&self.results_dir(), &self.config.artifact_prefix)
    }

    // -- orchestrator-only mutation --

    pub(crate) fn set_current(&mut self, path: PathBuf, dataset: PointDataset) {
        self.config.dataset_name = path.clone();
        self.current = Some(CurrentDataset { path, dataset });
    }

    pub(crate) fn activate(&mut self, variant: Variant) {
        debug_assert!(
            self.active.is_none(),
            "{variant} activated while {:?} still active",
            self.active
        );
        self.active = Some(variant);
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Record;

    #[test]
    fn dataset_name_falls_back_to_source() {
        let mut config = PipelineConfig::default();
        config.dataset_name = PathBuf::from("in.csv");
        let ctx = PipelineContext::new(config);

        assert_eq!(ctx.dataset_name(), Path::new("in.csv"));
        assert_eq!(ctx.cardinalities(), Cardinalities::default());
        assert!(ctx.current().is_none());
    }

    #[test]
    fn set_current_updates_pointer_but_not_source() {
        let mut config = PipelineConfig::default();
        config.dataset_name = PathBuf::from("in.csv");
        let mut ctx = PipelineContext::new(config);

        let ds = PointDataset::from_records(vec![Record::new(0, 1, 2, 0.0, 0.0)]);
        ctx.set_current(PathBuf::from("out/f.csv"), ds);

        assert_eq!(ctx.dataset_name(), Path::new("out/f.csv"));
        assert_eq!(ctx.config.dataset_name, PathBuf::from("out/f.csv"));
        assert_eq!(ctx.source(), Path::new("in.csv"));
        assert_eq!(ctx.cardinalities().poi, 3);
    }

    #[test]
    fn single_active_variant() {
        let mut ctx = PipelineContext::new(PipelineConfig::default());
        ctx.activate(Variant::Buffer);
        assert!(ctx.is_active(Variant::Buffer));
        assert!(!ctx.is_active(Variant::Fundamental));
        ctx.deactivate();
        assert_eq!(ctx.active(), None);
    }

    #[test]
    fn artifact_paths_live_in_results_dir() {
        let mut config = PipelineConfig::default();
        config.results_dir = Some(PathBuf::from("/results"));
        let ctx = PipelineContext::new(config);
        assert_eq!(
            ctx.artifact_path(Artifact::Buffer),
            PathBuf::from("/results/N_C_PDPg_buffer_Dataset.csv")
        );
    }
}
