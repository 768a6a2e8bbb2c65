use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::pipeline::stage::StageId;
use crate::pipeline::variant::Variant;

/// Environment variable overriding [`PipelineConfig::dataset_name`].
pub const ENV_DATASET: &str = "AV_DATASET";
/// Environment variable overriding [`PipelineConfig::results_dir`].
pub const ENV_RESULTS_DIR: &str = "AV_RESULTS_DIR";

// ---------------------------------------------------------------------------
// PipelineConfig – the flat settings mapping supplied by the host
// ---------------------------------------------------------------------------

/// Toggles and numeric parameters for one pipeline run.
///
/// Deserialized from a flat JSON object. Unknown keys are ignored, missing
/// keys fall back to [`Default`]. Toggles accept `true`/`false` or `0`/`1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    #[serde(flatten)]
    pub variants: VariantToggles,

    #[serde(flatten)]
    pub stages: StageToggles,

    /// Source dataset supplied by the host.
    pub dataset_name: PathBuf,
    /// Where derived artifacts are written; the working directory if unset.
    pub results_dir: Option<PathBuf>,
    /// File-name prefix of every derived artifact.
    pub artifact_prefix: String,

    pub buffer_x: f64,
    pub buffer_y: f64,

    // Passed through to stage adapters without validation.
    pub rough_x: Option<f64>,
    pub rough_y: Option<f64>,
    pub window_length_tst: Option<usize>,
    pub min_boundary_x: Option<f64>,
    pub max_boundary_x: Option<f64>,
    pub min_boundary_y: Option<f64>,
    pub max_boundary_y: Option<f64>,
}

impl PipelineConfig {
    pub const DEFAULT_DATASET: &'static str = "N_C_Dataset.csv";
    pub const DEFAULT_PREFIX: &'static str = "N_C_PDPg";
    pub const DEFAULT_BUFFER_X: f64 = 25.0;
    pub const DEFAULT_BUFFER_Y: f64 = 10.0;

    /// Parse a settings file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("settings must be a flat JSON object")
    }

    /// Apply `AV_DATASET` / `AV_RESULTS_DIR` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var_os(key).map(PathBuf::from));
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<PathBuf>) {
        if let Some(dataset) = lookup(ENV_DATASET) {
            self.dataset_name = dataset;
        }
        if let Some(dir) = lookup(ENV_RESULTS_DIR) {
            self.results_dir = Some(dir);
        }
    }

    /// The configured results directory, or the working directory.
    pub fn results_dir(&self) -> PathBuf {
        match &self.results_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            variants: VariantToggles::default(),
            stages: StageToggles::default(),
            dataset_name: PathBuf::from(Self::DEFAULT_DATASET),
            results_dir: None,
            artifact_prefix: Self::DEFAULT_PREFIX.to_string(),
            buffer_x: Self::DEFAULT_BUFFER_X,
            buffer_y: Self::DEFAULT_BUFFER_Y,
            rough_x: None,
            rough_y: None,
            window_length_tst: None,
            min_boundary_x: None,
            max_boundary_x: None,
            min_boundary_y: None,
            max_boundary_y: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Variant toggles
// ---------------------------------------------------------------------------

/// Which PDP variants run. Fundamental is on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantToggles {
    #[serde(rename = "PDPg_fundamental", deserialize_with = "toggle")]
    pub fundamental: bool,
    #[serde(rename = "PDPg_buffer", deserialize_with = "toggle")]
    pub buffer: bool,
    #[serde(rename = "PDPg_rough", deserialize_with = "toggle")]
    pub rough: bool,
    #[serde(rename = "PDPg_bufferrough", deserialize_with = "toggle")]
    pub bufferrough: bool,
}

impl VariantToggles {
    pub fn enabled(&self, variant: Variant) -> bool {
        match variant {
            Variant::Fundamental => self.fundamental,
            Variant::Buffer => self.buffer,
            Variant::Rough => self.rough,
            Variant::BufferRough => self.bufferrough,
        }
    }

    pub fn set(&mut self, variant: Variant, on: bool) {
        match variant {
            Variant::Fundamental => self.fundamental = on,
            Variant::Buffer => self.buffer = on,
            Variant::Rough => self.rough = on,
            Variant::BufferRough => self.bufferrough = on,
        }
    }
}

impl Default for VariantToggles {
    fn default() -> Self {
        Self {
            fundamental: true,
            buffer: false,
            rough: false,
            bufferrough: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Stage toggles
// ---------------------------------------------------------------------------

/// Which analysis-stage adapters run. Only distance matrices are on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageToggles {
    #[serde(rename = "N_PDP", deserialize_with = "toggle")]
    pub distance_matrix: bool,
    #[serde(rename = "N_VA_StaticAbsolute", deserialize_with = "toggle")]
    pub static_absolute: bool,
    #[serde(rename = "N_VA_HeatMap", deserialize_with = "toggle")]
    pub heat_map: bool,
    #[serde(rename = "N_VA_HClust", deserialize_with = "toggle")]
    pub hclust: bool,
    #[serde(rename = "N_VA_Mds", deserialize_with = "toggle")]
    pub mds: bool,
    #[serde(rename = "N_VA_InequalityMatrices", deserialize_with = "toggle")]
    pub inequality_matrices: bool,
    #[serde(rename = "N_VA_TopK", deserialize_with = "toggle")]
    pub top_k: bool,
    #[serde(rename = "N_VA_TennisCourt", deserialize_with = "toggle")]
    pub tennis_court: bool,
}

impl StageToggles {
    pub fn enabled(&self, stage: StageId) -> bool {
        *self.slot(stage)
    }

    pub fn set(&mut self, stage: StageId, on: bool) {
        *self.slot_mut(stage) = on;
    }

    fn slot(&self, stage: StageId) -> &bool {
        match stage {
            StageId::DistanceMatrix => &self.distance_matrix,
            StageId::StaticAbsolute => &self.static_absolute,
            StageId::HeatMap => &self.heat_map,
            StageId::HClust => &self.hclust,
            StageId::Mds => &self.mds,
            StageId::InequalityMatrices => &self.inequality_matrices,
            StageId::TopK => &self.top_k,
            StageId::TennisCourt => &self.tennis_court,
        }
    }

    fn slot_mut(&mut self, stage: StageId) -> &mut bool {
        match stage {
            StageId::DistanceMatrix => &mut self.distance_matrix,
            StageId::StaticAbsolute => &mut self.static_absolute,
            StageId::HeatMap => &mut self.heat_map,
            StageId::HClust => &mut self.hclust,
            StageId::Mds => &mut self.mds,
            StageId::InequalityMatrices => &mut self.inequality_matrices,
            StageId::TopK => &mut self.top_k,
            StageId::TennisCourt => &mut self.tennis_court,
        }
    }
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            distance_matrix: true,
            static_absolute: false,
            heat_map: false,
            hclust: false,
            mds: false,
            inequality_matrices: false,
            top_k: false,
            tennis_court: false,
        }
    }
}

// -- toggles may arrive as booleans or as 0/1 --

fn toggle<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => b,
        Raw::Int(i) => i != 0,
        Raw::Float(f) => f != 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.variants.fundamental);
        assert!(config.stages.distance_matrix);
        assert_eq!(config.buffer_x, 25.0);
        assert_eq!(config.buffer_y, 10.0);
    }

    #[test]
    fn numeric_and_boolean_toggles_are_accepted() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "PDPg_fundamental": 0,
                "PDPg_buffer": 1,
                "PDPg_rough": true,
                "N_VA_HeatMap": 1,
                "N_PDP": false
            }"#,
        )
        .unwrap();

        assert!(!config.variants.enabled(Variant::Fundamental));
        assert!(config.variants.enabled(Variant::Buffer));
        assert!(config.variants.enabled(Variant::Rough));
        assert!(!config.variants.enabled(Variant::BufferRough));
        assert!(config.stages.enabled(StageId::HeatMap));
        assert!(!config.stages.enabled(StageId::DistanceMatrix));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = PipelineConfig::from_json_str(
            r#"{ "N_VA_DynamicAbsolute": 1, "password": "x", "buffer_x": 2.5 }"#,
        )
        .unwrap();
        assert_eq!(config.buffer_x, 2.5);
    }

    #[test]
    fn passthrough_parameters_are_kept() {
        let config = PipelineConfig::from_json_str(
            r#"{ "rough_x": 0.5, "window_length_tst": 4, "max_boundary_y": 23.77 }"#,
        )
        .unwrap();
        assert_eq!(config.rough_x, Some(0.5));
        assert_eq!(config.window_length_tst, Some(4));
        assert_eq!(config.max_boundary_y, Some(23.77));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(PipelineConfig::from_json_str("[1, 2]").is_err());
    }

    #[test]
    fn environment_overrides_paths() {
        let mut config = PipelineConfig::default();
        config.apply_env_from(|key| match key {
            ENV_DATASET => Some(PathBuf::from("/data/court.csv")),
            ENV_RESULTS_DIR => Some(PathBuf::from("/tmp/results")),
            _ => None,
        });
        assert_eq!(config.dataset_name, PathBuf::from("/data/court.csv"));
        assert_eq!(config.results_dir(), PathBuf::from("/tmp/results"));
    }

    #[test]
    fn toggles_round_trip_through_setters() {
        let mut stages = StageToggles::default();
        for stage in StageId::ALL {
            stages.set(stage, true);
            assert!(stages.enabled(stage));
        }
        let mut variants = VariantToggles::default();
        variants.set(Variant::BufferRough, true);
        assert!(variants.bufferrough);
    }
}
