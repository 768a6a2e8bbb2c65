use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use super::stage::Stage;
use crate::context::PipelineContext;
use crate::data::model::Record;

// ---------------------------------------------------------------------------
// Distance-matrix stage (N_PDP)
// ---------------------------------------------------------------------------

/// Pairwise Euclidean distances between all points sharing a
/// configuration and timestamp, written as a long-format CSV.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceMatrixStage;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistanceRow {
    #[serde(rename = "conID")]
    pub con: i64,
    #[serde(rename = "tstID")]
    pub tst: i64,
    #[serde(rename = "poiA")]
    pub poi_a: i64,
    #[serde(rename = "poiB")]
    pub poi_b: i64,
    pub distance: f64,
}

impl DistanceMatrixStage {
    /// `<results>/<prefix>_<variant>_DistanceMatrix.csv`, or `_overview_`
    /// outside a variant.
    pub fn output_path(ctx: &PipelineContext) -> PathBuf {
        let variant = ctx.active().map_or("overview", |v| v.name());
        ctx.results_dir().join(format!(
            "{}_{variant}_DistanceMatrix.csv",
            ctx.config.artifact_prefix
        ))
    }
}

impl Stage for DistanceMatrixStage {
    fn run(&self, ctx: &PipelineContext) -> Result<()> {
        let current = ctx
            .current()
            .context("no current dataset to compute distances for")?;

        let rows = pairwise_distances(&current.dataset.records);
        let path = Self::output_path(ctx);

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        for row in &rows {
            writer.serialize(row).context("writing distance row")?;
        }
        writer.flush()?;

        log::info!(
            "Distance matrices for {} ({}) written to {}",
            current.path.display(),
            current.dataset.cardinalities,
            path.display()
        );
        Ok(())
    }
}

/// Distances for every unordered point pair within each `(con, tst)` group.
///
/// Groups are emitted in ascending `(con, tst)` order; pairs keep the order
/// in which their points appear in the dataset.
pub fn pairwise_distances(records: &[Record]) -> Vec<DistanceRow> {
    let mut groups: BTreeMap<(i64, i64), Vec<&Record>> = BTreeMap::new();
    for r in records {
        groups.entry((r.con, r.tst)).or_default().push(r);
    }

    let mut rows = Vec::new();
    for ((con, tst), points) in groups {
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                rows.push(DistanceRow {
                    con,
                    tst,
                    poi_a: a.poi,
                    poi_b: b.poi,
                    distance: (a.x - b.x).hypot(a.y - b.y),
                });
            }
        }
    }
    rows
}
