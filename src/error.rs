use std::path::PathBuf;

use crate::pipeline::stage::StageId;

// ---------------------------------------------------------------------------
// PipelineError – everything the loader, transform and orchestrator raise
// ---------------------------------------------------------------------------

/// Errors raised by the dataset layer and the pipeline orchestrator.
///
/// Whether an error aborts the whole run or only the variant that raised it
/// is decided by the orchestrator, not by the variant of this enum.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A row does not have exactly five columns.
    #[error("unexpected number of columns ({found}) in {}, expected 5", path.display())]
    ColumnCount { path: PathBuf, found: usize },

    /// A cell could not be read as a number.
    #[error("{}: row {row}, column {column}: '{value}' is not a number", path.display())]
    NotNumeric {
        path: PathBuf,
        row: usize,
        column: usize,
        value: String,
    },

    /// A point id too large for the buffer transform's `poi * 5 + k` ids.
    #[error("{}: row {row}: point id {poi} is too large to buffer", path.display())]
    IdOverflow { path: PathBuf, row: usize, poi: i64 },

    /// A source dataset or derived artifact does not exist.
    #[error("dataset file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A transform finished without writing its declared output.
    #[error("artifact not created: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    /// An enabled analysis stage has no registered adapter.
    #[error("stage adapter {0} is not available")]
    AdapterUnavailable(StageId),

    /// A registered adapter reported a failure.
    #[error("stage {stage} failed: {message}")]
    Stage { stage: StageId, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl PipelineError {
    /// `true` for malformed-input errors (wrong column count, non-numeric cell).
    pub fn is_format(&self) -> bool {
        matches!(self, Self::ColumnCount { .. } | Self::NotNumeric { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        let path = path.into();
        if let csv::ErrorKind::Io(err) = source.kind() {
            if err.kind() == std::io::ErrorKind::NotFound {
                return Self::NotFound { path };
            }
        }
        Self::Csv { path, source }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
