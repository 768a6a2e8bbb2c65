use std::fmt;
use std::path::{Path, PathBuf};

/// One of the four PDP treatments of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variant {
    Fundamental,
    Buffer,
    Rough,
    BufferRough,
}

impl Variant {
    /// Fixed visiting order.
    pub const ORDER: [Variant; 4] = [
        Variant::Fundamental,
        Variant::Buffer,
        Variant::Rough,
        Variant::BufferRough,
    ];

    /// Short lowercase name used in artifact file names.
    pub fn name(self) -> &'static str {
        match self {
            Variant::Fundamental => "fundamental",
            Variant::Buffer => "buffer",
            Variant::Rough => "rough",
            Variant::BufferRough => "bufferrough",
        }
    }

    /// Which derived dataset artifact the variant consumes.
    pub fn artifact(self) -> Artifact {
        match self {
            Variant::Fundamental | Variant::Rough => Artifact::Fundamental,
            Variant::Buffer | Variant::BufferRough => Artifact::Buffer,
        }
    }

    /// A failed Fundamental aborts the run; later variants only lose their
    /// own results.
    pub fn failure_is_fatal(self) -> bool {
        matches!(self, Variant::Fundamental)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::Fundamental => "FUNDAMENTAL",
            Variant::Buffer => "BUFFER",
            Variant::Rough => "ROUGH",
            Variant::BufferRough => "BUFFER + ROUGH",
        })
    }
}

// ---------------------------------------------------------------------------
// Artifact – derived dataset files under the results directory
// ---------------------------------------------------------------------------

/// A derived dataset file, named `<prefix>_<kind>_Dataset.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Fundamental,
    Buffer,
}

impl Artifact {
    pub fn file_name(self, prefix: &str) -> String {
        let kind = match self {
            Artifact::Fundamental => "fundamental",
            Artifact::Buffer => "buffer",
        };
        format!("{prefix}_{kind}_Dataset.csv")
    }

    pub fn path_in(self, results_dir: &Path, prefix: &str) -> PathBuf {
        results_dir.join(self.file_name(prefix))
    }

    /// `true` if `path` names this artifact, whatever directory it lives in.
    pub fn matches(self, path: &Path, prefix: &str) -> bool {
        path.file_name().and_then(|name| name.to_str()) == Some(self.file_name(prefix).as_str())
    }
}
