//! Pipeline layer: variants, stage adapters and the orchestrator that
//! sequences them.
//!
//! ```text
//!   PipelineContext ──► Orchestrator ──► Variant (dataset selection)
//!                             │                   │
//!                             │                   ▼
//!                             └──────────► StageRegistry ──► Stage::run(&ctx)
//! ```

pub mod distance;
pub mod orchestrator;
pub mod stage;
pub mod variant;
pub mod worker;

pub use orchestrator::{Orchestrator, RunReport, StageRun, VariantOutcome};
pub use stage::{Invocation, Stage, StageId, StageRegistry};
pub use variant::{Artifact, Variant};
pub use worker::{spawn, CancelToken, RunHandle};
