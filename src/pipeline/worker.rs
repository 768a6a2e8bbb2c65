use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::orchestrator::{Orchestrator, RunReport};
use crate::context::PipelineContext;
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag, observed between variants and stages.
///
/// A stage that is already running always finishes. The token stays
/// cancelled until the run that observed it returns.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Background run
// ---------------------------------------------------------------------------

/// What a background run hands back: the orchestrator and context (so they
/// can be reused) plus the run's result.
pub type RunOutput = (Orchestrator, PipelineContext, Result<RunReport, PipelineError>);

/// A pipeline running on its own thread.
pub struct RunHandle {
    cancel: CancelToken,
    thread: JoinHandle<RunOutput>,
}

impl RunHandle {
    /// Request cancellation; takes effect at the next variant or stage
    /// boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run to end.
    ///
    /// # Errors
    ///
    /// Fails only if the worker thread panicked.
    pub fn join(self) -> anyhow::Result<RunOutput> {
        self.thread
            .join()
            .map_err(|_| anyhow::anyhow!("pipeline worker thread panicked"))
    }
}

/// Move the orchestrator and context onto a worker thread and start a run.
///
/// Ownership moves with them, so nothing else can touch the context until
/// [`RunHandle::join`] returns it.
pub fn spawn(mut orchestrator: Orchestrator, mut ctx: PipelineContext) -> std::io::Result<RunHandle> {
    let cancel = orchestrator.cancel_token();
    let thread = std::thread::Builder::new()
        .name("pdp-pipeline".into())
        .spawn(move || {
            let result = orchestrator.run(&mut ctx);
            (orchestrator, ctx, result)
        })?;
    Ok(RunHandle { cancel, thread })
}
