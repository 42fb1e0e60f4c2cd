//! Progress reporting for a harvest run.
//!
//! The orchestrator reports one unit of work per finished query
//! configuration through [`ProgressCallback`]; rendering (an `indicatif`
//! bar, or nothing) is chosen by the binary.

use std::sync::Arc;

/// Receives progress updates from a harvest run.
///
/// Implementations must be `Send + Sync`; pipelines report from spawned
/// tasks.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total number of query configurations.
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` configurations.
    fn inc(&self, delta: u64);

    /// Updates the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the run as complete.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
