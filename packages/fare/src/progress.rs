//! Per-highway progress for reconciliation runs.
//!
//! [`reconcile`](crate::reconcile) reports one unit per highway entry in
//! the fare table, including entries it skips, so a renderer can show
//! `done/total highways`. The `indicatif` renderer lives in
//! `tollway_cli_utils`.

use std::sync::Arc;

/// Receives progress events from a reconciliation.
pub trait ProgressCallback: Send + Sync {
    /// Called once, after the sink is cleared, with the number of highway
    /// entries in the fare table.
    fn start(&self, highways: u64);

    /// Called before a highway's axes are expanded.
    fn highway_started(&self, name: &str);

    /// Called after each highway entry, whether it was expanded or skipped.
    fn highway_done(&self);

    /// Called once after the sink is flushed, with the run's totals.
    fn finish(&self, totals: String);
}

/// A [`ProgressCallback`] that ignores every event.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn start(&self, _highways: u64) {}
    fn highway_started(&self, _name: &str) {}
    fn highway_done(&self) {}
    fn finish(&self, _totals: String) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
