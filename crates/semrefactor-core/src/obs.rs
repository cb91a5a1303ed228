//! Structured lifecycle events for refactoring runs.
//!
//! Every event carries an `event` field so log pipelines can filter on it.
//! Runs are wrapped in [`run_span`] to tag all of their events with a `run_id`.

use std::path::Path;

use tracing::{info, warn};

use crate::risk::RiskTier;

/// Span tagging every event of one pipeline run.
///
/// Attach it with [`tracing::Instrument::instrument`] so it survives `.await` points.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("semrefactor.run", run_id = %run_id)
}

pub fn emit_refactor_started(description: &str, threshold: f32, limit: usize, dry_run: bool) {
    info!(
        event = "refactor.started",
        description = %description,
        threshold = threshold,
        limit = limit,
        dry_run = dry_run,
    );
}

pub fn emit_matches_found(count: usize) {
    info!(event = "refactor.matches_found", count = count);
}

pub fn emit_step_applied(relative_path: &str, risk: RiskTier) {
    info!(event = "refactor.step_applied", file = %relative_path, risk = %risk);
}

pub fn emit_step_failed(relative_path: &str, error: &dyn std::fmt::Display) {
    warn!(event = "refactor.step_failed", file = %relative_path, error = %error);
}

pub fn emit_step_skipped(relative_path: &str) {
    info!(event = "refactor.step_skipped", file = %relative_path);
}

pub fn emit_refactor_finished(succeeded: usize, failed: usize, skipped: usize, dry_run: bool) {
    info!(
        event = "refactor.finished",
        succeeded = succeeded,
        failed = failed,
        skipped = skipped,
        dry_run = dry_run,
    );
}

pub fn emit_refactor_aborted(error: &dyn std::fmt::Display) {
    warn!(event = "refactor.aborted", error = %error);
}

pub fn emit_backup_created(path: &Path, file_count: usize) {
    info!(event = "backup.created", path = %path.display(), file_count = file_count);
}

pub fn emit_backup_restored(path: &Path, restored: usize) {
    info!(event = "backup.restored", path = %path.display(), restored = restored);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_records_run_id() {
        let span = run_span("test-run-id");
        let _entered = span.enter();
        emit_matches_found(3);
    }
}
