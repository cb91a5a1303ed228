//! Outcome of executing a change plan.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::risk::RiskTier;

/// Executor lifecycle.
///
/// `Idle -> BackingUp -> Running -> Completed` for live runs,
/// `Idle -> Running -> Completed` for dry runs, and `BackingUp -> Aborted`
/// when the backup cannot be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Idle,
    BackingUp,
    Running,
    Completed,
    Aborted,
}

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::BackingUp => write!(f, "backing_up"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// A plan step that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub relative_path: String,
    pub error: String,
}

/// What happened to one plan step, in plan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepReport {
    /// Dry run: the change that would have been applied.
    WouldApply {
        relative_path: String,
        risk_tier: RiskTier,
        suggested_changes: String,
    },
    Applied {
        relative_path: String,
    },
    Failed {
        relative_path: String,
        error: String,
    },
    Skipped {
        relative_path: String,
    },
}

/// Accumulated result of one plan execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub state: ExecutionState,
    pub dry_run: bool,
    pub succeeded: BTreeSet<String>,
    pub failed: Vec<FileFailure>,
    pub skipped: BTreeSet<String>,
    pub backup_location: Option<PathBuf>,
    pub reports: Vec<StepReport>,
}

impl ExecutionResult {
    pub fn new(dry_run: bool) -> Self {
        Self {
            state: ExecutionState::Idle,
            dry_run,
            succeeded: BTreeSet::new(),
            failed: Vec::new(),
            skipped: BTreeSet::new(),
            backup_location: None,
            reports: Vec::new(),
        }
    }

    pub(crate) fn record_applied(&mut self, relative_path: &str) {
        self.succeeded.insert(relative_path.to_string());
        self.reports.push(StepReport::Applied {
            relative_path: relative_path.to_string(),
        });
    }

    pub(crate) fn record_failed(&mut self, relative_path: &str, error: impl Into<String>) {
        let error = error.into();
        self.failed.push(FileFailure {
            relative_path: relative_path.to_string(),
            error: error.clone(),
        });
        self.reports.push(StepReport::Failed {
            relative_path: relative_path.to_string(),
            error,
        });
    }

    pub(crate) fn record_skipped(&mut self, relative_path: &str) {
        self.skipped.insert(relative_path.to_string());
        self.reports.push(StepReport::Skipped {
            relative_path: relative_path.to_string(),
        });
    }

    /// Number of dry-run "would apply" reports.
    pub fn would_apply_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r, StepReport::WouldApply { .. }))
            .count()
    }

    /// True when every attempted step succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.state == ExecutionState::Completed
    }
}
