//! A single step of a change plan.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::risk::RiskTier;

/// One per-file change derived from a [`PatternMatch`](super::PatternMatch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub absolute_path: PathBuf,
    /// Path as reported by the index; used for reporting.
    pub relative_path: String,
    pub original_content: String,
    pub similarity_distance: f32,
    pub suggested_changes: String,
    pub risk_tier: RiskTier,
}
