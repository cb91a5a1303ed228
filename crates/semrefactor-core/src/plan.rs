//! Plan builder: matches + analysis -> risk-ordered change steps.

use std::path::{Path, PathBuf};

use crate::domain::{PatternAnalysis, PatternMatch, PlanStep};
use crate::risk::classify;

/// Build one [`PlanStep`] per match, ordered low risk first.
///
/// The sort is stable, so steps with equal risk keep matcher order.
/// Relative match paths are resolved against `project_root`.
pub fn build_plan(
    matches: &[PatternMatch],
    analysis: &PatternAnalysis,
    project_root: &Path,
) -> Vec<PlanStep> {
    let mut steps: Vec<PlanStep> = matches
        .iter()
        .map(|m| PlanStep {
            absolute_path: resolve(project_root, &m.file_path),
            relative_path: m.file_path.clone(),
            original_content: m.content.clone(),
            similarity_distance: m.similarity_distance,
            suggested_changes: analysis.suggested_approach.clone(),
            risk_tier: classify(m),
        })
        .collect();

    steps.sort_by_key(|s| s.risk_tier.rank());
    steps
}

fn resolve(project_root: &Path, file_path: &str) -> PathBuf {
    let path = Path::new(file_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
