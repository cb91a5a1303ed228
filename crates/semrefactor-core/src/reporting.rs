use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{ExecutionResult, PlanStep, StepReport};
use crate::pipeline::PipelineReport;

/// Run report persisted by `semrefactor refactor --report`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReportArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: PipelineReport,
}

impl RunReportArtifact {
    pub fn new(report: PipelineReport) -> Self {
        Self {
            schema_version: "1.0".to_string(),
            generated_at: Utc::now(),
            report,
        }
    }
}

/// Write the run report in pretty JSON format.
pub fn write_report_json(path: &Path, report: &PipelineReport) -> Result<()> {
    let artifact = RunReportArtifact::new(report.clone());
    let content = serde_json::to_string_pretty(&artifact).context("serialize run report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Describe one plan step for an operator deciding whether to apply it.
pub fn render_step_prompt(step: &PlanStep) -> String {
    let mut out = format!(
        "{} ({} risk, distance {:.3})\n",
        step.relative_path, step.risk_tier, step.similarity_distance
    );
    out.push_str("Suggested change:\n");
    for line in step.suggested_changes.trim().lines() {
        out.push_str(&format!("  {}\n", line));
    }
    out
}

/// Render a markdown summary of one execution.
pub fn render_summary_md(result: &ExecutionResult) -> String {
    let mut out = String::new();
    out.push_str("# Refactor Summary\n\n");
    out.push_str(&format!(
        "- mode: {}\n- state: {}\n",
        if result.dry_run { "dry run" } else { "live" },
        result.state
    ));

    if result.dry_run {
        out.push_str(&format!("- would apply: {}\n", result.would_apply_count()));
    } else {
        out.push_str(&format!(
            "- succeeded: {}\n- failed: {}\n- skipped: {}\n",
            result.succeeded.len(),
            result.failed.len(),
            result.skipped.len()
        ));
    }
    if let Some(location) = &result.backup_location {
        out.push_str(&format!("- backup: `{}`\n", location.display()));
    }
    out.push('\n');

    if result.dry_run && !result.reports.is_empty() {
        out.push_str("## Planned Changes\n");
        for report in &result.reports {
            if let StepReport::WouldApply {
                relative_path,
                risk_tier,
                ..
            } = report
            {
                out.push_str(&format!("- `{}` ({} risk)\n", relative_path, risk_tier));
            }
        }
        out.push('\n');
    }

    if !result.failed.is_empty() {
        out.push_str("## Failures\n");
        for failure in &result.failed {
            out.push_str(&format!("- `{}`: {}\n", failure.relative_path, failure.error));
        }
        out.push('\n');
    }
    out
}
