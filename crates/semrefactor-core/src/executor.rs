//! Plan executor.
//!
//! Walks a plan strictly in order, one file at a time. Live runs back up
//! every affected file before the first write; if that backup fails the run
//! is aborted and nothing is touched. After that, a failure on one file is
//! recorded and the run moves on to the next step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::backup::{write_atomic, BackupError, BackupManager};
use crate::confirm::Confirmer;
use crate::domain::{ExecutionResult, ExecutionState, PlanStep, RefactorError, Result, StepReport};
use crate::generation::TextGenerator;
use crate::obs;

/// Per-run execution switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Report intended changes without any I/O.
    pub dry_run: bool,
    /// Apply every step without asking the confirmer.
    pub auto_accept: bool,
    /// Exemplar of the desired end state, passed to the generator.
    pub target_pattern: Option<String>,
}

/// Coarse cancellation: checked before each step, never mid-write.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Executes change plans against the filesystem.
pub struct PlanExecutor<'a> {
    generator: &'a dyn TextGenerator,
    backups: &'a BackupManager,
    confirmer: &'a dyn Confirmer,
    cancel: Option<CancellationFlag>,
    state: ExecutionState,
}

impl<'a> PlanExecutor<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        backups: &'a BackupManager,
        confirmer: &'a dyn Confirmer,
    ) -> Self {
        Self {
            generator,
            backups,
            confirmer,
            cancel: None,
            state: ExecutionState::Idle,
        }
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// State reached by the most recent [`execute`](Self::execute) call.
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    fn transition(&mut self, next: ExecutionState) {
        debug!(from = %self.state, to = %next, "executor transition");
        self.state = next;
    }

    /// Run `plan`.
    ///
    /// Returns `Err(RefactorError::Backup)` only when the pre-run backup
    /// cannot be created; the executor is then left `Aborted`.
    #[instrument(skip(self, plan, options), fields(steps = plan.len(), dry_run = options.dry_run))]
    pub async fn execute(
        &mut self,
        plan: &[PlanStep],
        options: &ExecutionOptions,
    ) -> Result<ExecutionResult> {
        self.state = ExecutionState::Idle;
        let mut result = ExecutionResult::new(options.dry_run);

        if !options.dry_run {
            self.transition(ExecutionState::BackingUp);
            let files: Vec<_> = plan.iter().map(|s| s.absolute_path.clone()).collect();
            match self.backups.create_backup(&files) {
                Ok(backup) => result.backup_location = Some(backup.path),
                Err(e) => {
                    self.transition(ExecutionState::Aborted);
                    obs::emit_refactor_aborted(&e);
                    return Err(RefactorError::Backup(e));
                }
            }
        }

        self.transition(ExecutionState::Running);

        for step in plan {
            if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                result.record_skipped(&step.relative_path);
                obs::emit_step_skipped(&step.relative_path);
                continue;
            }

            if options.dry_run {
                result.reports.push(StepReport::WouldApply {
                    relative_path: step.relative_path.clone(),
                    risk_tier: step.risk_tier,
                    suggested_changes: step.suggested_changes.clone(),
                });
                continue;
            }

            if !options.auto_accept && !self.confirmer.confirm(step) {
                result.record_skipped(&step.relative_path);
                obs::emit_step_skipped(&step.relative_path);
                continue;
            }

            match self.apply_step(step, options.target_pattern.as_deref()).await {
                Ok(()) => {
                    result.record_applied(&step.relative_path);
                    obs::emit_step_applied(&step.relative_path, step.risk_tier);
                }
                Err(e) => {
                    obs::emit_step_failed(&step.relative_path, &e);
                    result.record_failed(&step.relative_path, e.to_string());
                }
            }
        }

        self.transition(ExecutionState::Completed);
        result.state = ExecutionState::Completed;
        obs::emit_refactor_finished(
            result.succeeded.len(),
            result.failed.len(),
            result.skipped.len(),
            options.dry_run,
        );
        Ok(result)
    }

    async fn apply_step(&self, step: &PlanStep, target_pattern: Option<&str>) -> Result<()> {
        let current = std::fs::read_to_string(&step.absolute_path)?;
        let prompt = build_edit_prompt(step, &current, target_pattern);
        let completion = self.generator.complete(&prompt).await?;

        let mut replacement = strip_code_fence(&completion).to_string();
        if replacement.trim().is_empty() {
            return Err(crate::generation::GenerationError::EmptyCompletion.into());
        }
        if current.ends_with('\n') && !replacement.ends_with('\n') {
            replacement.push('\n');
        }

        // Readers see either the old file or the new one, never a torn write.
        write_atomic(&step.absolute_path, replacement.as_bytes()).map_err(|e| match e {
            BackupError::Io { source, .. } => RefactorError::Io(source),
            other => RefactorError::Backup(other),
        })
    }
}

/// Prompt asking the generator for the full replacement text of one file.
pub fn build_edit_prompt(step: &PlanStep, current: &str, target_pattern: Option<&str>) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Refactor the file `{}`.\n\n", step.relative_path));
    prompt.push_str(&format!("Requested change:\n{}\n\n", step.suggested_changes));

    if let Some(target) = target_pattern {
        prompt.push_str(&format!(
            "Make the result follow this target pattern:\n```\n{target}\n```\n\n"
        ));
    }

    if step.original_content.trim() != current.trim() {
        prompt.push_str(&format!(
            "The fragment that matched the search:\n```\n{}\n```\n\n",
            step.original_content
        ));
    }

    prompt.push_str(&format!("Current file content:\n```\n{current}\n```\n\n"));
    prompt.push_str(
        "Return only the complete new content of the file, with no explanation \
         and no markdown fences.\n",
    );
    prompt
}

/// Remove one surrounding markdown code fence, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string line (e.g. "rust").
    match body.find('\n') {
        Some(idx) => body[idx + 1..].trim_end_matches('\n'),
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskTier;
    use std::path::PathBuf;

    fn step(content: &str) -> PlanStep {
        PlanStep {
            absolute_path: PathBuf::from("/repo/src/a.rs"),
            relative_path: "src/a.rs".to_string(),
            original_content: content.to_string(),
            similarity_distance: 0.1,
            suggested_changes: "use ? instead of unwrap".to_string(),
            risk_tier: RiskTier::Low,
        }
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```rust\nfn a() {}\n```"), "fn a() {}");
        assert_eq!(strip_code_fence("```\nx\ny\n```\n"), "x\ny");
        assert_eq!(strip_code_fence("fn a() {}"), "fn a() {}");
        assert_eq!(strip_code_fence("```rust\nunterminated"), "```rust\nunterminated");
    }

    #[test]
    fn test_edit_prompt_includes_target_and_fragment() {
        let s = step("fn frag() {}");
        let prompt = build_edit_prompt(&s, "fn frag() {}\nfn other() {}", Some("fn ideal() {}"));
        assert!(prompt.contains("src/a.rs"));
        assert!(prompt.contains("use ? instead of unwrap"));
        assert!(prompt.contains("fn ideal() {}"));
        assert!(prompt.contains("The fragment that matched"));
        assert!(prompt.contains("fn other() {}"));
    }

    #[test]
    fn test_edit_prompt_omits_fragment_when_whole_file() {
        let s = step("fn a() {}");
        let prompt = build_edit_prompt(&s, "fn a() {}\n", None);
        assert!(!prompt.contains("The fragment that matched"));
        assert!(!prompt.contains("target pattern"));
    }

    #[test]
    fn test_cancellation_flag() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
