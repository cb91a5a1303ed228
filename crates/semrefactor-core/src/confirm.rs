//! Per-step confirmation capability used by the executor.

use crate::domain::PlanStep;

/// Decides whether a live step may be applied.
///
/// The binary supplies an interactive prompt; tests supply scripted answers.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, step: &PlanStep) -> bool;
}

/// Accepts every step.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAccept;

impl Confirmer for AutoAccept {
    fn confirm(&self, _step: &PlanStep) -> bool {
        true
    }
}

/// Declines every step.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecline;

impl Confirmer for AutoDecline {
    fn confirm(&self, _step: &PlanStep) -> bool {
        false
    }
}
