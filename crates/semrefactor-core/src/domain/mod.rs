//! Domain model shared by every pipeline stage.

pub mod analysis;
pub mod error;
pub mod execution;
pub mod pattern;
pub mod plan;

pub use analysis::{AnalysisOutcome, PatternAnalysis, UNPARSED_MARKER};
pub use error::{RefactorError, Result};
pub use execution::{ExecutionResult, ExecutionState, FileFailure, StepReport};
pub use pattern::PatternMatch;
pub use plan::PlanStep;
