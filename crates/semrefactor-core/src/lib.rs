//! semrefactor core library
//!
//! Finds code that is semantically similar to a description, asks a text
//! generator what the matches have in common, and applies a risk-ordered
//! change plan with a backup taken first.

pub mod analyzer;
pub mod backup;
pub mod config;
pub mod confirm;
pub mod domain;
pub mod executor;
pub mod fakes;
pub mod generation;
pub mod matcher;
pub mod obs;
pub mod pipeline;
pub mod plan;
pub mod reporting;
pub mod risk;
pub mod search;
pub mod telemetry;

pub use analyzer::{analyze_patterns, analyze_patterns_outcome, AnalysisLimits};
pub use backup::{
    Backup, BackupError, BackupManager, BackupManifest, BackupResult, BackupSummary, ContentDigest,
    RestoreReport,
};
pub use config::{Provider, RefactorConfig, CONFIG_FILE};
pub use confirm::{AutoAccept, AutoDecline, Confirmer};
pub use domain::{
    AnalysisOutcome, ExecutionResult, ExecutionState, FileFailure, PatternAnalysis, PatternMatch,
    PlanStep, RefactorError, Result, StepReport, UNPARSED_MARKER,
};
pub use executor::{CancellationFlag, ExecutionOptions, PlanExecutor};
pub use generation::{
    AnthropicGenerator, CommandGenerator, GenerationError, GenerationResult, TextGenerator,
};
pub use matcher::find_similar_patterns;
pub use pipeline::{AnalysisReport, PipelineReport, RefactorPipeline, RefactorRequest};
pub use plan::build_plan;
pub use reporting::{render_step_prompt, render_summary_md, write_report_json};
pub use risk::{classify, RiskTier};
pub use search::{CommandSearch, SearchBackend, SearchError, SearchHit, SearchMetadata};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
