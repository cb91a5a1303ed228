//! End-to-end refactoring pipeline.
//!
//! Stages run strictly in sequence, each consuming the full output of the
//! previous one: matcher, analyzer, plan builder, executor.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};

use crate::analyzer::analyze_patterns_outcome;
use crate::backup::{BackupManager, RestoreReport};
use crate::config::{Provider, RefactorConfig};
use crate::confirm::Confirmer;
use crate::domain::{
    AnalysisOutcome, ExecutionResult, PatternAnalysis, PatternMatch, PlanStep, RefactorError,
    Result,
};
use crate::executor::{CancellationFlag, ExecutionOptions, PlanExecutor};
use crate::generation::{AnthropicGenerator, CommandGenerator, TextGenerator};
use crate::matcher::find_similar_patterns;
use crate::obs;
use crate::plan::build_plan;
use crate::search::{CommandSearch, SearchBackend};

/// What to refactor and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefactorRequest {
    pub description: String,
    pub threshold: f32,
    pub limit: usize,
    /// Exemplar content the result should follow.
    pub target_pattern: Option<String>,
    pub dry_run: bool,
    pub auto_accept: bool,
}

impl RefactorRequest {
    /// A dry-run request using the configured threshold and limit.
    pub fn new(description: impl Into<String>, config: &RefactorConfig) -> Self {
        Self {
            description: description.into(),
            threshold: config.default_threshold,
            limit: config.default_limit,
            target_pattern: None,
            dry_run: true,
            auto_accept: false,
        }
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn target_pattern(mut self, pattern: Option<String>) -> Self {
        self.target_pattern = pattern;
        self
    }

    pub fn live(mut self, auto_accept: bool) -> Self {
        self.dry_run = false;
        self.auto_accept = auto_accept;
        self
    }
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub description: String,
    pub matches: Vec<PatternMatch>,
    /// `None` when no match passed the threshold.
    pub analysis: Option<AnalysisOutcome>,
    pub plan: Vec<PlanStep>,
    pub execution: Option<ExecutionResult>,
}

impl PipelineReport {
    pub fn pattern_count(&self) -> usize {
        self.matches.len()
    }
}

/// Matches plus analysis, without planning or execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub matches: Vec<PatternMatch>,
    pub analysis: Option<AnalysisOutcome>,
}

/// Owns the collaborators and configuration for refactoring runs.
pub struct RefactorPipeline {
    config: RefactorConfig,
    search: Box<dyn SearchBackend>,
    generator: Box<dyn TextGenerator>,
    backups: BackupManager,
}

impl RefactorPipeline {
    pub fn new(
        config: RefactorConfig,
        search: Box<dyn SearchBackend>,
        generator: Box<dyn TextGenerator>,
    ) -> Self {
        let backups = BackupManager::new(config.backup_root(), config.project_root.clone());
        Self {
            config,
            search,
            generator,
            backups,
        }
    }

    /// Build the pipeline with the backends named in `config`.
    pub fn from_config(config: RefactorConfig) -> Result<Self> {
        config.validate()?;
        let search = Box::new(CommandSearch::new(
            config.search_command.clone(),
            config.search_timeout(),
        ));
        let generator: Box<dyn TextGenerator> = match config.provider {
            Provider::Command => Box::new(CommandGenerator::new(
                config.generator_command.clone(),
                config.generation_timeout(),
            )),
            Provider::Anthropic => {
                let key = config.api_key.clone().unwrap_or_default();
                let mut generator =
                    AnthropicGenerator::new(key, config.model.clone(), config.generation_timeout());
                if let Some(url) = &config.api_base_url {
                    generator = generator.with_base_url(url.clone());
                }
                Box::new(generator)
            }
        };
        Ok(Self::new(config, search, generator))
    }

    pub fn config(&self) -> &RefactorConfig {
        &self.config
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub async fn find_similar_patterns(
        &self,
        query: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<PatternMatch>> {
        find_similar_patterns(self.search.as_ref(), query, threshold, limit).await
    }

    pub async fn analyze_patterns(
        &self,
        matches: &[PatternMatch],
        description: &str,
    ) -> Result<AnalysisOutcome> {
        analyze_patterns_outcome(
            self.generator.as_ref(),
            matches,
            description,
            self.config.analysis_limits(),
        )
        .await
    }

    pub fn build_plan(
        &self,
        matches: &[PatternMatch],
        analysis: &PatternAnalysis,
    ) -> Vec<PlanStep> {
        build_plan(matches, analysis, &self.config.project_root)
    }

    pub async fn execute_plan(
        &self,
        plan: &[PlanStep],
        options: &ExecutionOptions,
        confirmer: &dyn Confirmer,
        cancel: Option<CancellationFlag>,
    ) -> Result<ExecutionResult> {
        let mut executor = PlanExecutor::new(self.generator.as_ref(), &self.backups, confirmer);
        if let Some(flag) = cancel {
            executor = executor.with_cancellation(flag);
        }
        executor.execute(plan, options).await
    }

    /// Restore a backup taken by an earlier run. Nothing is written on failure.
    pub fn restore_backup(&self, backup_path: &Path) -> Result<RestoreReport> {
        self.backups
            .restore_backup(backup_path)
            .map_err(RefactorError::Restore)
    }

    /// Match and analyze only. The analyzer is not called without matches.
    pub async fn analyze(
        &self,
        description: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<AnalysisReport> {
        let matches = self
            .find_similar_patterns(description, threshold, limit)
            .await?;
        obs::emit_matches_found(matches.len());
        let analysis = if matches.is_empty() {
            None
        } else {
            Some(self.analyze_patterns(&matches, description).await?)
        };
        Ok(AnalysisReport { matches, analysis })
    }

    /// Run every stage for `request`.
    ///
    /// With zero matches the report is returned immediately: no analysis,
    /// no plan, no execution.
    pub async fn run(
        &self,
        request: &RefactorRequest,
        confirmer: &dyn Confirmer,
        cancel: Option<CancellationFlag>,
    ) -> Result<PipelineReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        self.run_inner(run_id, request, confirmer, cancel)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: String,
        request: &RefactorRequest,
        confirmer: &dyn Confirmer,
        cancel: Option<CancellationFlag>,
    ) -> Result<PipelineReport> {
        obs::emit_refactor_started(
            &request.description,
            request.threshold,
            request.limit,
            request.dry_run,
        );

        let AnalysisReport { matches, analysis } = self
            .analyze(&request.description, request.threshold, request.limit)
            .await?;

        let mut report = PipelineReport {
            run_id,
            description: request.description.clone(),
            matches,
            analysis: None,
            plan: Vec::new(),
            execution: None,
        };

        let Some(outcome) = analysis else {
            info!("no patterns passed the threshold");
            return Ok(report);
        };

        let analysis = outcome.clone().into_analysis();
        report.analysis = Some(outcome);
        report.plan = self.build_plan(&report.matches, &analysis);

        let options = ExecutionOptions {
            dry_run: request.dry_run,
            auto_accept: request.auto_accept,
            target_pattern: request.target_pattern.clone(),
        };
        report.execution = Some(
            self.execute_plan(&report.plan, &options, confirmer, cancel)
                .await?,
        );
        Ok(report)
    }
}
