//! End-to-end pipeline runs with in-process collaborators.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use semrefactor_core::fakes::{ScriptedGenerator, StaticSearch};
use semrefactor_core::{
    AnalysisOutcome, AutoAccept, AutoDecline, GenerationError, RefactorConfig, RefactorError,
    RefactorPipeline, RefactorRequest, RiskTier, StepReport, UNPARSED_MARKER,
};

const ANALYSIS_JSON: &str = r#"{
  "common_patterns": ["unwrap on fallible reads"],
  "variations": ["some use expect"],
  "refactoring_opportunities": ["return Result"],
  "suggested_approach": "Replace unwrap with ? and return Result."
}"#;

fn config_for(root: &Path) -> RefactorConfig {
    RefactorConfig {
        project_root: root.to_path_buf(),
        ..Default::default()
    }
}

fn pipeline(
    root: &Path,
    search: StaticSearch,
    generator: &Arc<ScriptedGenerator>,
) -> RefactorPipeline {
    RefactorPipeline::new(
        config_for(root),
        Box::new(search),
        Box::new(Arc::clone(generator)),
    )
}

#[tokio::test]
async fn strict_threshold_finds_nothing_and_skips_analysis() {
    let project = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let search = StaticSearch::new()
        .with_hit("src/a.rs", "fn a() {}", 0.2)
        .with_hit("src/b.rs", "fn b() {}", 0.35);
    let pipeline = pipeline(project.path(), search, &generator);

    let config = pipeline.config().clone();
    let request = RefactorRequest::new("empty fns", &config).threshold(0.05);
    let report = pipeline.run(&request, &AutoAccept, None).await.unwrap();

    assert_eq!(report.pattern_count(), 0);
    assert!(report.analysis.is_none());
    assert!(report.plan.is_empty());
    assert!(report.execution.is_none());
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn retrieval_failure_halts_before_analysis() {
    let project = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let pipeline = pipeline(
        project.path(),
        StaticSearch::unavailable("index offline"),
        &generator,
    );

    let config = pipeline.config().clone();
    let request = RefactorRequest::new("anything", &config);
    let err = pipeline.run(&request, &AutoAccept, None).await.unwrap_err();

    assert!(matches!(err, RefactorError::Retrieval(_)));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn dry_run_plans_in_risk_order() {
    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("tests")).unwrap();
    fs::write(root.join("src/far.rs"), "fn far() {}\n").unwrap();
    fs::write(root.join("src/big.rs"), "fn big() {}\n").unwrap();
    fs::write(root.join("tests/io_test.rs"), "fn t() {}\n").unwrap();

    let generator = Arc::new(ScriptedGenerator::new().with_response(ANALYSIS_JSON));
    let search = StaticSearch::new()
        .with_symbols("src/big.rs", "fn big() {}", 0.05, &["a", "b", "c", "d", "e", "f"])
        .with_hit("src/far.rs", "fn far() {}", 0.35)
        .with_hit("tests/io_test.rs", "fn t() {}", 0.38);
    let pipeline = pipeline(root, search, &generator);

    let config = pipeline.config().clone();
    let request = RefactorRequest::new("unwrap on reads", &config);
    let report = pipeline.run(&request, &AutoAccept, None).await.unwrap();

    let tiers: Vec<_> = report.plan.iter().map(|s| s.risk_tier).collect();
    assert_eq!(tiers, vec![RiskTier::Low, RiskTier::Medium, RiskTier::High]);
    assert_eq!(report.plan[0].relative_path, "tests/io_test.rs");
    assert!(report
        .plan
        .iter()
        .all(|s| s.suggested_changes == "Replace unwrap with ? and return Result."));

    let execution = report.execution.expect("plan was executed");
    assert!(execution.dry_run);
    assert_eq!(execution.would_apply_count(), 3);
    assert!(matches!(
        &execution.reports[0],
        StepReport::WouldApply { relative_path, .. } if relative_path == "tests/io_test.rs"
    ));
    // Only the analysis call; dry runs never generate edits.
    assert_eq!(generator.call_count(), 1);
    assert_eq!(
        fs::read_to_string(root.join("src/big.rs")).unwrap(),
        "fn big() {}\n"
    );
}

#[tokio::test]
async fn malformed_analysis_degrades_and_still_plans() {
    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/a.rs"), "fn a() {}\n").unwrap();

    let generator =
        Arc::new(ScriptedGenerator::new().with_response("Just inline the helper everywhere."));
    let search = StaticSearch::new().with_hit("src/a.rs", "fn a() {}", 0.1);
    let pipeline = pipeline(root, search, &generator);

    let config = pipeline.config().clone();
    let request = RefactorRequest::new("helpers", &config);
    let report = pipeline.run(&request, &AutoDecline, None).await.unwrap();

    let analysis = report.analysis.expect("analysis ran");
    assert!(analysis.is_degraded());
    let analysis = analysis.into_analysis();
    assert_eq!(analysis.common_patterns, vec![UNPARSED_MARKER.to_string()]);
    assert_eq!(
        report.plan[0].suggested_changes,
        "Just inline the helper everywhere."
    );
}

#[tokio::test]
async fn analysis_generation_failure_halts_run() {
    let project = tempfile::tempdir().unwrap();
    let generator = Arc::new(
        ScriptedGenerator::new().with_error(GenerationError::Timeout(120)),
    );
    let search = StaticSearch::new().with_hit("src/a.rs", "fn a() {}", 0.1);
    let pipeline = pipeline(project.path(), search, &generator);

    let config = pipeline.config().clone();
    let request = RefactorRequest::new("anything", &config);
    let err = pipeline.run(&request, &AutoAccept, None).await.unwrap_err();

    assert!(matches!(err, RefactorError::Generation(GenerationError::Timeout(120))));
}

#[tokio::test]
async fn live_run_applies_changes_and_restores_from_backup() {
    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/a.rs"), "fn a() { x.unwrap() }\n").unwrap();

    let generator = Arc::new(
        ScriptedGenerator::new()
            .with_response(ANALYSIS_JSON)
            .with_response("fn a() -> Result<()> { x?; Ok(()) }\n"),
    );
    let search = StaticSearch::new().with_hit("src/a.rs", "fn a() { x.unwrap() }", 0.1);
    let pipeline = pipeline(root, search, &generator);

    let config = pipeline.config().clone();
    let request = RefactorRequest::new("unwrap", &config).live(true);
    let report = pipeline.run(&request, &AutoAccept, None).await.unwrap();

    let execution = report.execution.expect("executed");
    assert!(execution.is_clean());
    assert!(execution.succeeded.contains("src/a.rs"));
    assert_eq!(
        fs::read_to_string(root.join("src/a.rs")).unwrap(),
        "fn a() -> Result<()> { x?; Ok(()) }\n"
    );

    let backup = execution.backup_location.expect("backup taken");
    assert!(backup.starts_with(root.join(".semrefactor/backups")));
    let listed = pipeline.backups().list_backups().unwrap();
    assert_eq!(listed.len(), 1);

    let restored = pipeline.restore_backup(&backup).unwrap();
    assert_eq!(restored.restored_count(), 1);
    assert_eq!(
        fs::read_to_string(root.join("src/a.rs")).unwrap(),
        "fn a() { x.unwrap() }\n"
    );
}

#[tokio::test]
async fn analyze_only_never_plans() {
    let project = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new().with_response(ANALYSIS_JSON));
    let search = StaticSearch::new()
        .with_hit("src/a.rs", "fn a() {}", 0.1)
        .with_hit("src/b.rs", "fn b() {}", 0.9);
    let pipeline = pipeline(project.path(), search, &generator);

    let report = pipeline.analyze("unwrap", 0.4, 10).await.unwrap();

    assert_eq!(report.matches.len(), 1);
    assert!(matches!(report.analysis, Some(AnalysisOutcome::Parsed(_))));
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn restore_failure_is_reported_as_restore_error() {
    let project = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let pipeline = pipeline(project.path(), StaticSearch::new(), &generator);

    let missing = project.path().join(".semrefactor/backups/none");
    let err = pipeline.restore_backup(&missing).unwrap_err();

    assert!(matches!(err, RefactorError::Restore(_)));
    assert!(err.to_string().contains("restore failed"));
}
