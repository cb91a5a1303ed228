//! Executor behavior against a real temporary project tree.

use std::fs;
use std::path::{Path, PathBuf};

use semrefactor_core::fakes::{ScriptedConfirmer, ScriptedGenerator, StaticSearch};
use semrefactor_core::{
    build_plan, find_similar_patterns, AutoAccept, AutoDecline, BackupManager, BackupManifest,
    CancellationFlag, ExecutionOptions, ExecutionState, PatternAnalysis, PatternMatch,
    PlanExecutor, RefactorError, StepReport,
};

fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn analysis() -> PatternAnalysis {
    PatternAnalysis {
        common_patterns: vec!["unwrap on config reads".to_string()],
        variations: Vec::new(),
        refactoring_opportunities: Vec::new(),
        suggested_approach: "propagate errors with ?".to_string(),
    }
}

fn live(auto_accept: bool) -> ExecutionOptions {
    ExecutionOptions {
        dry_run: false,
        auto_accept,
        target_pattern: None,
    }
}

#[tokio::test]
async fn dry_run_reports_every_match_and_writes_nothing() {
    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    for name in ["a", "b", "c"] {
        write(root, &format!("src/{name}.rs"), &format!("fn {name}() {{}}\n"));
    }

    let search = StaticSearch::new()
        .with_hit("src/a.rs", "fn a() {}", 0.1)
        .with_hit("src/b.rs", "fn b() {}", 0.25)
        .with_hit("src/c.rs", "fn c() {}", 0.39);
    let matches = find_similar_patterns(&search, "empty fns", 0.4, 10)
        .await
        .unwrap();
    assert_eq!(matches.len(), 3);

    let plan = build_plan(&matches, &analysis(), root);
    let generator = ScriptedGenerator::new();
    let backup_root = root.join(".semrefactor/backups");
    let backups = BackupManager::new(&backup_root, root);
    let mut executor = PlanExecutor::new(&generator, &backups, &AutoAccept);

    let result = executor
        .execute(
            &plan,
            &ExecutionOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.state, ExecutionState::Completed);
    assert_eq!(result.would_apply_count(), 3);
    assert!(result.succeeded.is_empty());
    assert!(result.backup_location.is_none());
    assert_eq!(generator.call_count(), 0);
    assert!(!backup_root.exists());
    for name in ["a", "b", "c"] {
        let content = fs::read_to_string(root.join(format!("src/{name}.rs"))).unwrap();
        assert_eq!(content, format!("fn {name}() {{}}\n"));
    }
}

#[tokio::test]
async fn one_failing_file_does_not_stop_the_run() {
    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    write(root, "src/a.rs", "fn a() { x.unwrap() }\n");
    write(root, "src/b.rs", "fn b() { y.unwrap() }\n");

    let matches = vec![
        PatternMatch::new("src/a.rs", "fn a() { x.unwrap() }", 0.1),
        PatternMatch::new("src/b.rs", "fn b() { y.unwrap() }", 0.2),
    ];
    let plan = build_plan(&matches, &analysis(), root);

    let generator = ScriptedGenerator::new()
        .with_fallback("fn a() -> Result<()> { x? }")
        .failing_on("src/b.rs", "model overloaded");
    let backups = BackupManager::new(root.join(".semrefactor/backups"), root);
    let mut executor = PlanExecutor::new(&generator, &backups, &AutoAccept);

    let result = executor.execute(&plan, &live(true)).await.unwrap();

    assert_eq!(executor.state(), ExecutionState::Completed);
    assert_eq!(result.succeeded.len(), 1);
    assert!(result.succeeded.contains("src/a.rs"));
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].relative_path, "src/b.rs");
    assert!(result.failed[0].error.contains("model overloaded"));

    assert_eq!(
        fs::read_to_string(root.join("src/a.rs")).unwrap(),
        "fn a() -> Result<()> { x? }\n"
    );
    assert_eq!(
        fs::read_to_string(root.join("src/b.rs")).unwrap(),
        "fn b() { y.unwrap() }\n"
    );

    let location = result.backup_location.expect("live run records a backup");
    let manifest = BackupManifest::read(&location).unwrap();
    assert_eq!(manifest.file_count, 2);
    let backed_up_a = fs::read_to_string(location.join("files/src/a.rs")).unwrap();
    let backed_up_b = fs::read_to_string(location.join("files/src/b.rs")).unwrap();
    assert_eq!(backed_up_a, "fn a() { x.unwrap() }\n");
    assert_eq!(backed_up_b, "fn b() { y.unwrap() }\n");
}

#[tokio::test]
async fn backup_failure_aborts_before_any_write() {
    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    write(root, "src/a.rs", "fn a() {}\n");
    // A plain file where the backup directory should go.
    let blocker = write(root, "blocked", "not a directory");

    let plan = build_plan(
        &[PatternMatch::new("src/a.rs", "fn a() {}", 0.1)],
        &analysis(),
        root,
    );
    let generator = ScriptedGenerator::new();
    let backups = BackupManager::new(blocker.join("backups"), root);
    let mut executor = PlanExecutor::new(&generator, &backups, &AutoAccept);

    let err = executor.execute(&plan, &live(true)).await.unwrap_err();

    assert!(matches!(err, RefactorError::Backup(_)));
    assert_eq!(executor.state(), ExecutionState::Aborted);
    assert_eq!(generator.call_count(), 0);
    assert_eq!(fs::read_to_string(root.join("src/a.rs")).unwrap(), "fn a() {}\n");
}

#[tokio::test]
async fn declined_steps_are_skipped() {
    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    write(root, "src/a.rs", "fn a() {}\n");
    write(root, "src/b.rs", "fn b() {}\n");

    let plan = build_plan(
        &[
            PatternMatch::new("src/a.rs", "fn a() {}", 0.1),
            PatternMatch::new("src/b.rs", "fn b() {}", 0.2),
        ],
        &analysis(),
        root,
    );
    let generator = ScriptedGenerator::new().with_fallback("fn changed() {}\n");
    let backups = BackupManager::new(root.join(".semrefactor/backups"), root);
    let confirmer = ScriptedConfirmer::new([false, true]);
    let mut executor = PlanExecutor::new(&generator, &backups, &confirmer);

    let result = executor.execute(&plan, &live(false)).await.unwrap();

    assert_eq!(confirmer.asked(), vec!["src/a.rs", "src/b.rs"]);
    assert!(result.skipped.contains("src/a.rs"));
    assert!(result.succeeded.contains("src/b.rs"));
    assert_eq!(generator.call_count(), 1);
    assert_eq!(fs::read_to_string(root.join("src/a.rs")).unwrap(), "fn a() {}\n");
    assert_eq!(
        fs::read_to_string(root.join("src/b.rs")).unwrap(),
        "fn changed() {}\n"
    );
}

#[tokio::test]
async fn auto_accept_never_asks() {
    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    write(root, "src/a.rs", "fn a() {}\n");

    let plan = build_plan(
        &[PatternMatch::new("src/a.rs", "fn a() {}", 0.1)],
        &analysis(),
        root,
    );
    let generator = ScriptedGenerator::new();
    let backups = BackupManager::new(root.join(".semrefactor/backups"), root);
    let confirmer = ScriptedConfirmer::new(Vec::new());
    let mut executor = PlanExecutor::new(&generator, &backups, &confirmer);

    let result = executor.execute(&plan, &live(true)).await.unwrap();

    assert!(confirmer.asked().is_empty());
    assert!(result.succeeded.contains("src/a.rs"));
}

#[tokio::test]
async fn cancelled_run_skips_remaining_steps() {
    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    write(root, "src/a.rs", "fn a() {}\n");
    write(root, "src/b.rs", "fn b() {}\n");

    let plan = build_plan(
        &[
            PatternMatch::new("src/a.rs", "fn a() {}", 0.1),
            PatternMatch::new("src/b.rs", "fn b() {}", 0.2),
        ],
        &analysis(),
        root,
    );
    let generator = ScriptedGenerator::new();
    let backups = BackupManager::new(root.join(".semrefactor/backups"), root);
    let cancel = CancellationFlag::new();
    cancel.cancel();
    let mut executor =
        PlanExecutor::new(&generator, &backups, &AutoDecline).with_cancellation(cancel);

    let result = executor.execute(&plan, &live(true)).await.unwrap();

    assert_eq!(result.state, ExecutionState::Completed);
    assert_eq!(result.skipped.len(), 2);
    assert_eq!(generator.call_count(), 0);
    assert!(result
        .reports
        .iter()
        .all(|r| matches!(r, StepReport::Skipped { .. })));
}

#[tokio::test]
async fn fenced_completion_is_unwrapped_and_target_pattern_is_sent() {
    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    write(root, "src/a.rs", "fn a() {}\n");

    let plan = build_plan(
        &[PatternMatch::new("src/a.rs", "fn a() {}", 0.1)],
        &analysis(),
        root,
    );
    let generator = ScriptedGenerator::new().with_response("```rust\nfn a() -> u8 { 1 }\n```");
    let backups = BackupManager::new(root.join(".semrefactor/backups"), root);
    let mut executor = PlanExecutor::new(&generator, &backups, &AutoAccept);

    let options = ExecutionOptions {
        dry_run: false,
        auto_accept: true,
        target_pattern: Some("fn ideal() -> u8 { 0 }".to_string()),
    };
    let result = executor.execute(&plan, &options).await.unwrap();

    assert!(result.is_clean());
    assert_eq!(
        fs::read_to_string(root.join("src/a.rs")).unwrap(),
        "fn a() -> u8 { 1 }\n"
    );
    assert!(generator.prompts()[0].contains("fn ideal() -> u8 { 0 }"));
}

#[tokio::test]
async fn empty_completion_is_a_failure() {
    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    write(root, "src/a.rs", "fn a() {}\n");

    let plan = build_plan(
        &[PatternMatch::new("src/a.rs", "fn a() {}", 0.1)],
        &analysis(),
        root,
    );
    let generator = ScriptedGenerator::new().with_response("   \n");
    let backups = BackupManager::new(root.join(".semrefactor/backups"), root);
    let mut executor = PlanExecutor::new(&generator, &backups, &AutoAccept);

    let result = executor.execute(&plan, &live(true)).await.unwrap();

    assert_eq!(result.failed.len(), 1);
    assert!(result.failed[0].error.contains("empty completion"));
    assert_eq!(fs::read_to_string(root.join("src/a.rs")).unwrap(), "fn a() {}\n");
}

#[cfg(unix)]
#[tokio::test]
async fn applied_edit_replaces_the_file_atomically() {
    use std::io::Read;
    use std::os::unix::fs::PermissionsExt;

    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    let path = write(root, "bin/run.sh", "echo old\n");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    // A reader that opened the file before the edit keeps the old content.
    let mut reader = fs::File::open(&path).unwrap();

    let matches = vec![PatternMatch::new("bin/run.sh", "echo old", 0.1)];
    let plan = build_plan(&matches, &analysis(), root);
    let generator = ScriptedGenerator::new().with_fallback("echo new");
    let backups = BackupManager::new(root.join(".semrefactor/backups"), root);
    let mut executor = PlanExecutor::new(&generator, &backups, &AutoAccept);

    let result = executor.execute(&plan, &live(true)).await.unwrap();

    assert!(result.succeeded.contains("bin/run.sh"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "echo new\n");
    let mut seen = String::new();
    reader.read_to_string(&mut seen).unwrap();
    assert_eq!(seen, "echo old\n");
    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
    let leftovers: Vec<_> = fs::read_dir(root.join("bin"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("run.sh")]);
}
