//! semrefactor - semantic pattern refactoring CLI
//!
//! ## Commands
//!
//! - `refactor`: find similar code, analyze it, and apply a change plan
//! - `analyze`: find similar code and report what it has in common
//! - `backup`: list or restore pre-refactor backups

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

use semrefactor_core::telemetry::LogFormat;
use semrefactor_core::{
    render_step_prompt, render_summary_md, write_report_json, AnalysisOutcome, AutoAccept,
    BackupManager, CancellationFlag, Confirmer, PatternMatch, PlanStep, RefactorConfig,
    RefactorPipeline, RefactorRequest,
};

#[derive(Parser)]
#[command(name = "semrefactor")]
#[command(version = semrefactor_core::VERSION)]
#[command(about = "Refactor semantically similar code patterns in one pass", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: .semrefactor.toml in the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find code similar to a description and refactor it
    ///
    /// Runs as a dry run unless `--execute` is given.
    Refactor {
        /// Natural-language description of the pattern to change
        description: String,

        /// Maximum similarity distance for a match (0 = identical)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Maximum number of candidates to retrieve
        #[arg(short, long)]
        limit: Option<usize>,

        /// File holding an exemplar of the desired end state
        #[arg(long)]
        pattern_file: Option<PathBuf>,

        /// Apply changes instead of reporting them
        #[arg(long)]
        execute: bool,

        /// Apply every step without asking
        #[arg(short, long, requires = "execute")]
        yes: bool,

        /// Write the full run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Find similar code and analyze it without planning changes
    Analyze {
        /// Natural-language description of the pattern
        description: String,

        #[arg(short, long)]
        threshold: Option<f32>,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Manage pre-refactor backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// List backups, newest first
    List,
    /// Restore every file recorded in a backup
    Restore {
        /// Backup directory
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = LogFormat::from_json_flag(cli.json);
    semrefactor_core::telemetry::init_tracing(format, level);

    let project_root = std::env::current_dir()
        .and_then(|dir| dir.canonicalize())
        .context("Failed to resolve project root")?;
    let config = RefactorConfig::resolve(&project_root, cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Refactor {
            description,
            threshold,
            limit,
            pattern_file,
            execute,
            yes,
            report,
        } => {
            let mut request = RefactorRequest::new(description, &config)
                .threshold(threshold.unwrap_or(config.default_threshold))
                .limit(limit.unwrap_or(config.default_limit));
            if let Some(path) = pattern_file {
                let pattern = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read pattern file {:?}", path))?;
                request = request.target_pattern(Some(pattern));
            }
            if execute {
                request = request.live(yes);
            }
            cmd_refactor(config, &request, report.as_deref()).await
        }
        Commands::Analyze {
            description,
            threshold,
            limit,
        } => {
            let threshold = threshold.unwrap_or(config.default_threshold);
            let limit = limit.unwrap_or(config.default_limit);
            cmd_analyze(config, &description, threshold, limit).await
        }
        Commands::Backup { action } => {
            let backups = BackupManager::new(config.backup_root(), config.project_root.clone());
            match action {
                BackupAction::List => cmd_backup_list(&backups),
                BackupAction::Restore { path } => cmd_backup_restore(&backups, &path),
            }
        }
    }
}

/// Asks on the terminal before each file is changed.
struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, step: &PlanStep) -> bool {
        print!("\n{}", render_step_prompt(step));
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("apply this change?")
            .default(false)
            .show_default(true)
            .wait_for_newline(true)
            .interact()
            .unwrap_or_else(|e| {
                warn!(error = %e, "confirmation prompt failed; skipping file");
                false
            })
    }
}

async fn cmd_refactor(
    config: RefactorConfig,
    request: &RefactorRequest,
    report_path: Option<&Path>,
) -> Result<()> {
    let pipeline = RefactorPipeline::from_config(config)?;

    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; remaining files will be skipped");
            on_interrupt.cancel();
        }
    });

    let confirmer: &dyn Confirmer = if request.auto_accept {
        &AutoAccept
    } else {
        &TerminalConfirmer
    };

    let report = pipeline
        .run(request, confirmer, Some(cancel))
        .await
        .context("Refactor run failed")?;

    print_matches(&report.matches);
    if let Some(analysis) = &report.analysis {
        print_analysis(analysis);
    }
    match &report.execution {
        Some(execution) => print!("\n{}", render_summary_md(execution)),
        None => println!("No patterns found below threshold {}", request.threshold),
    }

    if let Some(path) = report_path {
        write_report_json(path, &report)?;
        info!(path = ?path, "wrote run report");
    }

    if let Some(execution) = &report.execution {
        if !execution.failed.is_empty() {
            bail!("{} file(s) failed to refactor", execution.failed.len());
        }
    }
    Ok(())
}

async fn cmd_analyze(
    config: RefactorConfig,
    description: &str,
    threshold: f32,
    limit: usize,
) -> Result<()> {
    let pipeline = RefactorPipeline::from_config(config)?;
    let report = pipeline
        .analyze(description, threshold, limit)
        .await
        .context("Analysis failed")?;

    print_matches(&report.matches);
    match &report.analysis {
        Some(analysis) => print_analysis(analysis),
        None => println!("No patterns found below threshold {}", threshold),
    }
    Ok(())
}

fn cmd_backup_list(backups: &BackupManager) -> Result<()> {
    let list = backups.list_backups().context("Failed to list backups")?;
    if list.is_empty() {
        println!("No backups in {:?}", backups.backup_root());
        return Ok(());
    }
    for backup in list {
        println!(
            "{}  {:>4} file(s)  {}",
            backup.timestamp,
            backup.file_count,
            backup.path.display()
        );
    }
    Ok(())
}

fn cmd_backup_restore(backups: &BackupManager, path: &Path) -> Result<()> {
    let report = backups
        .restore_backup(path)
        .with_context(|| format!("Failed to restore backup {:?}", path))?;
    println!(
        "Restored {} file(s) from {}",
        report.restored_count(),
        report.backup_path.display()
    );
    Ok(())
}

fn print_matches(matches: &[PatternMatch]) {
    println!("Found {} similar pattern(s)", matches.len());
    for m in matches {
        println!(
            "  {:.3}  {}  ({} lines, {} symbols)",
            m.similarity_distance,
            m.file_path,
            m.line_count,
            m.symbol_count()
        );
    }
}

fn print_analysis(outcome: &AnalysisOutcome) {
    if outcome.is_degraded() {
        println!("\nAnalysis response could not be parsed; using it verbatim.");
    }
    let analysis = outcome.clone().into_analysis();
    println!("\nCommon patterns:");
    for p in &analysis.common_patterns {
        println!("  - {}", p);
    }
    if !analysis.variations.is_empty() {
        println!("Variations:");
        for v in &analysis.variations {
            println!("  - {}", v);
        }
    }
    if !analysis.refactoring_opportunities.is_empty() {
        println!("Opportunities:");
        for o in &analysis.refactoring_opportunities {
            println!("  - {}", o);
        }
    }
    println!("Suggested approach:\n{}", analysis.suggested_approach);
}
