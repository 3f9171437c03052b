//! Ingest command implementation.

use super::{load_config, open_database};
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sluice_config::Config;
use sluice_core::{new_id, FileClassification, FileFormat};
use sluice_db::Database;
use sluice_ingest::{
    discover_files, DiscoveryOptions, IngestComponents, IngestionScheduler, ProgressEvent, RunReport,
    SchedulerConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;

/// Ingest a single file or directory.
pub fn run(
    path: &str,
    concurrency: Option<usize>,
    force: bool,
    dry_run: bool,
    job_id: Option<String>,
) -> Result<()> {
    let (paths, config) = load_config()?;
    let db = Arc::new(open_database(&paths)?);

    let expanded = shellexpand::tilde(path);
    let root = std::fs::canonicalize(expanded.as_ref())
        .with_context(|| format!("Path does not exist: {}", path))?;

    let mut options = DiscoveryOptions::with_patterns(&config.ingest.ignore_patterns);
    if !force {
        options = options.with_skip_existing(db.find_existing_sources()?);
    }

    println!("{} {}", "Scanning:".cyan(), root.display());
    let files = discover_files(&root, &options)?;

    if files.is_empty() {
        println!("{}", "No new supported files found.".yellow());
        if !force {
            println!("Use {} to re-check files already in the store.", "--force".cyan());
        }
        return Ok(());
    }

    println!("Found {} files", files.len());

    if dry_run {
        for file in &files {
            let format = FileFormat::from_path(file)
                .map(|f| f.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("  {} [{}]", file.display(), format);
        }
        println!("\n{}", "Dry run - no files were ingested.".cyan());
        return Ok(());
    }

    super::tools::warn_if_missing(&files);

    let job_id = job_id.unwrap_or_else(new_id);
    let rt = Runtime::new().context("Failed to create async runtime")?;
    let report = rt.block_on(execute(&config, db, files, concurrency, &job_id))?;

    print_report(&report, &job_id);
    Ok(())
}

/// Run one scheduler pass with a progress bar. Ctrl+C stops dispatching new files.
pub async fn execute(
    config: &Config,
    db: Arc<Database>,
    files: Vec<PathBuf>,
    concurrency: Option<usize>,
    job_id: &str,
) -> Result<RunReport> {
    let components = IngestComponents::from_config(config, db)?;

    let mut scheduler_config = SchedulerConfig::from_config(config).with_job_id(job_id);
    if let Some(n) = concurrency {
        scheduler_config = scheduler_config.with_concurrency(n);
    }
    info!(
        "Job {}: {} files, concurrency {}",
        job_id,
        files.len(),
        scheduler_config.max_concurrency
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let bar = pb.clone();
    let scheduler = IngestionScheduler::new(components, scheduler_config).with_progress(Arc::new(
        move |event: &ProgressEvent| {
            let name = Path::new(&event.path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| event.path.clone());
            bar.set_position(event.processed as u64);
            bar.set_message(format!("{} [{}]", name, event.classification));
        },
    ));

    let control = scheduler.control();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            control.stop();
        }
    });

    let report = scheduler.run(files).await;
    interrupt.abort();
    pb.finish_and_clear();

    Ok(report?)
}

/// Print the per-classification summary and the failures of a run.
pub fn print_report(report: &RunReport, job_id: &str) {
    let summary = &report.summary;

    println!();
    println!("{} {}", "Job:".white().bold(), job_id.dimmed());
    for classification in FileClassification::ALL {
        let count = summary.count(classification);
        if count == 0 {
            continue;
        }
        let label = format!("{:>16}", classification.as_str());
        let label = match classification {
            FileClassification::Normal => label.as_str().green(),
            FileClassification::Timeout | FileClassification::Error => label.as_str().red(),
            _ => label.as_str().yellow(),
        };
        println!("  {} {}", label, count);
    }

    let ingested = summary
        .count(FileClassification::Normal)
        .saturating_sub(report.duplicates_skipped);
    println!();
    println!("{} {} files ({} chunks)", "Ingested:".green().bold(), ingested, summary.total_chunks);
    if report.duplicates_skipped > 0 {
        println!(
            "{} {} files (content already stored)",
            "Skipped:".yellow().bold(),
            report.duplicates_skipped
        );
    }

    let failures: Vec<_> = report
        .results
        .iter()
        .filter(|r| !r.classification().is_success())
        .collect();
    if !failures.is_empty() {
        println!("{} {} files", "Failed:".red().bold(), failures.len());
        for result in failures.iter().take(10) {
            println!(
                "  {} [{}] {}",
                result.source_path,
                result.classification(),
                result.error_message().unwrap_or("").dimmed()
            );
        }
        if failures.len() > 10 {
            println!("  ... and {} more (see 'sluice failed list')", failures.len() - 10);
        }
    }

    if summary.stopped {
        println!(
            "{} {} files not started",
            "Stopped:".yellow().bold(),
            report.not_started.len()
        );
    }
    println!("{} stats records written", report.stats_written);
}
