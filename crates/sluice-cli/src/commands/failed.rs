//! Failed-file triage.

use super::ingest::{execute, print_report};
use super::{load_config, open_database};
use anyhow::{Context, Result};
use colored::Colorize;
use sluice_core::{new_id, FileClassification};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn parse_classification(value: &str) -> Result<FileClassification> {
    let classification: FileClassification = value.parse()?;
    if classification.is_success() || classification == FileClassification::Pending {
        anyhow::bail!("'{}' is not a failure classification", value);
    }
    Ok(classification)
}

pub fn list(classification: Option<&str>, include_resolved: bool) -> Result<()> {
    let (paths, _) = load_config()?;
    let db = open_database(&paths)?;

    let filter = classification.map(parse_classification).transpose()?;
    let failed = db.list_failed_files(filter, include_resolved)?;

    if failed.is_empty() {
        println!("{}", "No failed files.".green());
        return Ok(());
    }

    println!("{} ({})", "Failed files".cyan().bold(), failed.len());
    println!("{}", "─".repeat(50));
    for entry in &failed {
        let status = if entry.resolved {
            "resolved".green()
        } else {
            "open".red()
        };
        println!(
            "{} [{}] {} {}",
            entry.failed_at.format("%Y-%m-%d %H:%M"),
            entry.classification.as_str().yellow(),
            entry.file_path,
            status
        );
        if let Some(ref message) = entry.error_message {
            println!("    {}", message.as_str().dimmed());
        }
    }

    Ok(())
}

/// Re-ingest every unresolved file of a classification; successes are marked resolved.
pub fn retry(classification: &str, concurrency: Option<usize>) -> Result<()> {
    let (paths, config) = load_config()?;
    let db = Arc::new(open_database(&paths)?);
    let classification = parse_classification(classification)?;

    let mut files = Vec::new();
    let mut missing = Vec::new();
    for path in db.unresolved_paths(classification)? {
        let path = PathBuf::from(path);
        if path.exists() {
            files.push(path);
        } else {
            missing.push(path);
        }
    }

    for path in &missing {
        println!("{} {} (no longer exists)", "Skipping:".yellow(), path.display());
    }
    if files.is_empty() {
        println!("{}", format!("No unresolved {} files to retry.", classification).yellow());
        return Ok(());
    }

    println!("Retrying {} {} files", files.len(), classification);
    sluice_ingest::sort_for_scheduling(&mut files);

    let job_id = new_id();
    let rt = Runtime::new().context("Failed to create async runtime")?;
    let report = rt.block_on(execute(&config, db.clone(), files, concurrency, &job_id))?;

    let mut resolved = 0;
    for result in report.results.iter().filter(|r| r.classification().is_success()) {
        resolved += db.mark_resolved(&result.source_path)?.min(1);
    }

    print_report(&report, &job_id);
    println!("{} {} files", "Resolved:".green().bold(), resolved);

    Ok(())
}
