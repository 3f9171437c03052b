//! Stats command - show store statistics.

use super::{format_size, load_config, open_database};
use anyhow::Result;
use colored::Colorize;
use sluice_core::FileClassification;
use sluice_db::Database;

pub fn run(job_id: Option<&str>) -> Result<()> {
    let (paths, _) = load_config()?;
    let db = open_database(&paths)?;
    run_with_db(&db, job_id)
}

/// Run stats with an existing database connection.
pub fn run_with_db(db: &Database, job_id: Option<&str>) -> Result<()> {
    let stats = db.get_stats()?;

    println!("{}", "Sluice Statistics".cyan().bold());
    println!("{}", "─".repeat(50));

    // Store
    println!();
    println!("{}", "Store".white().bold());
    println!("  Documents: {}", stats.total_documents.to_string().green());

    let mut formats: Vec<_> = stats.documents_by_format.iter().collect();
    formats.sort();
    for (format, count) in formats {
        println!("    {}: {}", format, count);
    }

    println!("  Chunks: {}", stats.total_chunks);
    println!("  Embedded chunks: {}", stats.embedded_chunks);

    // Outcomes
    println!();
    match job_id {
        Some(job) => println!("{} {}", "Outcomes for job".white().bold(), job.dimmed()),
        None => println!("{}", "Outcomes".white().bold()),
    }

    let summary = db.classification_summary(job_id)?;
    if summary.is_empty() {
        println!("  {}", "No ingestion records yet.".dimmed());
    } else {
        println!(
            "  {:<16} {:>8} {:>10} {:>12}",
            "classification", "files", "chunks", "avg time"
        );
        for row in &summary {
            let line = format!(
                "  {:<16} {:>8} {:>10} {:>10.0}ms",
                row.classification.as_str(),
                row.count,
                row.total_chunks,
                row.avg_processing_ms
            );
            match row.classification {
                FileClassification::Normal => println!("{}", line.green()),
                FileClassification::Timeout | FileClassification::Error => println!("{}", line.red()),
                _ => println!("{}", line.yellow()),
            }
        }
    }

    println!("  Records: {}", stats.stats_records);
    if stats.unresolved_failures > 0 {
        println!(
            "  Unresolved failures: {} (see 'sluice failed list')",
            stats.unresolved_failures.to_string().red()
        );
    }

    // Storage
    println!();
    println!("{}", "Storage".white().bold());
    println!("  Database size: {}", format_size(stats.database_size_bytes));

    Ok(())
}
