//! Watch command implementation.

use super::ingest::{execute, print_report};
use super::{load_config, open_database};
use anyhow::{Context, Result};
use colored::Colorize;
use sluice_config::Config;
use sluice_core::new_id;
use sluice_ingest::{changed_paths, FileWatcher, WatchEvent, WatcherConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{error, info, warn};

/// Watch the configured directories and run one ingestion per debounced batch.
pub fn run() -> Result<()> {
    let (paths, config) = load_config()?;

    if config.watch.directories.is_empty() {
        println!("{}", "No watch directories configured.".yellow());
        println!("Add directories with: sluice config add-watch <path>");
        return Ok(());
    }

    let db = Arc::new(open_database(&paths)?);

    println!("{}", "Starting file watcher...".cyan());
    println!("Watching directories:");
    for dir in &config.watch.directories {
        let expanded = shellexpand::tilde(dir);
        if std::path::Path::new(expanded.as_ref()).exists() {
            println!("  {} {}", "+".green(), dir);
        } else {
            println!("  {} {} (not found)", "-".red(), dir);
        }
    }
    println!("\nPress Ctrl+C to stop.\n");

    let watcher_config = WatcherConfig::from_config(&config.watch, &config.ingest.ignore_patterns);
    let mut watcher = FileWatcher::new(watcher_config)?;
    if watcher.start()? == 0 {
        anyhow::bail!("None of the watch directories exist");
    }

    let rt = Runtime::new().context("Failed to create async runtime")?;
    rt.block_on(async {
        let mut current = config;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!("\n{}", "Stopping watcher.".cyan());
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(250)) => {}
            }

            let events = watcher.poll();
            for event in &events {
                match event {
                    WatchEvent::FileChanged { path, format } => {
                        println!("{} {} [{}]", "Changed:".green(), path.display(), format);
                    }
                    WatchEvent::FileDeleted { path } => {
                        // Stored documents are kept when their source disappears
                        println!("{} {}", "Deleted:".yellow(), path.display());
                    }
                    WatchEvent::Error(msg) => {
                        error!("Watch error: {}", msg);
                        println!("{} {}", "Watch error:".red(), msg);
                    }
                }
            }

            let files = changed_paths(&events);
            if files.is_empty() {
                continue;
            }

            current = reload(&paths.config_file, current);
            let job_id = new_id();
            info!("Ingesting {} changed files as job {}", files.len(), job_id);
            match execute(&current, db.clone(), files, None, &job_id).await {
                Ok(report) => print_report(&report, &job_id),
                Err(e) => {
                    error!("Ingestion run failed: {}", e);
                    println!("{} {}", "Error:".red().bold(), e);
                }
            }
        }
    });

    Ok(())
}

/// Pick up config edits between runs; keep the previous config if the file is invalid.
fn reload(path: &std::path::Path, previous: Config) -> Config {
    match Config::load_from(path) {
        Ok(config) => config,
        Err(e) => {
            warn!("Keeping previous config, reload failed: {}", e);
            previous
        }
    }
}
