//! External tool availability.

use anyhow::Result;
use colored::Colorize;
use sluice_core::FileFormat;
use std::path::PathBuf;

pub fn run() -> Result<()> {
    print_tool_status();
    Ok(())
}

pub fn print_tool_status() {
    println!("{}", "Processing tools".white().bold());
    for (tool, available) in sluice_process::check_dependencies() {
        if available {
            println!("  {} {}", "✓".green(), tool);
        } else {
            println!("  {} {} {}", "✗".red(), tool, "(not found)".dimmed());
        }
    }
}

/// Warn when a batch contains media or images but the tools they need are missing.
pub fn warn_if_missing(files: &[PathBuf]) {
    let needs_tools = files.iter().any(|f| {
        matches!(
            FileFormat::from_path(f),
            Some(FileFormat::Audio | FileFormat::Video | FileFormat::Image)
        )
    });
    if !needs_tools {
        return;
    }

    let missing: Vec<_> = sluice_process::check_dependencies()
        .into_iter()
        .filter(|(_, available)| !available)
        .map(|(tool, _)| tool)
        .collect();
    if !missing.is_empty() {
        println!(
            "{} missing tools: {}. Media and image files may fail.",
            "Warning:".yellow().bold(),
            missing.join(", ")
        );
    }
}
