//! Initialize sluice.

use super::load_config;
use anyhow::{Context, Result};
use colored::Colorize;
use sluice_config::Config;
use sluice_db::Database;

pub fn run() -> Result<()> {
    let (paths, _) = load_config()?;

    // Check if already initialized
    if paths.is_initialized() {
        println!("{} Sluice is already initialized.", "Note:".yellow().bold());
        println!("  Config: {}", paths.config_file.display());
        println!("  Database: {}", paths.database_file.display());
        return Ok(());
    }

    println!("{}", "Initializing sluice...".cyan().bold());

    paths.ensure_dirs().context("Failed to create directories")?;
    println!("  {} Created directories", "✓".green());

    if !paths.config_file.exists() {
        Config::create_default_file(&paths.config_file).context("Failed to create config file")?;
        println!("  {} Created config: {}", "✓".green(), paths.config_file.display());
    }

    let _db = Database::open(&paths.database_file).context("Failed to initialize database")?;
    println!("  {} Created database: {}", "✓".green(), paths.database_file.display());

    println!();
    super::tools::print_tool_status();

    println!();
    println!("{}", "Sluice initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Ingest a folder: {}", "sluice ingest ~/Documents/papers".cyan());
    println!("  2. Add watch directories: {}", "sluice config add-watch ~/Inbox".cyan());
    println!("  3. Check results: {}", "sluice stats".cyan());

    Ok(())
}
