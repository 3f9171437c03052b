//! Configuration commands.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use sluice_config::Config;

pub fn show() -> Result<()> {
    let paths = get_paths()?;

    if !paths.config_file.exists() {
        anyhow::bail!("Config file not found. Run 'sluice init' first.");
    }

    // Surface validation errors before printing
    Config::load_from(&paths.config_file).context("Failed to load config")?;
    let contents = std::fs::read_to_string(&paths.config_file).context("Failed to read config file")?;

    println!("{}", "Current Configuration".cyan().bold());
    println!("{}", paths.config_file.display().to_string().as_str().dimmed());
    println!("{}", "─".repeat(50));
    println!("{}", contents);

    Ok(())
}

pub fn set(key: &str, value: &str) -> Result<()> {
    let paths = get_paths()?;

    let mut config = Config::load_from(&paths.config_file).context("Failed to load config")?;
    config.set_value(key, value)?;
    config.save_to(&paths.config_file).context("Failed to save config")?;

    println!("{} Set {} = {}", "✓".green(), key.cyan(), value);

    Ok(())
}

pub fn add_watch(path: &str) -> Result<()> {
    let paths = get_paths()?;

    let expanded = shellexpand::tilde(path);
    if !std::path::Path::new(expanded.as_ref()).is_dir() {
        anyhow::bail!("Directory does not exist: {}", expanded);
    }

    let mut config = Config::load_from(&paths.config_file).context("Failed to load config")?;

    if config.watch.directories.iter().any(|d| d == path) {
        println!("{} Directory already in watch list: {}", "Note:".yellow(), path);
        return Ok(());
    }

    config.add_watch_directory(path.to_string());
    config.save_to(&paths.config_file).context("Failed to save config")?;

    println!("{} Added watch directory: {}", "✓".green(), path);

    Ok(())
}
