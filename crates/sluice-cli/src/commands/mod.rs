//! CLI command implementations.

pub mod config;
pub mod failed;
pub mod ingest;
pub mod init;
pub mod stats;
pub mod tools;
pub mod watch;

use anyhow::{Context, Result};
use sluice_config::{AppPaths, Config};
use sluice_db::Database;

/// Get the application paths.
pub fn get_paths() -> Result<AppPaths> {
    AppPaths::new().context("Failed to determine application directories")
}

/// Load the config file and apply its data directory override.
pub fn load_config() -> Result<(AppPaths, Config)> {
    let paths = get_paths()?;
    let config = Config::load_from(&paths.config_file).context("Failed to load config")?;

    let paths = match config.general.data_dir.as_deref() {
        Some(dir) => paths.with_data_dir(shellexpand::tilde(dir).as_ref()),
        None => paths,
    };
    Ok((paths, config))
}

/// Get a database connection, ensuring sluice is initialized.
pub fn open_database(paths: &AppPaths) -> Result<Database> {
    if !paths.is_initialized() {
        anyhow::bail!("Sluice is not initialized. Run 'sluice init' first.");
    }

    Database::open(&paths.database_file).context("Failed to open database")
}

/// Format a file size in human-readable form.
pub fn format_size(bytes: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = KB * 1024;
    const GB: i64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
