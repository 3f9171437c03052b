//! Error types for the ingestion pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that can occur during ingestion.
///
/// Inside a file task every variant is folded into that file's result.
/// Only [`IngestError::Setup`] and store failures at run boundaries abort a run.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sluice_db::DbError),

    #[error("Config error: {0}")]
    Config(#[from] sluice_config::ConfigError),

    #[error("{0}")]
    Process(#[from] sluice_process::ProcessError),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] sluice_embed::EmbedError),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Parse error for {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Run setup failed: {0}")]
    Setup(String),

    #[error("Processing error: {0}")]
    ProcessingError(String),
}
