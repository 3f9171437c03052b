//! Outcome taxonomy for processed files.
//!
//! Every file attempt ends with an optional [`ErrorType`] and a chunk count.
//! [`FileClassification::from_outcome`] is the only place a classification is
//! derived from those two values.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Why a file attempt did not end as a plain success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Deadline exceeded on the final attempt.
    Timeout,
    /// Unclassified failure.
    Error,
    /// Conversion or chunking produced nothing usable.
    NoChunks,
    /// PDF with no extractable text layer, skipped before conversion.
    ImageOnlyPdf,
    /// Content already present under another path.
    Duplicate,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Timeout => "timeout",
            ErrorType::Error => "error",
            ErrorType::NoChunks => "no_chunks",
            ErrorType::ImageOnlyPdf => "image_only_pdf",
            ErrorType::Duplicate => "duplicate",
        }
    }
}

impl FromStr for ErrorType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeout" => Ok(ErrorType::Timeout),
            "error" => Ok(ErrorType::Error),
            "no_chunks" => Ok(ErrorType::NoChunks),
            "image_only_pdf" => Ok(ErrorType::ImageOnlyPdf),
            "duplicate" => Ok(ErrorType::Duplicate),
            other => Err(Error::InvalidInput(format!("unknown error type: {}", other))),
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal outcome tag for a processed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileClassification {
    #[default]
    Pending,
    Normal,
    ImageOnlyPdf,
    NoChunks,
    Timeout,
    Error,
}

impl FileClassification {
    /// All classifications, in display order.
    pub const ALL: [FileClassification; 6] = [
        FileClassification::Pending,
        FileClassification::Normal,
        FileClassification::ImageOnlyPdf,
        FileClassification::NoChunks,
        FileClassification::Timeout,
        FileClassification::Error,
    ];

    /// Derive the classification of an attempt.
    ///
    /// Duplicates map to `Normal`: the content is already represented.
    pub fn from_outcome(error_type: Option<ErrorType>, chunks_created: usize) -> Self {
        match error_type {
            None if chunks_created > 0 => FileClassification::Normal,
            None => FileClassification::NoChunks,
            Some(ErrorType::Duplicate) => FileClassification::Normal,
            Some(ErrorType::ImageOnlyPdf) => FileClassification::ImageOnlyPdf,
            Some(ErrorType::NoChunks) => FileClassification::NoChunks,
            Some(ErrorType::Timeout) => FileClassification::Timeout,
            Some(ErrorType::Error) => FileClassification::Error,
        }
    }

    /// Whether a file with this classification counts as successfully ingested.
    pub fn is_success(&self) -> bool {
        matches!(self, FileClassification::Normal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileClassification::Pending => "pending",
            FileClassification::Normal => "normal",
            FileClassification::ImageOnlyPdf => "image_only_pdf",
            FileClassification::NoChunks => "no_chunks",
            FileClassification::Timeout => "timeout",
            FileClassification::Error => "error",
        }
    }
}

impl FromStr for FileClassification {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s.to_lowercase())
            .ok_or_else(|| Error::InvalidInput(format!("unknown classification: {}", s)))
    }
}

impl std::fmt::Display for FileClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
