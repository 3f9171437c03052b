//! Per-file results, audit records, and run summaries.

use crate::classify::{ErrorType, FileClassification};
use crate::types::{new_id, DocumentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix of the error string carried by duplicate results.
pub const DUPLICATE_PREFIX: &str = "Duplicate of: ";

/// Outcome of one attempted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    pub source_path: String,
    /// Empty unless a document was persisted.
    pub document_id: DocumentId,
    pub title: String,
    pub chunks_created: usize,
    pub processing_time_ms: u64,
    pub errors: Vec<String>,
    pub error_type: Option<ErrorType>,
    pub content_hash: Option<String>,
}

impl IngestionResult {
    /// A persisted document.
    pub fn persisted(
        source_path: impl Into<String>,
        document_id: DocumentId,
        title: impl Into<String>,
        chunks_created: usize,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            document_id,
            title: title.into(),
            chunks_created,
            processing_time_ms: 0,
            errors: Vec::new(),
            error_type: None,
            content_hash: None,
        }
    }

    /// A file that ended without a persisted document.
    pub fn failed(
        source_path: impl Into<String>,
        title: impl Into<String>,
        error_type: ErrorType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            document_id: String::new(),
            title: title.into(),
            chunks_created: 0,
            processing_time_ms: 0,
            errors: vec![message.into()],
            error_type: Some(error_type),
            content_hash: None,
        }
    }

    /// Content already stored under `canonical_path`.
    pub fn duplicate(
        source_path: impl Into<String>,
        title: impl Into<String>,
        canonical_path: &str,
    ) -> Self {
        Self::failed(
            source_path,
            title,
            ErrorType::Duplicate,
            format!("{}{}", DUPLICATE_PREFIX, canonical_path),
        )
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_processing_time(mut self, ms: u64) -> Self {
        self.processing_time_ms = ms;
        self
    }

    pub fn classification(&self) -> FileClassification {
        FileClassification::from_outcome(self.error_type, self.chunks_created)
    }

    pub fn is_duplicate(&self) -> bool {
        self.error_type == Some(ErrorType::Duplicate)
    }

    /// First error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.errors.first().map(|s| s.as_str())
    }
}

/// Durable audit record of one terminal file attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionFileStats {
    pub id: String,
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub chunks_created: usize,
    pub success: bool,
    pub error_type: Option<ErrorType>,
    pub error_message: Option<String>,
    pub timeout_seconds: f64,
    pub profile_key: String,
    pub job_id: Option<String>,
    pub content_hash: Option<String>,
    pub file_modified_at: Option<DateTime<Utc>>,
    pub classification: FileClassification,
}

impl IngestionFileStats {
    /// Build the audit record for a finished attempt.
    ///
    /// `success` and `classification` are derived from the result.
    pub fn from_result(
        result: &IngestionResult,
        file: &FileFacts,
        started_at: DateTime<Utc>,
        timeout_seconds: f64,
        profile_key: &str,
        job_id: Option<&str>,
    ) -> Self {
        let classification = result.classification();
        let file_name = std::path::Path::new(&result.source_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| result.source_path.clone());

        Self {
            id: new_id(),
            file_path: result.source_path.clone(),
            file_name,
            file_size: file.size,
            started_at,
            completed_at: Utc::now(),
            processing_time_ms: result.processing_time_ms,
            chunks_created: result.chunks_created,
            success: classification.is_success(),
            error_type: result.error_type,
            error_message: result.error_message().map(|s| s.to_string()),
            timeout_seconds,
            profile_key: profile_key.to_string(),
            job_id: job_id.map(|s| s.to_string()),
            content_hash: result.content_hash.clone(),
            file_modified_at: file.modified_at,
            classification,
        }
    }
}

/// Filesystem facts captured before processing.
#[derive(Debug, Clone, Default)]
pub struct FileFacts {
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

/// A failed file awaiting operator triage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedFile {
    pub id: String,
    pub file_path: String,
    pub classification: FileClassification,
    pub error_type: Option<ErrorType>,
    pub error_message: Option<String>,
    pub profile_key: String,
    pub job_id: Option<String>,
    pub failed_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl FailedFile {
    /// Mirror a failed stats record.
    pub fn from_stats(stats: &IngestionFileStats) -> Self {
        Self {
            id: new_id(),
            file_path: stats.file_path.clone(),
            classification: stats.classification,
            error_type: stats.error_type,
            error_message: stats.error_message.clone(),
            profile_key: stats.profile_key.clone(),
            job_id: stats.job_id.clone(),
            failed_at: stats.completed_at,
            resolved: false,
            resolved_at: None,
        }
    }
}

/// Aggregate counts for a finished run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub by_classification: BTreeMap<String, usize>,
    pub total_chunks: usize,
    pub duplicates: usize,
    pub files_processed: usize,
    pub not_started: usize,
    pub stopped: bool,
}

impl RunSummary {
    /// Tally a set of results.
    pub fn from_results(results: &[IngestionResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            *summary
                .by_classification
                .entry(result.classification().as_str().to_string())
                .or_insert(0) += 1;
            summary.total_chunks += result.chunks_created;
            if result.is_duplicate() {
                summary.duplicates += 1;
            }
            summary.files_processed += 1;
        }
        summary
    }

    pub fn count(&self, classification: FileClassification) -> usize {
        self.by_classification
            .get(classification.as_str())
            .copied()
            .unwrap_or(0)
    }
}

/// Per-classification aggregate over the stats table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationStat {
    pub classification: FileClassification,
    pub count: i64,
    pub total_chunks: i64,
    pub avg_processing_ms: f64,
}

/// Store-wide counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_documents: i64,
    pub documents_by_format: std::collections::HashMap<String, i64>,
    pub total_chunks: i64,
    pub embedded_chunks: i64,
    pub stats_records: i64,
    pub unresolved_failures: i64,
    pub database_size_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_result() {
        let result = IngestionResult::duplicate("/b.txt", "b", "/a.txt");

        assert!(result.is_duplicate());
        assert!(result.document_id.is_empty());
        assert_eq!(result.errors, vec!["Duplicate of: /a.txt".to_string()]);
        assert_eq!(result.classification(), FileClassification::Normal);
    }

    #[test]
    fn test_stats_from_result() {
        let result = IngestionResult::failed("/tmp/scan.pdf", "scan", ErrorType::ImageOnlyPdf, "no text")
            .with_hash("abc")
            .with_processing_time(12);
        let facts = FileFacts { size: 2048, modified_at: None };

        let stats = IngestionFileStats::from_result(&result, &facts, Utc::now(), 270.0, "default", Some("job-1"));

        assert_eq!(stats.file_name, "scan.pdf");
        assert!(!stats.success);
        assert_eq!(stats.classification, FileClassification::ImageOnlyPdf);
        assert_eq!(stats.error_type, Some(ErrorType::ImageOnlyPdf));
        assert_eq!(stats.timeout_seconds, 270.0);
        assert_eq!(stats.job_id.as_deref(), Some("job-1"));
        assert_eq!(stats.content_hash.as_deref(), Some("abc"));
    }

    #[test]
    fn test_duplicate_stats_count_as_success() {
        let result = IngestionResult::duplicate("/b.txt", "b", "/a.txt");
        let stats = IngestionFileStats::from_result(&result, &FileFacts::default(), Utc::now(), 120.0, "p", None);
        assert!(stats.success);
    }

    #[test]
    fn test_summary() {
        let results = vec![
            IngestionResult::persisted("/a", "id1".into(), "a", 3),
            IngestionResult::duplicate("/b", "b", "/a"),
            IngestionResult::failed("/c", "c", ErrorType::Timeout, "deadline"),
        ];
        let summary = RunSummary::from_results(&results);

        assert_eq!(summary.count(FileClassification::Normal), 2);
        assert_eq!(summary.count(FileClassification::Timeout), 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.total_chunks, 3);
        assert_eq!(summary.files_processed, 3);
    }
}
