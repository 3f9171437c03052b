//! Buffered per-file audit records.

use crate::error::IngestResult;
use crate::store::DocumentStore;
use sluice_core::IngestionFileStats;
use std::sync::Mutex;
use tracing::{debug, info};

/// Collects stats records during a run and writes them in one batch.
#[derive(Debug, Default)]
pub struct StatsSink {
    buffer: Mutex<Vec<IngestionFileStats>>,
}

impl StatsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, stats: IngestionFileStats) {
        debug!(
            "Recording stats for {} ({})",
            stats.file_name, stats.classification
        );
        self.lock().push(stats);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return everything buffered so far.
    pub fn take(&self) -> Vec<IngestionFileStats> {
        std::mem::take(&mut *self.lock())
    }

    /// Write the buffer in a single transaction.
    ///
    /// Failed records are mirrored into the failed-files ledger by the store.
    /// On error the records are put back so a later flush can retry.
    pub fn flush(&self, store: &dyn DocumentStore) -> IngestResult<usize> {
        let records = self.take();
        if records.is_empty() {
            return Ok(0);
        }

        match store.bulk_insert_stats(&records) {
            Ok(written) => {
                info!("Wrote {} ingestion stats records", written);
                Ok(written)
            }
            Err(e) => {
                let mut buffer = self.lock();
                let newer = std::mem::replace(&mut *buffer, records);
                buffer.extend(newer);
                Err(e)
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<IngestionFileStats>> {
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sluice_core::{ErrorType, FileClassification, FileFacts, IngestionResult};
    use sluice_db::Database;

    fn stats_for(result: &IngestionResult) -> IngestionFileStats {
        IngestionFileStats::from_result(result, &FileFacts::default(), Utc::now(), 120.0, "default", Some("job-1"))
    }

    #[test]
    fn test_flush_writes_once_and_mirrors_failures() {
        let db = Database::open_in_memory().unwrap();
        let sink = StatsSink::new();

        sink.record(stats_for(&IngestionResult::persisted("/a.txt", "d1".into(), "a", 3)));
        sink.record(stats_for(&IngestionResult::failed("/b.pdf", "b", ErrorType::ImageOnlyPdf, "scanned")));
        sink.record(stats_for(&IngestionResult::duplicate("/c.txt", "c", "/a.txt")));
        assert_eq!(sink.len(), 3);

        assert_eq!(sink.flush(&db).unwrap(), 3);
        assert!(sink.is_empty());
        assert_eq!(sink.flush(&db).unwrap(), 0);

        let failed = db.list_failed_files(None, false).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].file_path, "/b.pdf");
        assert_eq!(failed[0].classification, FileClassification::ImageOnlyPdf);
        assert!(!failed[0].resolved);
    }
}
