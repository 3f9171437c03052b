//! Ingestion stats writes and analytics.

use super::failed::insert_failed_on;
use crate::database::Database;
use crate::error::{DbError, DbResult};
use rusqlite::params;
use sluice_core::{ClassificationStat, FailedFile, FileClassification, IngestionFileStats, StoreStats};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

impl Database {
    /// Write a batch of stats records in one transaction.
    ///
    /// Records with `success == false` are mirrored into `failed_files`.
    pub fn bulk_insert_stats(&self, records: &[IngestionFileStats]) -> DbResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut failed = 0;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO ingestion_file_stats (
                    id, file_path, file_name, file_size, started_at, completed_at,
                    processing_time_ms, chunks_created, success, error_type, error_message,
                    timeout_seconds, profile_key, job_id, content_hash, file_modified_at, classification
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                "#,
            )?;

            for record in records {
                stmt.execute(params![
                    record.id,
                    record.file_path,
                    record.file_name,
                    record.file_size as i64,
                    record.started_at.to_rfc3339(),
                    record.completed_at.to_rfc3339(),
                    record.processing_time_ms as i64,
                    record.chunks_created as i64,
                    record.success,
                    record.error_type.map(|e| e.as_str()),
                    record.error_message,
                    record.timeout_seconds,
                    record.profile_key,
                    record.job_id,
                    record.content_hash,
                    record.file_modified_at.map(|dt| dt.to_rfc3339()),
                    record.classification.as_str(),
                ])?;

                if !record.success {
                    insert_failed_on(&tx, &FailedFile::from_stats(record))?;
                    failed += 1;
                }
            }
        }

        tx.commit()?;
        debug!("Wrote {} stats records ({} failed)", records.len(), failed);
        Ok(records.len())
    }

    /// Counts, chunk totals and average processing time per classification.
    pub fn classification_summary(&self, job_id: Option<&str>) -> DbResult<Vec<ClassificationStat>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT classification, COUNT(*), COALESCE(SUM(chunks_created), 0),
                   COALESCE(AVG(processing_time_ms), 0.0)
            FROM ingestion_file_stats
            WHERE (?1 IS NULL OR job_id = ?1)
            GROUP BY classification
            ORDER BY COUNT(*) DESC
            "#,
        )?;

        let rows = stmt.query_map(params![job_id], |row| {
            let classification: String = row.get(0)?;
            Ok((
                classification,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        let mut summary = Vec::new();
        for row in rows {
            let (classification, count, total_chunks, avg_processing_ms) = row?;
            let classification = FileClassification::from_str(&classification)
                .map_err(|e| DbError::Other(e.to_string()))?;
            summary.push(ClassificationStat {
                classification,
                count,
                total_chunks,
                avg_processing_ms,
            });
        }
        Ok(summary)
    }

    /// Store-wide counters.
    pub fn get_stats(&self) -> DbResult<StoreStats> {
        let conn = self.conn()?;

        let total_documents: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;

        let mut documents_by_format = HashMap::new();
        {
            let mut stmt = conn.prepare("SELECT format, COUNT(*) FROM documents GROUP BY format")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (format, count) = row?;
                documents_by_format.insert(format, count);
            }
        }

        let total_chunks: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        let embedded_chunks: i64 =
            conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        let stats_records: i64 =
            conn.query_row("SELECT COUNT(*) FROM ingestion_file_stats", [], |row| row.get(0))?;
        let unresolved_failures: i64 = conn.query_row(
            "SELECT COUNT(*) FROM failed_files WHERE resolved = 0",
            [],
            |row| row.get(0),
        )?;

        let page_count: i64 = conn.pragma_query_value(None, "page_count", |row| row.get(0))?;
        let page_size: i64 = conn.pragma_query_value(None, "page_size", |row| row.get(0))?;

        Ok(StoreStats {
            total_documents,
            documents_by_format,
            total_chunks,
            embedded_chunks,
            stats_records,
            unresolved_failures,
            database_size_bytes: page_count * page_size,
        })
    }
}
