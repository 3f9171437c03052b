//! Failed-file ledger.

use super::{parse_optional_timestamp, parse_timestamp};
use crate::database::Database;
use crate::error::{DbError, DbResult};
use chrono::Utc;
use rusqlite::{params, Connection};
use sluice_core::{ErrorType, FailedFile, FileClassification};
use std::str::FromStr;

impl Database {
    /// List failed files, newest first.
    pub fn list_failed_files(
        &self,
        classification: Option<FileClassification>,
        include_resolved: bool,
    ) -> DbResult<Vec<FailedFile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, file_path, classification, error_type, error_message, profile_key,
                   job_id, failed_at, resolved, resolved_at
            FROM failed_files
            WHERE (?1 IS NULL OR classification = ?1)
              AND (?2 OR resolved = 0)
            ORDER BY failed_at DESC
            "#,
        )?;

        let rows = stmt.query_map(
            params![classification.map(|c| c.as_str()), include_resolved],
            row_to_failed,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Distinct unresolved file paths for a classification.
    pub fn unresolved_paths(&self, classification: FileClassification) -> DbResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT file_path FROM failed_files
             WHERE classification = ?1 AND resolved = 0 ORDER BY file_path",
        )?;
        let rows = stmt.query_map(params![classification.as_str()], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Mark every unresolved entry for a path as resolved.
    pub fn mark_resolved(&self, file_path: &str) -> DbResult<usize> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE failed_files SET resolved = 1, resolved_at = ?2
             WHERE file_path = ?1 AND resolved = 0",
            params![file_path, Utc::now().to_rfc3339()],
        )?;
        Ok(rows)
    }
}

pub(crate) fn insert_failed_on(conn: &Connection, failed: &FailedFile) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO failed_files (id, file_path, classification, error_type, error_message,
                                  profile_key, job_id, failed_at, resolved, resolved_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            failed.id,
            failed.file_path,
            failed.classification.as_str(),
            failed.error_type.map(|e| e.as_str()),
            failed.error_message,
            failed.profile_key,
            failed.job_id,
            failed.failed_at.to_rfc3339(),
            failed.resolved,
            failed.resolved_at.map(|dt| dt.to_rfc3339()),
        ],
    )?;
    Ok(())
}

fn row_to_failed(row: &rusqlite::Row) -> rusqlite::Result<FailedFile> {
    let classification: String = row.get(2)?;
    let error_type: Option<String> = row.get(3)?;
    let failed_at: String = row.get(7)?;

    Ok(FailedFile {
        id: row.get(0)?,
        file_path: row.get(1)?,
        classification: FileClassification::from_str(&classification).unwrap_or_default(),
        error_type: error_type.and_then(|s| ErrorType::from_str(&s).ok()),
        error_message: row.get(4)?,
        profile_key: row.get(5)?,
        job_id: row.get(6)?,
        failed_at: parse_timestamp(&failed_at),
        resolved: row.get(8)?,
        resolved_at: parse_optional_timestamp(row.get(9)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sluice_core::{FileFacts, IngestionFileStats, IngestionResult};

    fn failure(path: &str, error_type: ErrorType) -> IngestionFileStats {
        let result = IngestionResult::failed(path, "t", error_type, "failed");
        IngestionFileStats::from_result(&result, &FileFacts::default(), Utc::now(), 120.0, "p", None)
    }

    #[test]
    fn test_filter_and_resolve() {
        let db = Database::open_in_memory().unwrap();
        db.bulk_insert_stats(&[
            failure("/slow.pdf", ErrorType::Timeout),
            failure("/scan.pdf", ErrorType::ImageOnlyPdf),
            failure("/slow2.pdf", ErrorType::Timeout),
        ])
        .unwrap();

        let timeouts = db
            .list_failed_files(Some(FileClassification::Timeout), false)
            .unwrap();
        assert_eq!(timeouts.len(), 2);
        assert_eq!(timeouts[0].error_type, Some(ErrorType::Timeout));

        assert_eq!(
            db.unresolved_paths(FileClassification::Timeout).unwrap(),
            vec!["/slow.pdf".to_string(), "/slow2.pdf".to_string()]
        );

        assert_eq!(db.mark_resolved("/slow.pdf").unwrap(), 1);
        assert_eq!(db.mark_resolved("/slow.pdf").unwrap(), 0);

        let open = db.list_failed_files(Some(FileClassification::Timeout), false).unwrap();
        assert_eq!(open.len(), 1);

        let all = db.list_failed_files(Some(FileClassification::Timeout), true).unwrap();
        assert_eq!(all.len(), 2);
        let resolved = all.iter().find(|f| f.file_path == "/slow.pdf").unwrap();
        assert!(resolved.resolved);
        assert!(resolved.resolved_at.is_some());
    }
}
