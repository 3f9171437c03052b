//! Database migrations and schema management.

use crate::error::DbResult;
use rusqlite::Connection;
use tracing::info;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> DbResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating initial database schema...");
        create_initial_schema(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database from version {} to {}",
            current_version, SCHEMA_VERSION
        );
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> DbResult<()> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

fn create_initial_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- Ingested documents
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            source_path TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            format TEXT NOT NULL,
            file_size INTEGER NOT NULL DEFAULT 0,
            profile_key TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            metadata TEXT DEFAULT '{}'
        );

        CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source_path);
        CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(content_hash);

        -- Chunked text
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            start_time REAL,
            end_time REAL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);

        -- Vector embeddings (little-endian f32 BLOB)
        CREATE TABLE IF NOT EXISTS embeddings (
            chunk_id TEXT PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
            vector BLOB NOT NULL,
            model TEXT NOT NULL,
            dimensions INTEGER NOT NULL
        );

        -- One row per terminal file attempt
        CREATE TABLE IF NOT EXISTS ingestion_file_stats (
            id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_size INTEGER NOT NULL DEFAULT 0,
            started_at TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            processing_time_ms INTEGER NOT NULL DEFAULT 0,
            chunks_created INTEGER NOT NULL DEFAULT 0,
            success INTEGER NOT NULL,
            error_type TEXT,
            error_message TEXT,
            timeout_seconds REAL NOT NULL,
            profile_key TEXT NOT NULL DEFAULT '',
            job_id TEXT,
            content_hash TEXT,
            file_modified_at TEXT,
            classification TEXT NOT NULL DEFAULT 'pending'
        );

        CREATE INDEX IF NOT EXISTS idx_stats_classification ON ingestion_file_stats(classification);
        CREATE INDEX IF NOT EXISTS idx_stats_job ON ingestion_file_stats(job_id);

        -- Failed files awaiting triage
        CREATE TABLE IF NOT EXISTS failed_files (
            id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            classification TEXT NOT NULL,
            error_type TEXT,
            error_message TEXT,
            profile_key TEXT NOT NULL DEFAULT '',
            job_id TEXT,
            failed_at TEXT NOT NULL,
            resolved INTEGER NOT NULL DEFAULT 0,
            resolved_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_failed_classification ON failed_files(classification, resolved);
        CREATE INDEX IF NOT EXISTS idx_failed_path ON failed_files(file_path);
        "#,
    )?;

    Ok(())
}
