//! Document operations.

use super::chunks::insert_chunks_on;
use super::parse_timestamp;
use crate::database::Database;
use crate::error::{DbError, DbResult};
use rusqlite::{params, Connection};
use sluice_core::{Chunk, Document, FileFormat};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const DOCUMENT_COLUMNS: &str =
    "id, title, source_path, content_hash, format, file_size, profile_key, created_at, metadata";

impl Database {
    /// Insert a document row.
    pub fn insert_document(&self, doc: &Document) -> DbResult<String> {
        let conn = self.conn()?;
        insert_document_on(&conn, doc)?;
        Ok(doc.id.clone())
    }

    /// Store a document with all its chunks and embeddings in one transaction.
    ///
    /// Any earlier document for the same source path is replaced.
    pub fn persist_document(&self, doc: &Document, chunks: &[Chunk]) -> DbResult<String> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let replaced = tx.execute(
            "DELETE FROM documents WHERE source_path = ?1",
            params![doc.source_path],
        )?;
        if replaced > 0 {
            debug!("Replacing {} earlier document(s) for {}", replaced, doc.source_path);
        }

        insert_document_on(&tx, doc)?;
        insert_chunks_on(&tx, chunks)?;
        tx.commit()?;

        Ok(doc.id.clone())
    }

    /// Get a document by ID.
    pub fn get_document(&self, id: &str) -> DbResult<Document> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
            params![id],
            row_to_document,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                DbError::NotFound(format!("Document not found: {}", id))
            }
            _ => DbError::from(e),
        })
    }

    /// Map of every stored content hash to the first source path that produced it.
    pub fn find_existing_hashes(&self) -> DbResult<HashMap<String, String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT content_hash, source_path FROM documents ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let hash: String = row.get(0)?;
            let path: String = row.get(1)?;
            Ok((hash, path))
        })?;

        let mut hashes = HashMap::new();
        for row in rows {
            let (hash, path) = row?;
            hashes.entry(hash).or_insert(path);
        }
        Ok(hashes)
    }

    /// Every source path that has a stored document.
    pub fn find_existing_sources(&self) -> DbResult<HashSet<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT source_path FROM documents")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<HashSet<_>, _>>().map_err(DbError::from)
    }

    /// Count stored documents.
    pub fn count_documents(&self) -> DbResult<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn insert_document_on(conn: &Connection, doc: &Document) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO documents (id, title, source_path, content_hash, format, file_size, profile_key, created_at, metadata)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            doc.id,
            doc.title,
            doc.source_path,
            doc.content_hash,
            doc.format.as_str(),
            doc.file_size as i64,
            doc.profile_key,
            doc.created_at.to_rfc3339(),
            doc.metadata.to_string(),
        ],
    )?;
    Ok(())
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    let format_str: String = row.get(4)?;
    let file_size: i64 = row.get(5)?;
    let created_at_str: String = row.get(7)?;
    let metadata_str: String = row.get(8)?;

    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        source_path: row.get(2)?,
        content_hash: row.get(3)?,
        format: FileFormat::from_str(&format_str).unwrap_or(FileFormat::Text),
        file_size: file_size.max(0) as u64,
        profile_key: row.get(6)?,
        created_at: parse_timestamp(&created_at_str),
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::new_id;

    fn doc(path: &str, hash: &str) -> Document {
        Document::new(new_id(), "Doc", path, hash, FileFormat::Markdown)
            .with_file_size(42)
            .with_profile_key("default")
    }

    #[test]
    fn test_insert_and_get() {
        let db = Database::open_in_memory().unwrap();
        let d = doc("/notes/a.md", "h1");
        db.insert_document(&d).unwrap();

        let fetched = db.get_document(&d.id).unwrap();
        assert_eq!(fetched.source_path, "/notes/a.md");
        assert_eq!(fetched.format, FileFormat::Markdown);
        assert_eq!(fetched.file_size, 42);
        assert!(db.get_document("missing").is_err());
    }

    #[test]
    fn test_persist_document_with_chunks() {
        let db = Database::open_in_memory().unwrap();
        let d = doc("/notes/a.md", "h1");
        let chunks = vec![
            Chunk::new(d.id.clone(), 0, "one").with_embedding(vec![0.1, 0.2], "m"),
            Chunk::new(d.id.clone(), 1, "two").with_embedding(vec![0.3, 0.4], "m"),
        ];

        db.persist_document(&d, &chunks).unwrap();

        let stored = db.get_chunks_by_document(&d.id).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].embedding.as_ref().map(|v| v.len()), Some(2));
        assert_eq!(stored[1].embedding_model.as_deref(), Some("m"));
    }

    #[test]
    fn test_persist_rolls_back_on_chunk_failure() {
        let db = Database::open_in_memory().unwrap();
        let d = doc("/notes/a.md", "h1");
        let dup = Chunk::new(d.id.clone(), 0, "one");
        let chunks = vec![dup.clone(), dup];

        assert!(db.persist_document(&d, &chunks).is_err());
        assert_eq!(db.count_documents().unwrap(), 0);
    }

    #[test]
    fn test_persist_replaces_same_source() {
        let db = Database::open_in_memory().unwrap();
        let first = doc("/notes/a.md", "h1");
        db.persist_document(&first, &[Chunk::new(first.id.clone(), 0, "old")]).unwrap();

        let second = doc("/notes/a.md", "h2");
        db.persist_document(&second, &[Chunk::new(second.id.clone(), 0, "new")]).unwrap();

        assert_eq!(db.count_documents().unwrap(), 1);
        assert!(db.get_chunks_by_document(&first.id).unwrap().is_empty());
        let hashes = db.find_existing_hashes().unwrap();
        assert_eq!(hashes.get("h2").map(String::as_str), Some("/notes/a.md"));
        assert!(!hashes.contains_key("h1"));
    }

    #[test]
    fn test_existing_hashes_and_sources() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document(&doc("/a.txt", "same")).unwrap();
        db.insert_document(&doc("/b.txt", "other")).unwrap();

        let hashes = db.find_existing_hashes().unwrap();
        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes.get("same").map(|s| s.as_str()), Some("/a.txt"));

        let sources = db.find_existing_sources().unwrap();
        assert!(sources.contains("/a.txt"));
        assert!(sources.contains("/b.txt"));
    }
}
