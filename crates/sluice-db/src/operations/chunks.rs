//! Chunk and embedding operations.

use crate::database::Database;
use crate::error::{DbError, DbResult};
use rusqlite::{params, Connection};
use sluice_core::Chunk;

impl Database {
    /// Insert chunks (and their embeddings) in a transaction.
    pub fn insert_chunks(&self, chunks: &[Chunk]) -> DbResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let count = insert_chunks_on(&tx, chunks)?;
        tx.commit()?;
        Ok(count)
    }

    /// Get all chunks for a document, ordered, with embeddings when present.
    pub fn get_chunks_by_document(&self, document_id: &str) -> DbResult<Vec<Chunk>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.document_id, c.chunk_index, c.content, c.start_time, c.end_time,
                   e.vector, e.dimensions, e.model
            FROM chunks c
            LEFT JOIN embeddings e ON e.chunk_id = c.id
            WHERE c.document_id = ?1
            ORDER BY c.chunk_index
            "#,
        )?;

        let chunks = stmt.query_map(params![document_id], |row| {
            let vector: Option<Vec<u8>> = row.get(6)?;
            let dimensions: Option<i64> = row.get(7)?;
            Ok(Chunk {
                id: row.get(0)?,
                document_id: row.get(1)?,
                chunk_index: row.get(2)?,
                content: row.get(3)?,
                start_time: row.get(4)?,
                end_time: row.get(5)?,
                embedding: vector.map(|bytes| decode_vector(&bytes, dimensions.unwrap_or(0))),
                embedding_model: row.get(8)?,
            })
        })?;

        chunks.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Count stored chunks.
    pub fn count_chunks(&self) -> DbResult<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count)
    }
}

pub(crate) fn insert_chunks_on(conn: &Connection, chunks: &[Chunk]) -> DbResult<usize> {
    let mut chunk_stmt = conn.prepare(
        r#"
        INSERT INTO chunks (id, document_id, chunk_index, content, start_time, end_time)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )?;
    let mut embedding_stmt = conn.prepare(
        r#"
        INSERT OR REPLACE INTO embeddings (chunk_id, vector, model, dimensions)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )?;

    for chunk in chunks {
        chunk_stmt.execute(params![
            chunk.id,
            chunk.document_id,
            chunk.chunk_index,
            chunk.content,
            chunk.start_time,
            chunk.end_time,
        ])?;

        if let Some(ref vector) = chunk.embedding {
            embedding_stmt.execute(params![
                chunk.id,
                encode_vector(vector),
                chunk.embedding_model.as_deref().unwrap_or(""),
                vector.len() as i64,
            ])?;
        }
    }

    Ok(chunks.len())
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8], dimensions: i64) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .take(dimensions.max(0) as usize)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
