//! Storage seam used by the scheduler.

use crate::error::IngestResult;
use sluice_core::{Chunk, Document, IngestionFileStats};
use sluice_db::Database;
use std::collections::{HashMap, HashSet};

/// Persistent document, chunk and stats storage.
///
/// Methods block; async callers go through `spawn_blocking`.
pub trait DocumentStore: Send + Sync {
    /// `content_hash -> source_path` for every stored document.
    fn find_existing_hashes(&self) -> IngestResult<HashMap<String, String>>;

    fn find_existing_sources(&self) -> IngestResult<HashSet<String>>;

    fn insert_document(&self, doc: &Document) -> IngestResult<String>;

    fn insert_chunks(&self, chunks: &[Chunk]) -> IngestResult<usize>;

    /// Store a document with its chunks.
    ///
    /// The default is two calls; stores with transactions should make it atomic.
    fn persist(&self, doc: &Document, chunks: &[Chunk]) -> IngestResult<String> {
        let id = self.insert_document(doc)?;
        self.insert_chunks(chunks)?;
        Ok(id)
    }

    fn bulk_insert_stats(&self, records: &[IngestionFileStats]) -> IngestResult<usize>;
}

impl DocumentStore for Database {
    fn find_existing_hashes(&self) -> IngestResult<HashMap<String, String>> {
        Ok(Database::find_existing_hashes(self)?)
    }

    fn find_existing_sources(&self) -> IngestResult<HashSet<String>> {
        Ok(Database::find_existing_sources(self)?)
    }

    fn insert_document(&self, doc: &Document) -> IngestResult<String> {
        Ok(Database::insert_document(self, doc)?)
    }

    fn insert_chunks(&self, chunks: &[Chunk]) -> IngestResult<usize> {
        Ok(Database::insert_chunks(self, chunks)?)
    }

    fn persist(&self, doc: &Document, chunks: &[Chunk]) -> IngestResult<String> {
        Ok(self.persist_document(doc, chunks)?)
    }

    fn bulk_insert_stats(&self, records: &[IngestionFileStats]) -> IngestResult<usize> {
        Ok(Database::bulk_insert_stats(self, records)?)
    }
}
