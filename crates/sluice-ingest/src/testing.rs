//! Fakes shared by the task and scheduler tests.

use crate::chunker::Chunker;
use crate::converter::{Converted, Converter};
use crate::error::{IngestError, IngestResult};
use crate::parsers::file_title;
use crate::pool::BlockingPool;
use crate::store::DocumentStore;
use crate::task::{IngestComponents, TaskSettings};
use async_trait::async_trait;
use sluice_core::{Chunk, Document, IngestionFileStats};
use sluice_db::Database;
use sluice_embed::{EmbedResult, EmbeddingProvider, ResilientEmbedder, RetryPolicy};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Reads files as text. Names containing `slow` sleep first; names
/// containing `broken` fail.
pub(crate) struct FakeConverter {
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeConverter {
    pub(crate) fn new() -> Self {
        Self::with_delay(Duration::from_millis(0))
    }

    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Converter for FakeConverter {
    fn convert(&self, path: &Path) -> IngestResult<Converted> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.contains("slow") {
            std::thread::sleep(self.delay);
        } else {
            // Long enough for concurrent files to overlap
            std::thread::sleep(Duration::from_millis(10));
        }

        let result = if name.contains("broken") {
            Err(IngestError::ProcessingError("converter crashed".to_string()))
        } else {
            std::fs::read_to_string(path)
                .map(|text| Converted::new(text).with_title(file_title(path)))
                .map_err(IngestError::from)
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Returns constant vectors of `dims` length.
pub(crate) struct FakeProvider {
    dims: usize,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub(crate) fn new(dims: usize) -> Self {
        Self {
            dims,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-embed"
    }

    fn supports_batching(&self) -> bool {
        true
    }

    async fn probe(&self) -> EmbedResult<()> {
        Ok(())
    }

    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|_| vec![0.25; self.dims]).collect())
    }
}

/// Database-backed store whose `persist` sleeps first and which keeps a copy
/// of every stats record written.
pub(crate) struct RecordingStore {
    inner: Arc<Database>,
    persist_delay: Duration,
    stats: Mutex<Vec<IngestionFileStats>>,
}

impl RecordingStore {
    pub(crate) fn new(inner: Arc<Database>, persist_delay: Duration) -> Self {
        Self {
            inner,
            persist_delay,
            stats: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn stats(&self) -> Vec<IngestionFileStats> {
        self.stats.lock().unwrap().clone()
    }
}

impl DocumentStore for RecordingStore {
    fn find_existing_hashes(&self) -> IngestResult<HashMap<String, String>> {
        DocumentStore::find_existing_hashes(self.inner.as_ref())
    }

    fn find_existing_sources(&self) -> IngestResult<HashSet<String>> {
        DocumentStore::find_existing_sources(self.inner.as_ref())
    }

    fn insert_document(&self, doc: &Document) -> IngestResult<String> {
        DocumentStore::insert_document(self.inner.as_ref(), doc)
    }

    fn insert_chunks(&self, chunks: &[Chunk]) -> IngestResult<usize> {
        DocumentStore::insert_chunks(self.inner.as_ref(), chunks)
    }

    fn persist(&self, doc: &Document, chunks: &[Chunk]) -> IngestResult<String> {
        std::thread::sleep(self.persist_delay);
        DocumentStore::persist(self.inner.as_ref(), doc, chunks)
    }

    fn bulk_insert_stats(&self, records: &[IngestionFileStats]) -> IngestResult<usize> {
        self.stats.lock().unwrap().extend(records.iter().cloned());
        DocumentStore::bulk_insert_stats(self.inner.as_ref(), records)
    }
}

pub(crate) fn components(
    db: Arc<Database>,
    converter: Arc<FakeConverter>,
    provider: Arc<FakeProvider>,
) -> IngestComponents {
    components_with_store(db, converter, provider)
}

pub(crate) fn components_with_store(
    store: Arc<dyn DocumentStore>,
    converter: Arc<FakeConverter>,
    provider: Arc<FakeProvider>,
) -> IngestComponents {
    let policy = RetryPolicy {
        max_retries: 0,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        multiplier: 1.0,
    };

    IngestComponents {
        store,
        converter,
        chunker: Arc::new(Chunker::default()),
        embedder: Arc::new(ResilientEmbedder::new(provider, None, policy, 4, 10_000)),
        pool: BlockingPool::new(4),
        settings: TaskSettings {
            embed_batch_size: 2,
            pdf_probe_pages: 3,
            pdf_min_text_chars: 50,
            profile_key: "test".to_string(),
        },
    }
}
