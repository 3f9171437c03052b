//! The per-file ingestion task.
//!
//! hash -> dedup reservation -> image-only probe -> convert -> chunk ->
//! embed -> persist -> commit. Every failure is folded into the file's
//! [`IngestionResult`]; nothing here returns an error to the scheduler.

use crate::chunker::{ChunkConfig, Chunker, TextChunker};
use crate::control::RunControl;
use crate::converter::{Converter, ConverterSettings, FileConverter};
use crate::dedup::{DedupCheck, DeduplicationIndex, Reservation};
use crate::error::{IngestError, IngestResult};
use crate::hashing::{file_facts, hash_file};
use crate::parsers::file_title;
use crate::pdf_probe::detect_image_only_pdf;
use crate::pool::{run_unbounded, BlockingPool};
use crate::store::DocumentStore;
use sluice_config::Config;
use sluice_core::{new_id, Chunk, Document, ErrorType, FileFormat, IngestionResult};
use sluice_embed::ResilientEmbedder;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::time::error::Elapsed;
use tracing::{debug, info, warn};

async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Result<F::Output, Elapsed> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await,
        None => Ok(fut.await),
    }
}

/// Per-file knobs.
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub embed_batch_size: usize,
    pub pdf_probe_pages: usize,
    pub pdf_min_text_chars: usize,
    pub profile_key: String,
}

impl TaskSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            embed_batch_size: config.ingest.embed_batch_size,
            pdf_probe_pages: config.ingest.pdf_probe_pages,
            pdf_min_text_chars: config.ingest.pdf_min_text_chars,
            profile_key: config.general.profile_key.clone(),
        }
    }
}

/// Collaborators shared by every file of a run.
#[derive(Clone)]
pub struct IngestComponents {
    pub store: Arc<dyn DocumentStore>,
    pub converter: Arc<dyn Converter>,
    pub chunker: Arc<dyn TextChunker>,
    pub embedder: Arc<ResilientEmbedder>,
    pub pool: BlockingPool,
    pub settings: TaskSettings,
}

impl IngestComponents {
    /// Build the bundled converter, chunker and embedder from configuration.
    pub fn from_config(config: &Config, store: Arc<dyn DocumentStore>) -> IngestResult<Self> {
        let embedder = ResilientEmbedder::from_config(&config.embedding, &config.resilience)?;

        Ok(Self {
            store,
            converter: Arc::new(FileConverter::new(ConverterSettings::from_config(&config.ingest))),
            chunker: Arc::new(Chunker::new(ChunkConfig::from_ingest_config(&config.ingest))),
            embedder: Arc::new(embedder),
            pool: BlockingPool::new(config.ingest.cpu_workers),
            settings: TaskSettings::from_config(config),
        })
    }
}

/// Which provider produced a document's vectors.
struct EmbeddingSummary {
    provider: String,
    model: String,
    warnings: Vec<String>,
}

/// Ingests single files against one run's dedup index.
pub struct IngestTask {
    components: IngestComponents,
    dedup: Arc<DeduplicationIndex>,
    control: RunControl,
}

impl IngestTask {
    pub fn new(components: IngestComponents, dedup: Arc<DeduplicationIndex>, control: RunControl) -> Self {
        Self {
            components,
            dedup,
            control,
        }
    }

    /// Ingest one file with no deadline. Never fails; errors become the result.
    pub async fn ingest_one(&self, path: &Path, precomputed_hash: Option<String>) -> IngestionResult {
        match self.ingest_within(path, precomputed_hash, &OnceLock::new(), None).await {
            Ok(result) => result,
            Err(_) => IngestionResult::failed(
                path.to_string_lossy(),
                file_title(path),
                ErrorType::Timeout,
                "Attempt exceeded its deadline",
            ),
        }
    }

    /// Ingest one file, giving up with [`Elapsed`] when `limit` runs out.
    ///
    /// The limit applies separately to hashing and to the work after the
    /// dedup reservation is held. Time spent waiting for another file with
    /// the same content does not count against it. The content hash is
    /// published into `hash_slot` as soon as it is known so a cancelled
    /// attempt can hand it on.
    pub(crate) async fn ingest_within(
        &self,
        path: &Path,
        precomputed_hash: Option<String>,
        hash_slot: &OnceLock<String>,
        limit: Option<Duration>,
    ) -> Result<IngestionResult, Elapsed> {
        let started = Instant::now();
        let source = path.to_string_lossy().to_string();

        let outcome = match within(limit, self.hash(path, &source, precomputed_hash)).await? {
            Ok((format, hash)) => {
                let _ = hash_slot.set(hash.clone());
                match self.dedup.reserve(&hash).await {
                    DedupCheck::Duplicate(canonical) => {
                        info!("Skipping {}: duplicate of {}", source, canonical);
                        Ok(IngestionResult::duplicate(&source, file_title(path), &canonical).with_hash(hash))
                    }
                    DedupCheck::Reserved(reservation) => {
                        within(limit, self.process(path, &source, format, hash, reservation)).await?
                    }
                }
            }
            Err(e) => Err(e),
        };

        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!("Failed to ingest {}: {}", source, e);
                IngestionResult::failed(&source, file_title(path), ErrorType::Error, e.to_string())
            }
        };

        if result.content_hash.is_none() {
            result.content_hash = hash_slot.get().cloned();
        }
        Ok(result.with_processing_time(started.elapsed().as_millis() as u64))
    }

    async fn hash(
        &self,
        path: &Path,
        source: &str,
        precomputed_hash: Option<String>,
    ) -> IngestResult<(FileFormat, String)> {
        let format = FileFormat::from_path(path)
            .ok_or_else(|| IngestError::UnsupportedFileType(source.to_string()))?;

        let hash = match precomputed_hash {
            Some(hash) => hash,
            None => {
                let p = path.to_path_buf();
                self.components.pool.run(move || hash_file(&p)).await?
            }
        };
        Ok((format, hash))
    }

    async fn process(
        &self,
        path: &Path,
        source: &str,
        format: FileFormat,
        hash: String,
        reservation: Reservation,
    ) -> IngestResult<IngestionResult> {
        let settings = &self.components.settings;
        let pool = &self.components.pool;
        let title = file_title(path);

        if format == FileFormat::Pdf {
            let p = path.to_path_buf();
            let (pages, min_chars) = (settings.pdf_probe_pages, settings.pdf_min_text_chars);
            let (image_only, reason) = pool
                .run(move || Ok(detect_image_only_pdf(&p, pages, min_chars)))
                .await?;
            if image_only {
                info!("Skipping {}: image-only PDF ({})", source, reason);
                return Ok(IngestionResult::failed(
                    source,
                    title,
                    ErrorType::ImageOnlyPdf,
                    format!("Image-only PDF: {}", reason),
                )
                .with_hash(hash));
            }
        }

        debug!("Converting {}", source);
        let converter = self.components.converter.clone();
        let p = path.to_path_buf();
        let converted = pool.run(move || converter.convert(&p)).await?;
        let title = converted.title.clone();

        let document_id = new_id();
        let chunker = self.components.chunker.clone();
        let doc_id = document_id.clone();
        let (converted, mut chunks) = pool
            .run(move || {
                let chunks = chunker.chunk(
                    &doc_id,
                    &converted.markdown,
                    converted.structured.as_ref(),
                    &converted.metadata,
                );
                Ok((converted, chunks))
            })
            .await?;

        if chunks.is_empty() {
            info!("No chunks produced for {}", source);
            return Ok(IngestionResult::failed(
                source,
                title,
                ErrorType::NoChunks,
                "No chunks produced from converted content",
            )
            .with_hash(hash));
        }

        let embedding = self.embed_chunks(&mut chunks).await?;

        let mut metadata = converted.metadata;
        if let Some(map) = metadata.as_object_mut() {
            map.insert("embedding_provider".into(), embedding.provider.into());
            map.insert("embedding_model".into(), embedding.model.into());
            if !embedding.warnings.is_empty() {
                map.insert("embedding_warnings".into(), embedding.warnings.into());
            }
        }

        let size = file_facts(path).map(|f| f.size).unwrap_or(0);
        let doc = Document::new(document_id.clone(), &title, source, &hash, format)
            .with_file_size(size)
            .with_profile_key(&settings.profile_key)
            .with_metadata(metadata);

        // The reservation travels with the write: once persist starts, the
        // index is updated by the same blocking call even if this attempt is
        // cancelled, and same-hash waiters stay blocked until it has.
        let chunk_count = chunks.len();
        let store = self.components.store.clone();
        let committed_source = source.to_string();
        run_unbounded(move || {
            let id = store.persist(&doc, &chunks)?;
            reservation.commit(committed_source);
            Ok(id)
        })
        .await?;

        info!("Ingested {} ({} chunks)", source, chunk_count);
        Ok(IngestionResult::persisted(source, document_id, title, chunk_count).with_hash(hash))
    }

    /// Embed chunks in batches, honouring pause between batches.
    async fn embed_chunks(&self, chunks: &mut [Chunk]) -> IngestResult<EmbeddingSummary> {
        let batch_size = self.components.settings.embed_batch_size.max(1);
        let mut summary = EmbeddingSummary {
            provider: String::new(),
            model: String::new(),
            warnings: Vec::new(),
        };

        for batch in chunks.chunks_mut(batch_size) {
            self.control.wait_while_paused().await;

            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let outcome = self.components.embedder.embed_batch(&texts).await?;

            for (chunk, vector) in batch.iter_mut().zip(outcome.vectors) {
                chunk.embedding = Some(vector);
                chunk.embedding_model = Some(outcome.model.clone());
            }
            summary.provider = outcome.provider;
            summary.model = outcome.model;
            summary.warnings.extend(outcome.warnings);

            tokio::task::yield_now().await;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{components, FakeConverter, FakeProvider};
    use sluice_core::{FileClassification, DUPLICATE_PREFIX};
    use sluice_db::Database;

    fn task_for(db: Arc<Database>, converter: Arc<FakeConverter>, provider: Arc<FakeProvider>) -> IngestTask {
        let components = components(db, converter, provider);
        IngestTask::new(components, Arc::new(DeduplicationIndex::new()), RunControl::new())
    }

    #[tokio::test]
    async fn test_persists_document_with_embeddings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "Revenue grew.\n\nCosts fell.").unwrap();

        let db = Arc::new(Database::open_in_memory().unwrap());
        let provider = Arc::new(FakeProvider::new(4));
        let task = task_for(db.clone(), Arc::new(FakeConverter::new()), provider.clone());

        let result = task.ingest_one(&path, None).await;

        assert_eq!(result.classification(), FileClassification::Normal);
        assert_eq!(result.chunks_created, 1);
        assert!(result.content_hash.is_some());

        let doc = db.get_document(&result.document_id).unwrap();
        assert_eq!(doc.metadata["embedding_provider"], "fake");
        let chunks = db.get_chunks_by_document(&doc.id).unwrap();
        assert_eq!(chunks[0].embedding.as_ref().map(|v| v.len()), Some(4));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_same_content_second_time_is_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.md");
        let second = dir.path().join("b.md");
        std::fs::write(&first, "# Same\n\nIdentical body.").unwrap();
        std::fs::write(&second, "# Same\n\nIdentical body.").unwrap();

        let db = Arc::new(Database::open_in_memory().unwrap());
        let converter = Arc::new(FakeConverter::new());
        let task = task_for(db.clone(), converter.clone(), Arc::new(FakeProvider::new(4)));

        assert_eq!(task.ingest_one(&first, None).await.classification(), FileClassification::Normal);
        let dup = task.ingest_one(&second, None).await;

        assert!(dup.is_duplicate());
        assert_eq!(dup.errors, vec![format!("{}{}", DUPLICATE_PREFIX, first.display())]);
        assert_eq!(converter.calls(), 1);
        assert_eq!(db.count_documents().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_waiting_for_same_content_is_not_charged_to_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.txt");
        std::fs::write(&path, "shared bytes").unwrap();
        let hash = hash_file(&path).unwrap();

        let db = Arc::new(Database::open_in_memory().unwrap());
        let dedup = Arc::new(DeduplicationIndex::new());
        let components = components(db, Arc::new(FakeConverter::new()), Arc::new(FakeProvider::new(4)));
        let task = IngestTask::new(components, dedup.clone(), RunControl::new());

        // Another file with the same content holds the hash longer than our limit
        let holder = match dedup.reserve(&hash).await {
            DedupCheck::Reserved(r) => r,
            DedupCheck::Duplicate(_) => panic!("index starts empty"),
        };
        let slot = OnceLock::new();
        let (outcome, ()) = tokio::join!(
            task.ingest_within(&path, None, &slot, Some(Duration::from_millis(100))),
            async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                holder.commit("/originals/shared.pdf");
            }
        );

        let result = outcome.expect("waiting on the reservation must not time out");
        assert!(result.is_duplicate());
        assert_eq!(result.errors, vec![format!("{}/originals/shared.pdf", DUPLICATE_PREFIX)]);
        assert_eq!(slot.get(), Some(&hash));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_conversion_exceeds_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow.txt");
        std::fs::write(&path, "takes a while").unwrap();

        let db = Arc::new(Database::open_in_memory().unwrap());
        let converter = Arc::new(FakeConverter::with_delay(Duration::from_millis(500)));
        let task = task_for(db.clone(), converter, Arc::new(FakeProvider::new(4)));

        let slot = OnceLock::new();
        let outcome = task
            .ingest_within(&path, None, &slot, Some(Duration::from_millis(100)))
            .await;

        assert!(outcome.is_err());
        // The hash is known even though the attempt was cut off
        assert!(slot.get().is_some());
        assert_eq!(db.count_documents().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_image_only_pdf_skips_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        crate::pdf_probe::tests::write_pdf(&path, &[None, None]);

        let db = Arc::new(Database::open_in_memory().unwrap());
        let converter = Arc::new(FakeConverter::new());
        let provider = Arc::new(FakeProvider::new(4));
        let task = task_for(db.clone(), converter.clone(), provider.clone());

        let result = task.ingest_one(&path, None).await;

        assert_eq!(result.classification(), FileClassification::ImageOnlyPdf);
        assert_eq!(converter.calls(), 0);
        assert_eq!(provider.calls(), 0);
        assert_eq!(db.count_documents().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_file_is_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "   \n").unwrap();

        let db = Arc::new(Database::open_in_memory().unwrap());
        let task = task_for(db, Arc::new(FakeConverter::new()), Arc::new(FakeProvider::new(4)));

        let result = task.ingest_one(&path, None).await;
        assert_eq!(result.error_type, Some(ErrorType::NoChunks));
        assert_eq!(result.classification(), FileClassification::NoChunks);
    }

    #[tokio::test]
    async fn test_converter_failure_becomes_error_and_frees_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        std::fs::write(&path, "content").unwrap();

        let db = Arc::new(Database::open_in_memory().unwrap());
        let converter = Arc::new(FakeConverter::new());
        let task = task_for(db, converter.clone(), Arc::new(FakeProvider::new(4)));

        let result = task.ingest_one(&path, None).await;
        assert_eq!(result.error_type, Some(ErrorType::Error));
        assert!(result.error_message().unwrap().contains("converter crashed"));

        // A failed attempt must not block the same hash
        let again = task.ingest_one(&path, result.content_hash.clone()).await;
        assert_eq!(again.error_type, Some(ErrorType::Error));
        assert_eq!(converter.calls(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0u8; 4]).unwrap();

        let db = Arc::new(Database::open_in_memory().unwrap());
        let task = task_for(db, Arc::new(FakeConverter::new()), Arc::new(FakeProvider::new(4)));

        let result = task.ingest_one(&path, None).await;
        assert_eq!(result.classification(), FileClassification::Error);
        assert!(result.content_hash.is_none());
    }
}
