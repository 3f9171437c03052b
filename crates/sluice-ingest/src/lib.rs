//! Sluice Ingest - Concurrent document ingestion.
//!
//! This crate provides:
//! - Content hashing, file probes and image-only PDF detection
//! - Adaptive per-file timeouts and a run-wide deduplication index
//! - Format converters and a paragraph/transcript chunker
//! - The per-file ingestion task and the bounded, retrying scheduler
//! - File discovery and file system watching for automatic ingestion

mod chunker;
mod control;
mod converter;
mod dedup;
mod discovery;
mod error;
mod hashing;
mod parsers;
mod pdf_probe;
mod pool;
mod scheduler;
mod stats;
mod store;
mod task;
#[cfg(test)]
mod testing;
mod timeout;
mod watcher;

pub use chunker::{ChunkConfig, Chunker, TextChunker};
pub use control::RunControl;
pub use converter::{Converted, Converter, ConverterSettings, FileConverter, StructuredDoc};
pub use dedup::{DedupCheck, DeduplicationIndex, Reservation};
pub use discovery::{discover_files, sort_for_scheduling, DiscoveryOptions};
pub use error::{IngestError, IngestResult};
pub use hashing::{file_facts, hash_bytes, hash_file};
pub use pdf_probe::detect_image_only_pdf;
pub use pool::{run_unbounded, BlockingPool};
pub use scheduler::{IngestionScheduler, ProgressCallback, ProgressEvent, RunReport, SchedulerConfig};
pub use stats::StatsSink;
pub use store::DocumentStore;
pub use task::{IngestComponents, IngestTask, TaskSettings};
pub use timeout::TimeoutPolicy;
pub use watcher::{changed_paths, FileWatcher, WatchEvent, WatcherConfig};
