//! Concurrent ingestion scheduler.
//!
//! Files run in rounds. Round `n` dispatches every file queued for attempt
//! `n` under a semaphore of `max_concurrency` permits, each with a deadline
//! from [`TimeoutPolicy`]. Files that exceed their deadline and still have
//! retries left are queued for round `n + 1` with a longer deadline; each
//! round drains fully before the next starts.

use crate::control::RunControl;
use crate::dedup::DeduplicationIndex;
use crate::error::{IngestError, IngestResult};
use crate::hashing::file_facts;
use crate::parsers::file_title;
use crate::pool::run_unbounded;
use crate::stats::StatsSink;
use crate::task::{IngestComponents, IngestTask};
use crate::timeout::TimeoutPolicy;
use chrono::Utc;
use futures_util::future::join_all;
use sluice_config::{Config, TimeoutConfig};
use sluice_core::{
    ErrorType, FileClassification, FileFormat, IngestionFileStats, IngestionResult, RunSummary,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Per-run scheduling parameters.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrency: usize,
    pub timeout: TimeoutConfig,
    pub profile_key: String,
    pub job_id: Option<String>,
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrency: config.ingest.max_concurrent_files,
            timeout: config.timeout.clone(),
            profile_key: config.general.profile_key.clone(),
            job_id: None,
        }
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Emitted once per finished file.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub processed: usize,
    pub total: usize,
    pub path: String,
    pub chunks_created: usize,
    pub classification: FileClassification,
}

/// Called from file tasks; must be cheap.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Everything a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub results: Vec<IngestionResult>,
    pub duplicates_skipped: usize,
    pub stats_written: usize,
    pub summary: RunSummary,
    /// Files never dispatched because the run was stopped.
    pub not_started: Vec<PathBuf>,
}

enum FileOutcome {
    Finished(IngestionResult),
    Retry(PathBuf, Option<String>),
}

/// State shared by all file tasks of one run.
struct RunShared {
    task: IngestTask,
    sink: StatsSink,
    policy: TimeoutPolicy,
    processed: AtomicUsize,
    total: usize,
    progress: Option<ProgressCallback>,
    profile_key: String,
    job_id: Option<String>,
}

pub struct IngestionScheduler {
    components: IngestComponents,
    config: SchedulerConfig,
    control: RunControl,
    progress: Option<ProgressCallback>,
}

impl IngestionScheduler {
    pub fn new(components: IngestComponents, config: SchedulerConfig) -> Self {
        Self {
            components,
            config,
            control: RunControl::new(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_control(mut self, control: RunControl) -> Self {
        self.control = control;
        self
    }

    /// Handle for pausing or stopping the run from elsewhere.
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Ingest `files` and write one stats record per file.
    ///
    /// Only failing to seed the dedup index or to write stats fails the run;
    /// per-file problems are reported in the results.
    pub async fn run(&self, files: Vec<PathBuf>) -> IngestResult<RunReport> {
        let total = files.len();
        let concurrency = self.config.max_concurrency.max(1);
        let policy = TimeoutPolicy::new(self.config.timeout.clone());
        let max_retries = policy.max_retries();
        info!("Starting ingestion of {} files (concurrency {})", total, concurrency);

        let store = self.components.store.clone();
        let existing = run_unbounded(move || store.find_existing_hashes())
            .await
            .map_err(|e| IngestError::Setup(format!("could not load existing hashes: {}", e)))?;
        debug!("Dedup index seeded with {} hashes", existing.len());

        let shared = Arc::new(RunShared {
            task: IngestTask::new(
                self.components.clone(),
                Arc::new(DeduplicationIndex::seeded(existing)),
                self.control.clone(),
            ),
            sink: StatsSink::new(),
            policy,
            processed: AtomicUsize::new(0),
            total,
            progress: self.progress.clone(),
            profile_key: self.config.profile_key.clone(),
            job_id: self.config.job_id.clone(),
        });
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let mut results = Vec::with_capacity(total);
        let mut not_started = Vec::new();
        let mut round: Vec<(PathBuf, Option<String>)> = files.into_iter().map(|p| (p, None)).collect();

        for attempt in 0..=max_retries {
            if round.is_empty() {
                break;
            }
            if attempt > 0 {
                info!("Retry round {}: {} files", attempt, round.len());
            }

            let mut handles = Vec::with_capacity(round.len());
            let mut queued = round.into_iter();
            while let Some((path, hash)) = queued.next() {
                tokio::task::yield_now().await;
                if !self.control.checkpoint().await {
                    not_started.push(path);
                    break;
                }

                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| IngestError::Setup("concurrency limiter closed".to_string()))?;
                if self.control.is_stopped() {
                    not_started.push(path);
                    break;
                }

                let shared = shared.clone();
                let task_path = path.clone();
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    process_file(&shared, task_path, hash, attempt, max_retries).await
                });
                handles.push((path, handle));
            }
            not_started.extend(queued.map(|(path, _)| path));

            let (paths, joins): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
            let outcomes = join_all(joins).await;

            let mut next_round = Vec::new();
            for (path, outcome) in paths.into_iter().zip(outcomes) {
                tokio::task::yield_now().await;
                match outcome {
                    Ok(FileOutcome::Finished(result)) => results.push(result),
                    Ok(FileOutcome::Retry(path, hash)) => next_round.push((path, hash)),
                    Err(join_error) => {
                        error!("File task for {:?} aborted: {}", path, join_error);
                        let result = IngestionResult::failed(
                            path.to_string_lossy(),
                            file_title(&path),
                            ErrorType::Error,
                            format!("File task aborted: {}", join_error),
                        );
                        let facts = file_facts(&path).unwrap_or_default();
                        shared.sink.record(IngestionFileStats::from_result(
                            &result,
                            &facts,
                            Utc::now(),
                            0.0,
                            &shared.profile_key,
                            shared.job_id.as_deref(),
                        ));
                        results.push(result);
                    }
                }
            }
            round = next_round;
        }

        let flush_shared = shared.clone();
        let store = self.components.store.clone();
        let stats_written = run_unbounded(move || flush_shared.sink.flush(store.as_ref())).await?;

        let mut summary = RunSummary::from_results(&results);
        summary.not_started = not_started.len();
        summary.stopped = self.control.is_stopped();

        info!(
            "Ingestion finished: {} processed, {} duplicates, {} chunks, {} not started",
            summary.files_processed, summary.duplicates, summary.total_chunks, summary.not_started
        );

        Ok(RunReport {
            duplicates_skipped: summary.duplicates,
            results,
            stats_written,
            summary,
            not_started,
        })
    }
}

async fn process_file(
    shared: &RunShared,
    path: PathBuf,
    hash: Option<String>,
    attempt: u32,
    max_retries: u32,
) -> FileOutcome {
    let facts = file_facts(&path).unwrap_or_default();
    let limit = shared.policy.to_duration(shared.policy.calculate_timeout(
        facts.size,
        FileFormat::from_path(&path),
        attempt,
    ));
    let deadline = limit.as_secs_f64();
    let started_at = Utc::now();
    let started = Instant::now();

    let hash_slot = OnceLock::new();
    if let Some(ref known) = hash {
        let _ = hash_slot.set(known.clone());
    }

    debug!("Dispatching {:?} (attempt {}, deadline {:.1}s)", path, attempt + 1, deadline);
    let result = match shared
        .task
        .ingest_within(&path, hash, &hash_slot, Some(limit))
        .await
    {
        Ok(result) => result,
        Err(_) => {
            let known_hash = hash_slot.get().cloned();
            if attempt < max_retries {
                warn!(
                    "{:?} timed out after {:.1}s (attempt {}), will retry",
                    path,
                    deadline,
                    attempt + 1
                );
                return FileOutcome::Retry(path, known_hash);
            }

            warn!("{:?} timed out after {:.1}s on final attempt", path, deadline);
            let mut result = IngestionResult::failed(
                path.to_string_lossy(),
                file_title(&path),
                ErrorType::Timeout,
                format!("Timed out after {:.1}s on attempt {}", deadline, attempt + 1),
            )
            .with_processing_time(started.elapsed().as_millis() as u64);
            result.content_hash = known_hash;
            result
        }
    };

    shared.sink.record(IngestionFileStats::from_result(
        &result,
        &facts,
        started_at,
        deadline,
        &shared.profile_key,
        shared.job_id.as_deref(),
    ));

    let processed = shared.processed.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some(ref progress) = shared.progress {
        progress(&ProgressEvent {
            processed,
            total: shared.total,
            path: result.source_path.clone(),
            chunks_created: result.chunks_created,
            classification: result.classification(),
        });
    }

    FileOutcome::Finished(result)
}
