//! File system watcher for automatic ingestion.

use crate::discovery::{compile_patterns, is_ignored};
use crate::error::{IngestError, IngestResult};
use glob::Pattern;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer};
use sluice_config::WatchConfig;
use sluice_core::FileFormat;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A supported file was created or modified.
    FileChanged { path: PathBuf, format: FileFormat },
    FileDeleted { path: PathBuf },
    Error(String),
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub directories: Vec<PathBuf>,
    pub ignore_patterns: Vec<Pattern>,
    /// Quiet period before a batch of events is delivered.
    pub debounce: Duration,
}

impl WatcherConfig {
    pub fn from_config(config: &WatchConfig, ignore_patterns: &[String]) -> Self {
        let directories = config
            .directories
            .iter()
            .map(|s| {
                let expanded = shellexpand::tilde(s);
                PathBuf::from(expanded.as_ref())
            })
            .collect();

        Self {
            directories,
            ignore_patterns: compile_patterns(ignore_patterns),
            debounce: Duration::from_secs(config.poll_interval_seconds.max(1)),
        }
    }
}

/// Debounced recursive watcher over the configured directories.
pub struct FileWatcher {
    config: WatcherConfig,
    debouncer: Debouncer<RecommendedWatcher>,
    receiver: Receiver<DebounceEventResult>,
}

impl FileWatcher {
    pub fn new(config: WatcherConfig) -> IngestResult<Self> {
        let (tx, rx) = channel();

        let debouncer = new_debouncer(config.debounce, tx)
            .map_err(|e| IngestError::WatchError(e.to_string()))?;

        Ok(Self {
            config,
            debouncer,
            receiver: rx,
        })
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Start watching configured directories. Returns how many are watched.
    pub fn start(&mut self) -> IngestResult<usize> {
        let mut watched = 0;
        for dir in &self.config.directories {
            if !dir.exists() {
                warn!("Watch directory does not exist: {:?}", dir);
                continue;
            }

            info!("Watching directory: {:?}", dir);
            self.debouncer
                .watcher()
                .watch(dir, RecursiveMode::Recursive)
                .map_err(|e| IngestError::WatchError(e.to_string()))?;
            watched += 1;
        }

        Ok(watched)
    }

    /// Drain pending events without blocking.
    pub fn poll(&self) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        while let Ok(result) = self.receiver.try_recv() {
            self.collect(result, &mut events);
        }
        events
    }

    fn collect(&self, result: DebounceEventResult, events: &mut Vec<WatchEvent>) {
        match result {
            Ok(batch) => events.extend(
                batch
                    .into_iter()
                    .filter_map(|event: DebouncedEvent| classify_path(&event.path, &self.config.ignore_patterns)),
            ),
            Err(e) => {
                error!("Watch error: {:?}", e);
                events.push(WatchEvent::Error(e.to_string()));
            }
        }
    }
}

/// Turn a raw changed path into a watch event, or `None` if it is irrelevant.
fn classify_path(path: &Path, patterns: &[Pattern]) -> Option<WatchEvent> {
    if path.is_dir() {
        return None;
    }
    if is_ignored(path, patterns) {
        debug!("Ignoring file: {:?}", path);
        return None;
    }

    let Some(format) = FileFormat::from_path(path) else {
        debug!("Ignoring unsupported file type: {:?}", path);
        return None;
    };

    if path.exists() {
        info!("File changed: {:?} ({})", path, format);
        Some(WatchEvent::FileChanged {
            path: path.to_path_buf(),
            format,
        })
    } else {
        info!("File deleted: {:?}", path);
        Some(WatchEvent::FileDeleted {
            path: path.to_path_buf(),
        })
    }
}

/// Distinct changed files in a batch, in path order.
pub fn changed_paths(events: &[WatchEvent]) -> Vec<PathBuf> {
    events
        .iter()
        .filter_map(|event| match event {
            WatchEvent::FileChanged { path, .. } => Some(path.clone()),
            _ => None,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_path() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = compile_patterns(&["*.part".to_string()]);

        let note = dir.path().join("note.md");
        std::fs::write(&note, "# hi").unwrap();
        let partial = dir.path().join("video.mp4.part");
        std::fs::write(&partial, "x").unwrap();
        let unknown = dir.path().join("blob.xyz");
        std::fs::write(&unknown, "x").unwrap();

        assert_eq!(
            classify_path(&note, &patterns),
            Some(WatchEvent::FileChanged {
                path: note.clone(),
                format: FileFormat::Markdown
            })
        );
        assert_eq!(classify_path(&partial, &patterns), None);
        assert_eq!(classify_path(&unknown, &patterns), None);
        assert_eq!(classify_path(dir.path(), &patterns), None);

        let gone = dir.path().join("gone.txt");
        assert_eq!(
            classify_path(&gone, &patterns),
            Some(WatchEvent::FileDeleted { path: gone.clone() })
        );
    }

    #[test]
    fn test_changed_paths_dedupes() {
        let a = PathBuf::from("/w/a.txt");
        let b = PathBuf::from("/w/b.pdf");
        let events = vec![
            WatchEvent::FileChanged { path: b.clone(), format: FileFormat::Pdf },
            WatchEvent::FileChanged { path: a.clone(), format: FileFormat::Text },
            WatchEvent::FileDeleted { path: PathBuf::from("/w/c.txt") },
            WatchEvent::Error("boom".to_string()),
            WatchEvent::FileChanged { path: a.clone(), format: FileFormat::Text },
        ];

        assert_eq!(changed_paths(&events), vec![a, b]);
    }

    #[test]
    fn test_config_expands_directories() {
        let config = WatchConfig {
            directories: vec!["/srv/inbox".to_string()],
            poll_interval_seconds: 0,
        };
        let watcher_config = WatcherConfig::from_config(&config, &["*.tmp".to_string()]);

        assert_eq!(watcher_config.directories, vec![PathBuf::from("/srv/inbox")]);
        assert_eq!(watcher_config.ignore_patterns.len(), 1);
        assert_eq!(watcher_config.debounce, Duration::from_secs(1));
    }
}
