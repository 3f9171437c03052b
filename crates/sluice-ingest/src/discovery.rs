//! Candidate file discovery.

use crate::error::{IngestError, IngestResult};
use glob::Pattern;
use sluice_core::FileFormat;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Filters applied while walking a directory tree.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    pub ignore_patterns: Vec<Pattern>,
    /// Source paths already in the store; matching files are skipped.
    pub skip_existing: Option<HashSet<String>>,
}

impl DiscoveryOptions {
    /// Compile glob patterns, dropping any that do not parse.
    pub fn with_patterns(patterns: &[String]) -> Self {
        Self {
            ignore_patterns: compile_patterns(patterns),
            skip_existing: None,
        }
    }

    pub fn with_skip_existing(mut self, sources: HashSet<String>) -> Self {
        self.skip_existing = Some(sources);
        self
    }
}

pub(crate) fn compile_patterns(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| match Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!("Ignoring invalid ignore pattern {:?}: {}", p, e);
                None
            }
        })
        .collect()
}

/// Collect supported files under `root`, ordered for scheduling.
///
/// A file `root` is returned on its own if it is supported. Hidden files and
/// directories are never entered.
pub fn discover_files(root: &Path, options: &DiscoveryOptions) -> IngestResult<Vec<PathBuf>> {
    if !root.exists() {
        return Err(IngestError::FileNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    if root.is_file() {
        if FileFormat::from_path(root).is_none() {
            return Err(IngestError::UnsupportedFileType(root.to_string_lossy().to_string()));
        }
        if accept(root, options) {
            files.push(root.to_path_buf());
        }
        return Ok(files);
    }

    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if FileFormat::from_path(path).is_none() {
            continue;
        }
        if accept(path, options) {
            files.push(path.to_path_buf());
        }
    }

    sort_for_scheduling(&mut files);
    debug!("Discovered {} files under {:?}", files.len(), root);
    Ok(files)
}

/// Cheap formats first, then smaller files first.
pub fn sort_for_scheduling(files: &mut [PathBuf]) {
    files.sort_by_cached_key(|path| {
        let rank = FileFormat::from_path(path).map(|f| f.cost_rank()).unwrap_or(u8::MAX);
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(u64::MAX);
        (rank, size, path.clone())
    });
}

/// Glob match against the file name or the full path, plus hidden-file skip.
pub(crate) fn is_ignored(path: &Path, patterns: &[Pattern]) -> bool {
    let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if filename.starts_with('.') {
        return true;
    }

    let path_str = path.to_string_lossy();
    patterns
        .iter()
        .any(|pattern| pattern.matches(filename) || pattern.matches(&path_str))
}

fn accept(path: &Path, options: &DiscoveryOptions) -> bool {
    if is_ignored(path, &options.ignore_patterns) {
        debug!("Ignoring file: {:?}", path);
        return false;
    }
    if let Some(ref existing) = options.skip_existing {
        if existing.contains(path.to_string_lossy().as_ref()) {
            debug!("Already ingested: {:?}", path);
            return false;
        }
    }
    true
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, bytes: usize) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, vec![b'x'; bytes]).unwrap();
    }

    #[test]
    fn test_is_ignored() {
        let patterns = compile_patterns(&["*.tmp".to_string(), ".DS_Store".to_string(), "*/drafts/*".to_string()]);

        assert!(is_ignored(Path::new("/foo/bar/.hidden"), &patterns));
        assert!(is_ignored(Path::new("/foo/bar/file.tmp"), &patterns));
        assert!(is_ignored(Path::new("/foo/.DS_Store"), &patterns));
        assert!(is_ignored(Path::new("/foo/drafts/note.md"), &patterns));
        assert!(!is_ignored(Path::new("/foo/bar/file.txt"), &patterns));
        assert!(!is_ignored(Path::new("/foo/bar/video.mp4"), &patterns));
    }

    #[test]
    fn test_invalid_pattern_is_dropped() {
        let options = DiscoveryOptions::with_patterns(&["[".to_string(), "*.bak".to_string()]);
        assert_eq!(options.ignore_patterns.len(), 1);
    }

    #[test]
    fn test_discover_filters_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("big.txt"), 500);
        touch(&root.join("small.txt"), 10);
        touch(&root.join("paper.pdf"), 20);
        touch(&root.join("notes/readme.md"), 30);
        touch(&root.join("notes/scratch.tmp"), 5);
        touch(&root.join("archive.xyz"), 5);
        touch(&root.join(".git/config.txt"), 5);
        touch(&root.join(".hidden.txt"), 5);

        let options = DiscoveryOptions::with_patterns(&["*.tmp".to_string()]);
        let files = discover_files(root, &options).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["small.txt", "big.txt", "readme.md", "paper.pdf"]);
    }

    #[test]
    fn test_discover_skips_existing_sources() {
        let dir = tempfile::tempdir().unwrap();
        let done = dir.path().join("done.txt");
        let fresh = dir.path().join("fresh.txt");
        touch(&done, 4);
        touch(&fresh, 4);

        let existing: HashSet<String> = [done.to_string_lossy().to_string()].into_iter().collect();
        let options = DiscoveryOptions::default().with_skip_existing(existing);

        let files = discover_files(dir.path(), &options).unwrap();
        assert_eq!(files, vec![fresh]);
    }

    #[test]
    fn test_single_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.md");
        touch(&file, 3);
        let other = dir.path().join("one.xyz");
        touch(&other, 3);

        let options = DiscoveryOptions::default();
        assert_eq!(discover_files(&file, &options).unwrap(), vec![file.clone()]);
        assert!(matches!(
            discover_files(&other, &options),
            Err(IngestError::UnsupportedFileType(_))
        ));
        assert!(matches!(
            discover_files(&dir.path().join("missing"), &options),
            Err(IngestError::FileNotFound(_))
        ));
    }
}
