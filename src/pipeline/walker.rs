//! Feeding the worker pool from a directory tree or a file list.

use super::{FileProcessor, PoolOptions, PoolStats, WorkerPool};
use crate::error::{GraphError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

/// Directory names skipped during traversal unless configured otherwise.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".git", "node_modules", "bin", "obj"];

/// Shared stop flag. Once raised, the walker submits nothing further; jobs
/// already queued still run.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// New, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the flag has been raised.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    /// Pool counters after the queue drained.
    #[serde(flatten)]
    pub pool: PoolStats,
    /// Whether the walk stopped early on cancellation.
    pub cancelled: bool,
}

/// Drives a [`WorkerPool`] for one run.
pub struct Walker {
    options: PoolOptions,
    processor: FileProcessor,
    exclude_dirs: Vec<String>,
}

impl Walker {
    /// Walker with the default exclusion list.
    pub fn new(options: PoolOptions, processor: FileProcessor) -> Self {
        Self {
            options,
            processor,
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Replace the directory names skipped during traversal.
    pub fn with_exclude_dirs(mut self, dirs: Vec<String>) -> Self {
        self.exclude_dirs = dirs;
        self
    }

    /// Recursively ingest every file under `root`, in file-name order.
    pub fn run_dir(&self, root: &Path, cancel: &CancellationToken) -> Result<WalkStats> {
        let files = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !self.is_excluded(&entry.file_name().to_string_lossy())
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path());

        log::info!(
            "Walking {} with {} workers",
            root.display(),
            self.options.workers
        );
        self.run(files, cancel)
    }

    /// Ingest every path listed in `list_path`, one per line. Blank lines are
    /// ignored.
    pub fn run_file_list(&self, list_path: &Path, cancel: &CancellationToken) -> Result<WalkStats> {
        let text = std::fs::read_to_string(list_path).map_err(|source| GraphError::Io {
            path: list_path.to_path_buf(),
            source,
        })?;
        let paths: Vec<PathBuf> = parse_file_list(&text);

        log::info!(
            "Processing {} listed files from {} with {} workers",
            paths.len(),
            list_path.display(),
            self.options.workers
        );
        self.run(paths, cancel)
    }

    /// Ingest an explicit set of paths.
    pub fn run<I>(&self, paths: I, cancel: &CancellationToken) -> Result<WalkStats>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let pool = WorkerPool::start(&self.options, self.processor.clone())?;
        let mut cancelled = false;
        let mut submit_error = None;

        for path in paths {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if let Err(e) = pool.submit(path) {
                submit_error = Some(e);
                break;
            }
        }

        let pool_stats = pool.stop();
        if let Some(e) = submit_error {
            return Err(e);
        }
        if cancelled {
            log::info!("Walk cancelled after {} submissions", pool_stats.submitted);
        }
        Ok(WalkStats {
            pool: pool_stats,
            cancelled,
        })
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
    }
}

/// Non-blank lines of a file list, trimmed.
pub fn parse_file_list(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect()
}
