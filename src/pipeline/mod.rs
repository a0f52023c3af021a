//! Concurrent file ingestion.
//!
//! A [`WorkerPool`] owns N threads draining one bounded queue of paths.
//! Each job runs [`FileProcessor::process`]: analyze, add the `File` node and
//! `DEFINED_IN` edges, attach embeddings, emit. Unsupported extensions, read
//! failures, parse failures and embedding failures only affect the one file;
//! an emitter failure is counted separately because it means the sink is
//! broken.

pub mod walker;

use crate::embed::Embedder;
use crate::emit::Emitter;
use crate::error::{GraphError, Result};
use crate::graph::schema::{self, EDGE_DEFINED_IN, LABEL_FILE, PROP_EMBEDDING};
use crate::graph::{Edge, Fragment, Node};
use crate::ingest::AnalyzerRegistry;
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub use walker::{CancellationToken, WalkStats, Walker};

/// Default worker count.
pub const DEFAULT_WORKERS: usize = 4;

/// Default job queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Worker pool tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Number of worker threads.
    pub workers: usize,
    /// Bounded queue length; `submit` blocks when full.
    pub queue_capacity: usize,
    /// Emit the partial fragment of a file whose analyzer hit a query error.
    pub keep_partial_results: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            keep_partial_results: false,
        }
    }
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Analyzed and emitted.
    Processed,
    /// No analyzer for the extension.
    Skipped,
    /// Unreadable or unparseable; nothing emitted.
    Failed,
}

/// Counters returned by [`WorkerPool::stop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Paths accepted by `submit`.
    pub submitted: usize,
    /// Files analyzed and emitted.
    pub processed: usize,
    /// Files with no registered analyzer.
    pub skipped: usize,
    /// Files that could not be read or parsed.
    pub failed: usize,
    /// Files whose emission failed part-way.
    pub emit_failures: usize,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicUsize,
    processed: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    emit_failures: AtomicUsize,
}

impl Counters {
    fn record(&self, result: &Result<Outcome>) {
        let counter = match result {
            Ok(Outcome::Processed) => &self.processed,
            Ok(Outcome::Skipped) => &self.skipped,
            Ok(Outcome::Failed) => &self.failed,
            Err(_) => &self.emit_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            emit_failures: self.emit_failures.load(Ordering::Relaxed),
        }
    }
}

/// Per-file work shared by every worker.
#[derive(Clone)]
pub struct FileProcessor {
    registry: AnalyzerRegistry,
    embedder: Arc<dyn Embedder>,
    emitter: Arc<dyn Emitter>,
    keep_partial_results: bool,
}

impl FileProcessor {
    /// Create a processor.
    pub fn new(
        registry: AnalyzerRegistry,
        embedder: Arc<dyn Embedder>,
        emitter: Arc<dyn Emitter>,
    ) -> Self {
        Self {
            registry,
            embedder,
            emitter,
            keep_partial_results: false,
        }
    }

    /// Keep partial fragments from analyzer query failures.
    pub fn keep_partial_results(mut self, keep: bool) -> Self {
        self.keep_partial_results = keep;
        self
    }

    /// Analyze and emit one file.
    ///
    /// Returns `Err` only when the emitter fails.
    pub fn process(&self, path: &Path) -> Result<Outcome> {
        let Some(analyzer) = self.registry.lookup_path(path) else {
            log::debug!("No analyzer for {}, skipping", path.display());
            return Ok(Outcome::Skipped);
        };

        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                return Ok(Outcome::Failed);
            }
        };

        let file_id = path.to_string_lossy().into_owned();
        let fragment = match analyzer.parse(&file_id, &content) {
            Ok(fragment) => fragment,
            Err(err) if err.has_partial() && self.keep_partial_results => {
                log::warn!("Keeping partial result for {}: {}", file_id, err);
                err.into_partial().unwrap_or_default()
            }
            Err(err) => {
                log::warn!("Failed to parse {}: {}", file_id, err);
                return Ok(Outcome::Failed);
            }
        };

        let (file_node, defined_in, fragment) =
            self.enrich(&file_id, analyzer.language(), fragment);
        self.emit(&file_node, &defined_in, &fragment)
            .map_err(|e| {
                log::error!("Failed to emit {}: {}", file_id, e);
                e
            })?;
        Ok(Outcome::Processed)
    }

    fn enrich(
        &self,
        file_id: &str,
        language: &str,
        mut fragment: Fragment,
    ) -> (Node, Vec<Edge>, Fragment) {
        let file_node = Node::new(file_id, LABEL_FILE)
            .with_property(schema::PROP_FILE, file_id)
            .with_property(schema::PROP_NAME, file_id)
            .with_property("language", language);

        let defined_in = fragment
            .nodes
            .iter()
            .filter(|n| schema::is_definable(&n.label))
            .map(|n| Edge::new(&n.id, file_id, EDGE_DEFINED_IN))
            .collect();

        self.attach_embeddings(file_id, &mut fragment);
        (file_node, defined_in, fragment)
    }

    fn attach_embeddings(&self, file_id: &str, fragment: &mut Fragment) {
        let (indices, texts): (Vec<usize>, Vec<String>) = fragment
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| schema::is_callable(&n.label))
            .filter_map(|(i, n)| n.name().map(|name| (i, name.to_string())))
            .unzip();
        if texts.is_empty() {
            return;
        }

        match self.embedder.embed_batch(&texts) {
            Ok(vectors) if vectors.len() == indices.len() => {
                for (i, vector) in indices.into_iter().zip(vectors) {
                    fragment.nodes[i].set_property(PROP_EMBEDDING, vector);
                }
            }
            Ok(vectors) => log::warn!(
                "Embedding count mismatch for {}: expected {}, got {}; continuing without embeddings",
                file_id,
                indices.len(),
                vectors.len()
            ),
            Err(e) => log::warn!(
                "Failed to embed batch for {}: {}; continuing without embeddings",
                file_id,
                e
            ),
        }
    }

    fn emit(&self, file_node: &Node, defined_in: &[Edge], fragment: &Fragment) -> Result<()> {
        self.emitter.emit_node(file_node)?;
        for edge in defined_in {
            self.emitter.emit_edge(edge)?;
        }
        for node in &fragment.nodes {
            self.emitter.emit_node(node)?;
        }
        for edge in &fragment.edges {
            self.emitter.emit_edge(edge)?;
        }
        Ok(())
    }
}

/// Fixed set of worker threads over a bounded path queue.
pub struct WorkerPool {
    sender: Option<Sender<PathBuf>>,
    handles: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Spawn `options.workers` threads.
    pub fn start(options: &PoolOptions, processor: FileProcessor) -> Result<Self> {
        let processor = processor.keep_partial_results(options.keep_partial_results);
        let (sender, receiver) = crossbeam_channel::bounded(options.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());

        let mut handles = Vec::with_capacity(options.workers);
        for index in 0..options.workers.max(1) {
            let receiver: Receiver<PathBuf> = receiver.clone();
            let processor = processor.clone();
            let counters = Arc::clone(&counters);
            let handle = std::thread::Builder::new()
                .name(format!("graphdb-worker-{}", index))
                .spawn(move || {
                    for path in receiver.iter() {
                        counters.record(&processor.process(&path));
                    }
                })
                .map_err(|e| GraphError::Other(format!("failed to spawn worker: {}", e)))?;
            handles.push(handle);
        }

        Ok(Self {
            sender: Some(sender),
            handles,
            counters,
        })
    }

    /// Queue a path, blocking while the queue is full.
    pub fn submit(&self, path: impl Into<PathBuf>) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| GraphError::Other("worker pool is stopped".to_string()))?;
        sender
            .send(path.into())
            .map_err(|_| GraphError::Other("all workers have exited".to_string()))?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Close the queue, wait for every queued job to finish, and return the
    /// counters.
    pub fn stop(mut self) -> PoolStats {
        self.shutdown();
        self.counters.snapshot()
    }

    fn shutdown(&mut self) {
        drop(self.sender.take());
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::schema::{LABEL_FUNCTION, PROP_EMBEDDING};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect {
        nodes: Mutex<Vec<Node>>,
        edges: Mutex<Vec<Edge>>,
    }

    impl Emitter for Collect {
        fn emit_node(&self, node: &Node) -> Result<()> {
            self.nodes.lock().push(node.clone());
            Ok(())
        }

        fn emit_edge(&self, edge: &Edge) -> Result<()> {
            self.edges.lock().push(edge.clone());
            Ok(())
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    struct Fixed(Vec<f32>);

    impl Embedder for Fixed {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }
    }

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).expect("write fixture");
        path
    }

    #[test]
    fn test_process_emits_file_node_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(dir.path(), "lib.ts", "function helper() {}\nfunction greet() { helper(); }\n");
        let emitter = Arc::new(Collect::default());
        let processor = FileProcessor::new(
            AnalyzerRegistry::with_defaults(),
            Arc::new(Fixed(vec![1.0, 2.0])),
            emitter.clone(),
        );

        assert_eq!(processor.process(&path).expect("process"), Outcome::Processed);

        let nodes = emitter.nodes.lock();
        let file_id = path.to_string_lossy().into_owned();
        assert_eq!(nodes[0].id, file_id);
        assert_eq!(nodes[0].label, LABEL_FILE);
        assert_eq!(nodes[0].property("language").and_then(|v| v.as_str()), Some("typescript"));

        let greet = nodes.iter().find(|n| n.name() == Some("greet")).expect("greet");
        assert_eq!(greet.label, LABEL_FUNCTION);
        assert_eq!(greet.property(PROP_EMBEDDING), Some(&serde_json::json!([1.0, 2.0])));

        let edges = emitter.edges.lock();
        assert_eq!(edges[0].edge_type, EDGE_DEFINED_IN);
        assert_eq!(edges.iter().filter(|e| e.edge_type == EDGE_DEFINED_IN).count(), 2);
    }

    #[test]
    fn test_unsupported_and_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let readme = write(dir.path(), "README.md", "# hi");
        let processor = FileProcessor::new(
            AnalyzerRegistry::with_defaults(),
            Arc::new(Fixed(vec![])),
            Arc::new(Collect::default()),
        );

        assert_eq!(processor.process(&readme).expect("skip"), Outcome::Skipped);
        assert_eq!(
            processor.process(&dir.path().join("gone.ts")).expect("fail"),
            Outcome::Failed
        );
    }

    #[test]
    fn test_pool_counts_every_submission() {
        let dir = tempfile::tempdir().expect("tempdir");
        let emitter = Arc::new(Collect::default());
        let processor = FileProcessor::new(
            AnalyzerRegistry::with_defaults(),
            Arc::new(Fixed(vec![0.0])),
            emitter.clone(),
        );
        let options = PoolOptions {
            workers: 2,
            queue_capacity: 1,
            keep_partial_results: false,
        };
        let pool = WorkerPool::start(&options, processor).expect("start");
        for i in 0..5 {
            pool.submit(write(dir.path(), &format!("f{}.ts", i), "function f() {}\n"))
                .expect("submit");
        }
        pool.submit(write(dir.path(), "notes.txt", "")).expect("submit");

        let stats = pool.stop();
        assert_eq!(
            stats,
            PoolStats {
                submitted: 6,
                processed: 5,
                skipped: 1,
                failed: 0,
                emit_failures: 0,
            }
        );
        let files = emitter
            .nodes
            .lock()
            .iter()
            .filter(|n| n.label == LABEL_FILE)
            .count();
        assert_eq!(files, 5);
    }
}
