//! Run configuration.
//!
//! Sources in increasing priority: built-in defaults, an optional TOML file,
//! environment variables, then CLI flags (applied by the binary).

use crate::embed::vertex::{DEFAULT_LOCATION, DEFAULT_MODEL};
use crate::embed::{Embedder, VertexEmbedder, ZeroEmbedder, DEFAULT_BATCH_SIZE, DEFAULT_DIMENSIONS};
use crate::error::{GraphError, Result};
use crate::pipeline::walker::DEFAULT_EXCLUDE_DIRS;
use crate::pipeline::{PoolOptions, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Worker count override.
pub const ENV_WORKERS: &str = "GRAPHDB_WORKERS";
/// Vertex project override.
pub const ENV_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
/// Vertex location override.
pub const ENV_LOCATION: &str = "GOOGLE_CLOUD_LOCATION";
/// Embedding model override.
pub const ENV_MODEL: &str = "GRAPHDB_EMBEDDING_MODEL";
/// Vertex bearer token.
pub const ENV_ACCESS_TOKEN: &str = "VERTEX_ACCESS_TOKEN";

/// Which embedder to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Zero vectors, no network.
    #[default]
    Zero,
    /// Vertex AI `:predict`.
    Vertex,
}

/// `[embedding]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `zero` or `vertex`.
    pub provider: EmbeddingProvider,
    /// Cloud project, required for `vertex`.
    pub project: Option<String>,
    /// Cloud region.
    pub location: String,
    /// Model name.
    pub model: String,
    /// Endpoint base; defaults to the regional Vertex host.
    pub endpoint: Option<String>,
    /// Bearer token; never written back out.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// Texts per remote request.
    pub batch_size: usize,
    /// Vector width of the zero embedder.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Zero,
            project: None,
            location: DEFAULT_LOCATION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: None,
            access_token: None,
            batch_size: DEFAULT_BATCH_SIZE,
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

impl EmbeddingConfig {
    /// Build the configured embedder.
    pub fn build(&self) -> Result<Arc<dyn Embedder>> {
        match self.provider {
            EmbeddingProvider::Zero => Ok(Arc::new(ZeroEmbedder::new(self.dimensions))),
            EmbeddingProvider::Vertex => {
                let project = self
                    .project
                    .as_deref()
                    .ok_or_else(|| config_error("embedding", "vertex provider requires a project"))?;
                let token = self.access_token.as_deref().ok_or_else(|| {
                    config_error(ENV_ACCESS_TOKEN, "vertex provider requires an access token")
                })?;
                let mut embedder = VertexEmbedder::new(project, &self.location, token)
                    .with_model(&self.model)
                    .with_batch_size(self.batch_size);
                if let Some(endpoint) = &self.endpoint {
                    embedder = embedder.with_base_url(endpoint);
                }
                Ok(Arc::new(embedder))
            }
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Worker threads.
    pub workers: usize,
    /// Bounded job queue length.
    pub queue_capacity: usize,
    /// Emit partial fragments from analyzer query failures.
    pub keep_partial_results: bool,
    /// Directory names skipped during traversal.
    pub exclude_dirs: Vec<String>,
    /// `[embedding]` table.
    pub embedding: EmbeddingConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            keep_partial_results: false,
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|d| d.to_string()).collect(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            GraphError::Config { message, .. } => GraphError::Config {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| config_error("<toml>", &e.to_string()))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(workers) = get(ENV_WORKERS) {
            self.workers = workers
                .trim()
                .parse()
                .map_err(|_| config_error(ENV_WORKERS, &format!("not a number: {}", workers)))?;
        }
        if let Some(project) = get(ENV_PROJECT) {
            self.embedding.project = Some(project);
        }
        if let Some(location) = get(ENV_LOCATION) {
            self.embedding.location = location;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.embedding.model = model;
        }
        if let Some(token) = get(ENV_ACCESS_TOKEN) {
            self.embedding.access_token = Some(token);
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(config_error("workers", "must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(config_error("queue_capacity", "must be at least 1"));
        }
        if self.embedding.batch_size == 0 {
            return Err(config_error("embedding.batch_size", "must be at least 1"));
        }
        if self.embedding.provider == EmbeddingProvider::Vertex && self.embedding.project.is_none() {
            return Err(config_error(
                "embedding.project",
                &format!("vertex provider requires a project (set {})", ENV_PROJECT),
            ));
        }
        Ok(())
    }

    /// Worker pool settings.
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            keep_partial_results: self.keep_partial_results,
        }
    }
}

fn config_error(path: &str, message: &str) -> GraphError {
    GraphError::Config {
        path: path.to_string(),
        message: message.to_string(),
    }
}
