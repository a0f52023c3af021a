//! Command-line interface for graphdb.
//!
//! This module handles argument parsing and user interface only.
//! Extraction lives in the library; the binary wires the pieces together.

use crate::config::{EmbeddingProvider, IngestConfig};
use crate::error::GraphError;
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

/// graphdb: source-graph extraction for mixed-language trees.
#[derive(Parser, Debug)]
#[command(name = "graphdb")]
#[command(author, version, about, long_about = None)]
#[command(subcommand_required = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available graphdb commands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Extract nodes and edges from a source tree into JSONL.
    Ingest(IngestArgs),
}

/// Arguments of `graphdb ingest`.
#[derive(clap::Args, Debug, Clone)]
pub struct IngestArgs {
    /// Directory to walk.
    #[arg(short, long, default_value = ".", conflicts_with = "file_list")]
    pub dir: PathBuf,

    /// File containing one path per line, instead of walking a directory.
    #[arg(long, value_name = "FILE")]
    pub file_list: Option<PathBuf>,

    /// Single interleaved JSONL output.
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["nodes", "edges"])]
    pub output: Option<PathBuf>,

    /// Node stream for split output (requires --edges).
    #[arg(long, value_name = "FILE", requires = "edges")]
    pub nodes: Option<PathBuf>,

    /// Edge stream for split output (requires --nodes).
    #[arg(long, value_name = "FILE", requires = "nodes")]
    pub edges: Option<PathBuf>,

    /// Worker threads.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Embedding provider.
    #[arg(long, value_name = "PROVIDER")]
    pub embedding: Option<EmbeddingProvider>,

    /// Cloud project for the vertex provider.
    #[arg(long)]
    pub project: Option<String>,

    /// Cloud region for the vertex provider.
    #[arg(long)]
    pub location: Option<String>,

    /// Keep partial fragments when an analyzer query fails.
    #[arg(long)]
    pub keep_partial: bool,
}

/// Where emitted lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Interleaved stream on stdout.
    Stdout,
    /// Interleaved stream in one file.
    File(PathBuf),
    /// Nodes and edges in two files.
    Split {
        /// Node stream.
        nodes: PathBuf,
        /// Edge stream.
        edges: PathBuf,
    },
}

impl IngestArgs {
    /// Apply flag overrides on top of file and environment settings.
    pub fn apply(&self, config: &mut IngestConfig) {
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(provider) = self.embedding {
            config.embedding.provider = provider;
        }
        if let Some(project) = &self.project {
            config.embedding.project = Some(project.clone());
        }
        if let Some(location) = &self.location {
            config.embedding.location = location.clone();
        }
        if self.keep_partial {
            config.keep_partial_results = true;
        }
    }

    /// Selected output.
    pub fn output_target(&self) -> OutputTarget {
        match (&self.nodes, &self.edges, &self.output) {
            (Some(nodes), Some(edges), _) => OutputTarget::Split {
                nodes: nodes.clone(),
                edges: edges.clone(),
            },
            (_, _, Some(path)) => OutputTarget::File(path.clone()),
            _ => OutputTarget::Stdout,
        }
    }
}

/// Parse CLI arguments from the process.
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// JSON success payload for CLI responses.
#[derive(Serialize)]
pub struct CliSuccessPayload {
    /// Status indicator ("ok").
    pub status: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CliSuccessPayload {
    /// Construct a payload with structured data.
    pub fn with_data(message: String, data: Value) -> Self {
        Self {
            status: "ok",
            message,
            data: Some(data),
        }
    }
}

/// JSON error payload for CLI responses.
#[derive(Serialize)]
pub struct CliErrorPayload {
    /// Status indicator ("error").
    pub status: &'static str,
    /// Error kind identifier (Config, Emit, ...).
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl CliErrorPayload {
    /// Build payload from a GraphError instance.
    pub fn from_error(error: &GraphError) -> Self {
        let kind = match error {
            GraphError::Io { .. } => "Io",
            GraphError::Parse { .. } => "Parse",
            GraphError::Query { .. } => "Query",
            GraphError::Embedding(_) => "Embedding",
            GraphError::Http(_) => "Http",
            GraphError::Json(_) => "Json",
            GraphError::Emit(_) => "Emit",
            GraphError::Config { .. } => "Config",
            GraphError::Other(_) => "Other",
        };
        Self {
            status: "error",
            kind,
            message: error.to_string(),
        }
    }
}
