//! graphdb: source-graph extraction engine.
//!
//! Turns a mixed-language source tree (C/C++, C#, Java, TypeScript, T-SQL,
//! VB.NET, ASP/ASP.NET) into a property graph of code entities and their
//! relationships, emitted as newline-delimited JSON.
//!
//! Per file, an [`ingest::Analyzer`] chosen by extension produces a
//! [`graph::Fragment`]; the [`pipeline`] adds the `File` node, `DEFINED_IN`
//! edges and embeddings, then hands everything to an [`emit::Emitter`].
//! Edges may point at IDs defined in other files; merging is left to the
//! store that consumes the output.

#![warn(missing_docs)]
// env_logger is used by src/main.rs (binary), not this library
#![expect(unused_crate_dependencies)]

pub mod cli;
pub mod config;
pub mod embed;
pub mod emit;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod pipeline;
pub mod resolve;

/// Re-export common error types for convenience.
pub use error::{GraphError, Result};

/// Re-export graph types for convenience.
pub use graph::{Edge, Fragment, Node};

/// graphdb version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
