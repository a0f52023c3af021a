//! Graphdb error types.
//!
//! All errors are typed and provide root cause information.

use crate::graph::Fragment;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for graph extraction.
#[derive(Error, Debug)]
pub enum GraphError {
    /// I/O error during file operations.
    #[error("I/O error for path {path}: {source}")]
    Io {
        /// The file path that caused the I/O error.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Tree-sitter parsing error.
    #[error("Parse error in {file}: {message}")]
    Parse {
        /// The file that failed to parse.
        file: String,
        /// The parse error message.
        message: String,
    },

    /// A structural query failed part-way through a file.
    ///
    /// `partial` holds whatever nodes and edges were collected before the
    /// failure.
    #[error("Query error in {file}: {message}")]
    Query {
        /// The file being analyzed.
        file: String,
        /// The query error message.
        message: String,
        /// Fragment collected before the failure.
        partial: Box<Fragment>,
    },

    /// Embedding service failure or misaligned result.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// HTTP transport error talking to an external service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Output sink failure.
    #[error("Emit error: {0}")]
    Emit(String),

    /// Invalid or unreadable configuration.
    #[error("Config error in {path}: {message}")]
    Config {
        /// Config source (file path or environment variable).
        path: String,
        /// What was wrong.
        message: String,
    },

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl GraphError {
    /// Whether this error carries a usable partial fragment.
    pub fn has_partial(&self) -> bool {
        matches!(self, GraphError::Query { .. })
    }

    /// Consume the error, returning its partial fragment if any.
    pub fn into_partial(self) -> Option<Fragment> {
        match self {
            GraphError::Query { partial, .. } => Some(*partial),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GraphError {
    fn from(err: std::io::Error) -> Self {
        GraphError::Io {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

/// Result type alias for graph extraction operations.
pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Fragment, Node};

    #[test]
    fn test_query_error_keeps_partial_fragment() {
        let mut partial = Fragment::default();
        partial.nodes.push(Node::new("a.cpp:f", "Function"));

        let err = GraphError::Query {
            file: "a.cpp".to_string(),
            message: "bad pattern".to_string(),
            partial: Box::new(partial),
        };

        assert!(err.has_partial());
        assert!(err.to_string().contains("a.cpp"));
        let fragment = err.into_partial().expect("partial fragment");
        assert_eq!(fragment.nodes.len(), 1);
    }

    #[test]
    fn test_parse_error_has_no_partial() {
        let err = GraphError::Parse {
            file: "a.java".to_string(),
            message: "no tree".to_string(),
        };
        assert!(!err.has_partial());
        assert!(err.into_partial().is_none());
    }
}
