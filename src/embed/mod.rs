//! Semantic embeddings for callable nodes.
//!
//! The pipeline sends the names of a file's functions and methods through an
//! [`Embedder`] and attaches the vectors as the `embedding` property. A
//! failed or misaligned batch never drops the file; the pipeline just emits
//! it without vectors.

pub mod vertex;

use crate::error::{GraphError, Result};

pub use vertex::VertexEmbedder;

/// Default number of texts per remote request.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default embedding width.
pub const DEFAULT_DIMENSIONS: usize = 768;

/// Text → vector service.
///
/// Implementations must return exactly one vector per input text, in input
/// order, or an error. An empty input returns an empty result.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Split `texts` into chunks of at most `chunk` items, call `call` once per
/// chunk, and concatenate the results in order.
///
/// Each chunk's result must have the chunk's length; a mismatch is an
/// [`GraphError::Embedding`] and aborts the whole batch.
pub fn embed_chunked<F>(texts: &[String], chunk: usize, mut call: F) -> Result<Vec<Vec<f32>>>
where
    F: FnMut(&[String]) -> Result<Vec<Vec<f32>>>,
{
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(chunk.max(1)) {
        let vectors = call(batch)?;
        if vectors.len() != batch.len() {
            return Err(GraphError::Embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }
        out.extend(vectors);
    }
    Ok(out)
}

/// Offline embedder returning zero vectors.
#[derive(Debug, Clone, Copy)]
pub struct ZeroEmbedder {
    /// Vector width.
    pub dimensions: usize,
}

impl ZeroEmbedder {
    /// Zero embedder of the given width.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for ZeroEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl Embedder for ZeroEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.0; self.dimensions]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text-{}", i)).collect()
    }

    #[test]
    fn test_chunked_calls_and_alignment() {
        let mut calls = 0;
        let result = embed_chunked(&texts(250), 100, |batch| {
            calls += 1;
            Ok(batch
                .iter()
                .enumerate()
                .map(|(i, _)| vec![calls as f32, i as f32])
                .collect())
        })
        .expect("chunked embedding");

        assert_eq!(calls, 3);
        assert_eq!(result.len(), 250);
        assert_eq!(result[0], vec![1.0, 0.0]);
        assert_eq!(result[100], vec![2.0, 0.0]);
        assert_eq!(result[199], vec![2.0, 99.0]);
        assert_eq!(result[200], vec![3.0, 0.0]);
    }

    #[test]
    fn test_chunked_length_mismatch_is_error() {
        let result = embed_chunked(&texts(3), 100, |batch| {
            Ok(vec![vec![0.0]; batch.len() - 1])
        });
        match result {
            Err(GraphError::Embedding(msg)) => assert!(msg.contains("expected 3")),
            other => panic!("expected embedding error, got {:?}", other),
        }
    }

    #[test]
    fn test_chunked_empty_input_makes_no_call() {
        let mut called = false;
        let result = embed_chunked(&[], 100, |_| {
            called = true;
            Ok(Vec::new())
        })
        .expect("empty");
        assert!(result.is_empty());
        assert!(!called);
    }

    #[test]
    fn test_zero_embedder() {
        let vectors = ZeroEmbedder::new(4)
            .embed_batch(&texts(2))
            .expect("zero vectors");
        assert_eq!(vectors, vec![vec![0.0; 4], vec![0.0; 4]]);
        assert_eq!(ZeroEmbedder::default().dimensions, DEFAULT_DIMENSIONS);
    }
}
