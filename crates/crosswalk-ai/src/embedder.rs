//! Embedding capability.
//!
//! The engine never computes embeddings itself; it asks an
//! [`EmbeddingProvider`] for one vector per fingerprint in a single batched
//! call per run. Any failure here is fatal for the run.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding {index} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{0}")]
    Other(String),
}

/// Turns texts into fixed-length vectors.
///
/// Implementations must return exactly one vector per input, in input
/// order, with the same dimensionality for every vector of a run.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Check count and dimensionality of a provider's output.
pub fn check_embeddings(expected: usize, vectors: &[Vec<f32>]) -> Result<usize, EmbedError> {
    if vectors.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }
    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    for (index, v) in vectors.iter().enumerate() {
        if v.len() != dim || dim == 0 {
            return Err(EmbedError::DimensionMismatch {
                index,
                expected: dim,
                actual: v.len(),
            });
        }
    }
    Ok(dim)
}
