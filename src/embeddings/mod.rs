// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Text embedding providers
//!
//! An [`EmbeddingProvider`] maps text to fixed-length dense vectors. The same
//! provider must be used for indexing passages and for encoding queries,
//! otherwise distances between the two are meaningless.

pub mod hashed;
pub mod onnx_model;

use async_trait::async_trait;
use thiserror::Error;

pub use hashed::HashedEmbeddingProvider;
pub use onnx_model::OnnxEmbeddingModel;

/// Output dimension of all-MiniLM-L6-v2
pub const MINILM_DIMENSION: usize = 384;

/// Errors produced while generating embeddings
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Failed to load embedding model: {0}")]
    ModelLoad(String),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Embedding inference failed: {0}")]
    Inference(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding count mismatch: {inputs} inputs produced {outputs} vectors")]
    CountMismatch { inputs: usize, outputs: usize },
}

impl EmbeddingError {
    /// Get error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            EmbeddingError::ModelLoad(_) => "EMBEDDING_MODEL_LOAD",
            EmbeddingError::Tokenization(_) => "EMBEDDING_TOKENIZATION",
            EmbeddingError::Inference(_) => "EMBEDDING_INFERENCE",
            EmbeddingError::DimensionMismatch { .. } => "EMBEDDING_DIMENSION_MISMATCH",
            EmbeddingError::CountMismatch { .. } => "EMBEDDING_COUNT_MISMATCH",
        }
    }
}

/// Capability set of a sentence-embedding backend
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Encodes each text into one vector, in input order
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Length of every vector returned by [`EmbeddingProvider::encode`]
    fn dimension(&self) -> usize;

    /// Model name for logging
    fn name(&self) -> &str;

    /// Encodes a single text
    async fn encode_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.encode(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                inputs: 1,
                outputs: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }
}
