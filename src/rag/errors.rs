// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the passage store and retrieval
//!
//! Covers:
//! - Input validation (vector/text length mismatch, wrong dimensions, top-k range)
//! - Store invariant violations (labels outside the text list)
//! - Persistence failures (I/O, undecodable or desynchronized files)
//! - Embedding failures while encoding passages or queries

use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::vector::IndexError;

#[derive(Error, Debug)]
pub enum RagError {
    /// `add` was called with different numbers of vectors and texts
    #[error("Length mismatch: {vectors} vectors but {texts} texts")]
    LengthMismatch { vectors: usize, texts: usize },

    /// Vector dimension does not match the store
    #[error("Dimension mismatch: expected {expected}D, got {actual}D")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Requested neighbor count is zero or above the supported maximum
    #[error("top_k must be between 1 and {max}, got {top_k}")]
    InvalidTopK { top_k: usize, max: usize },

    /// Search returned a label that is neither a sentinel nor a stored passage
    #[error("Index returned label {label} but only {len} passages are stored")]
    InvalidLabel { label: i64, len: usize },

    /// Persisted files are unreadable or disagree with each other
    #[error("Persisted store is corrupt: {0}")]
    Corrupt(String),

    #[error("Index error: {0}")]
    Index(IndexError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Text list serialization error: {0}")]
    TextList(#[from] serde_json::Error),
}

impl From<IndexError> for RagError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::DimensionMismatch { expected, actual } => {
                RagError::DimensionMismatch { expected, actual }
            }
            other => RagError::Index(other),
        }
    }
}

impl RagError {
    /// Get error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            RagError::LengthMismatch { .. } => "LENGTH_MISMATCH",
            RagError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            RagError::InvalidTopK { .. } => "INVALID_TOP_K",
            RagError::InvalidLabel { .. } => "INVALID_LABEL",
            RagError::Corrupt(_) => "STORE_CORRUPT",
            RagError::Index(_) => "INDEX_ERROR",
            RagError::Embedding(e) => e.error_code(),
            RagError::Io(_) => "IO_ERROR",
            RagError::TextList(_) => "TEXT_LIST_ERROR",
        }
    }

    /// Caller-supplied data was rejected; the store is unchanged
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RagError::LengthMismatch { .. }
                | RagError::DimensionMismatch { .. }
                | RagError::InvalidTopK { .. }
        )
    }
}
