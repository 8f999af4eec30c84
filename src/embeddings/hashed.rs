// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Feature-hashing embedding provider
//!
//! Lower-cased alphanumeric tokens are hashed with SHA-256 into `dimension`
//! buckets and the resulting term-count vector is L2-normalized. Texts that
//! share words end up close together, which is enough for offline runs and
//! tests that must not depend on ONNX model files.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{EmbeddingError, EmbeddingProvider};

#[derive(Debug, Clone)]
pub struct HashedEmbeddingProvider {
    dimension: usize,
}

impl HashedEmbeddingProvider {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::ModelLoad(
                "Embedding dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(prefix) % self.dimension as u64) as usize
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            embedding[self.bucket(&token.to_lowercase())] += 1.0;
        }

        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbeddingProvider {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashed-bow"
    }
}
