// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retrieval service: query text in, nearest stored passages out

use std::sync::Arc;
use tracing::debug;

use super::errors::RagError;
use super::vector_store::{check_top_k, VectorStore};
use crate::embeddings::{EmbeddingError, EmbeddingProvider};

/// Number of passages retrieved per query unless configured otherwise
pub const DEFAULT_TOP_K: usize = 3;

/// Largest number of passages a single query may ask for
pub const MAX_TOP_K: usize = 100;

/// Encodes text with an [`EmbeddingProvider`] and looks it up in a [`VectorStore`]
#[derive(Clone)]
pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<VectorStore>,
}

impl RetrievalService {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Returns up to `top_k` stored passages closest to `query`, closest first
    ///
    /// An empty store yields an empty list, not an error. `top_k` outside
    /// `1..=MAX_TOP_K` is rejected before the query is embedded.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>, RagError> {
        check_top_k(top_k)?;

        let query_vector = self.embedder.encode_one(query).await?;
        let passages = self.store.search_texts(&query_vector, top_k).await?;

        if passages.len() < top_k {
            debug!(
                "Retrieved {} of {} requested passages (store holds {})",
                passages.len(),
                top_k,
                self.store.len().await
            );
        }

        Ok(passages)
    }

    /// Embeds `texts` and appends them to the store, which persists them
    ///
    /// # Returns
    /// Number of passages in the store afterwards
    pub async fn add_texts(&self, texts: Vec<String>) -> Result<usize, RagError> {
        if texts.is_empty() {
            return Ok(self.store.len().await);
        }

        let vectors = self.embedder.encode(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                inputs: texts.len(),
                outputs: vectors.len(),
            }
            .into());
        }

        self.store.add(vectors, texts).await
    }
}
