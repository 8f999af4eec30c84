// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wiring shared by the server and the CLI

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::chat::ChatService;
use crate::completion::OpenAiCompletionProvider;
use crate::config::{ChatbotConfig, EmbeddingBackend};
use crate::embeddings::{
    EmbeddingProvider, HashedEmbeddingProvider, OnnxEmbeddingModel, MINILM_DIMENSION,
};
use crate::rag::{RetrievalService, VectorStore};

const ONNX_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Loads the configured embedding backend
pub async fn build_embedder(config: &ChatbotConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.embedding_backend {
        EmbeddingBackend::Onnx => Arc::new(
            OnnxEmbeddingModel::new(
                ONNX_MODEL_NAME,
                &config.embedding_model_path,
                &config.embedding_tokenizer_path,
            )
            .await
            .context("Failed to load ONNX embedding model")?,
        ),
        EmbeddingBackend::Hashed => Arc::new(HashedEmbeddingProvider::new(MINILM_DIMENSION)?),
    };

    info!(
        "Embedding provider ready: {} ({} dims)",
        embedder.name(),
        embedder.dimension()
    );
    Ok(embedder)
}

/// Loads the embedder and restores the persisted store from `data_dir`
pub async fn open_retrieval(config: &ChatbotConfig) -> Result<RetrievalService> {
    let embedder = build_embedder(config).await?;
    let store = VectorStore::open(config.store_paths(), embedder.dimension())
        .await
        .with_context(|| {
            format!(
                "Failed to open vector store in {}",
                config.data_dir.display()
            )
        })?;

    Ok(RetrievalService::new(embedder, Arc::new(store)))
}

/// Builds the full chat pipeline; requires a completion API key
pub async fn build_chat_service(config: &ChatbotConfig) -> Result<ChatService> {
    config.validate().map_err(anyhow::Error::msg)?;

    let retrieval = open_retrieval(config).await?;
    let completion = OpenAiCompletionProvider::new(config.completion.clone())?;

    Ok(ChatService::new(retrieval, Arc::new(completion)).with_top_k(config.retrieval_top_k))
}
