// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat orchestration: retrieve context, build the prompt, ask the model

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::completion::{CompletionError, CompletionProvider};
use crate::rag::{RagError, RetrievalService, DEFAULT_TOP_K};

/// System message sent with every completion request
pub const SYSTEM_PROMPT: &str = "You are an intelligent assistant.";

/// Context used when retrieval finds no passages
pub const NO_CONTEXT_PLACEHOLDER: &str = "No relevant context found.";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RagError),

    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),
}

impl ChatError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ChatError::Retrieval(e) => e.error_code(),
            ChatError::Completion(e) => e.error_code(),
        }
    }
}

/// Builds the user prompt from retrieved passages and the raw query
///
/// Passages are joined with newlines in the order given.
pub fn build_prompt(passages: &[String], query: &str) -> String {
    let context = if passages.is_empty() {
        NO_CONTEXT_PLACEHOLDER.to_string()
    } else {
        passages.join("\n")
    };

    format!("Context:\n{}\n\nUser: {}\nAI:", context, query)
}

/// Answers queries by grounding a hosted model in stored passages
pub struct ChatService {
    retrieval: RetrievalService,
    completion: Arc<dyn CompletionProvider>,
    top_k: usize,
}

impl ChatService {
    pub fn new(retrieval: RetrievalService, completion: Arc<dyn CompletionProvider>) -> Self {
        Self {
            retrieval,
            completion,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn retrieval(&self) -> &RetrievalService {
        &self.retrieval
    }

    pub async fn answer(&self, query: &str) -> Result<String, ChatError> {
        let start = std::time::Instant::now();

        let passages = self.retrieval.retrieve(query, self.top_k).await?;
        debug!("Using {} passages as context", passages.len());

        let prompt = build_prompt(&passages, query);
        let response = self.completion.complete(SYSTEM_PROMPT, &prompt).await?;

        info!(
            "Answered query via {} ({} passages, {}ms)",
            self.completion.name(),
            passages.len(),
            start.elapsed().as_millis()
        );

        Ok(response.trim().to_string())
    }

    /// Embeds and stores passages for later retrieval
    ///
    /// # Returns
    /// Number of passages in the store afterwards
    pub async fn add_texts(&self, texts: Vec<String>) -> Result<usize, ChatError> {
        let added = texts.len();
        let total = self.retrieval.add_texts(texts).await?;
        info!("Added {} passages (store now holds {})", added, total);
        Ok(total)
    }
}
