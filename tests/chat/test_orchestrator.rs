// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ChatService end to end with a deterministic embedder and a recording model

use async_trait::async_trait;
use fabstir_rag_chat::chat::{ChatService, NO_CONTEXT_PLACEHOLDER, SYSTEM_PROMPT};
use fabstir_rag_chat::completion::{CompletionError, CompletionProvider};
use fabstir_rag_chat::embeddings::HashedEmbeddingProvider;
use fabstir_rag_chat::rag::{RetrievalService, StorePaths, VectorStore};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct RecordingCompletion {
    prompts: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        Ok(format!("  answer #{}  ", self.prompts.lock().unwrap().len()))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

async fn service_in(dir: &TempDir, completion: Arc<RecordingCompletion>) -> ChatService {
    let embedder = Arc::new(HashedEmbeddingProvider::new(384).unwrap());
    let store = VectorStore::open(StorePaths::in_dir(dir.path()), 384)
        .await
        .unwrap();
    ChatService::new(RetrievalService::new(embedder, Arc::new(store)), completion)
}

#[tokio::test]
async fn test_sky_question_grounds_prompt_in_sky_passage() {
    let dir = TempDir::new().unwrap();
    let completion = Arc::new(RecordingCompletion::default());
    let service = service_in(&dir, completion.clone()).await.with_top_k(1);

    service
        .add_texts(vec![
            "The sky is blue.".to_string(),
            "Water boils at 100C.".to_string(),
        ])
        .await
        .unwrap();

    let passages = service
        .retrieval()
        .retrieve("What color is the sky?", 1)
        .await
        .unwrap();
    assert_eq!(passages, vec!["The sky is blue.".to_string()]);

    let answer = service.answer("What color is the sky?").await.unwrap();
    assert_eq!(answer, "answer #1");

    let prompts = completion.prompts.lock().unwrap();
    let (system, user) = &prompts[0];
    assert_eq!(system, SYSTEM_PROMPT);
    assert_eq!(
        user,
        "Context:\nThe sky is blue.\n\nUser: What color is the sky?\nAI:"
    );
    assert!(!user.contains("Water boils"));
}

#[tokio::test]
async fn test_default_top_k_joins_three_passages() {
    let dir = TempDir::new().unwrap();
    let completion = Arc::new(RecordingCompletion::default());
    let service = service_in(&dir, completion.clone()).await;
    assert_eq!(service.top_k(), 3);

    service
        .add_texts(
            ["alpha one", "beta two", "gamma three", "delta four"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .await
        .unwrap();

    service.answer("alpha").await.unwrap();

    let prompts = completion.prompts.lock().unwrap();
    let user = &prompts[0].1;
    let context = user
        .strip_prefix("Context:\n")
        .and_then(|rest| rest.split("\n\nUser: ").next())
        .unwrap();
    let lines: Vec<&str> = context.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "alpha one");
}

#[tokio::test]
async fn test_empty_store_prompt_uses_placeholder() {
    let dir = TempDir::new().unwrap();
    let completion = Arc::new(RecordingCompletion::default());
    let service = service_in(&dir, completion.clone()).await;

    service.answer("Is anyone there?").await.unwrap();

    let prompts = completion.prompts.lock().unwrap();
    assert_eq!(
        prompts[0].1,
        format!(
            "Context:\n{}\n\nUser: Is anyone there?\nAI:",
            NO_CONTEXT_PLACEHOLDER
        )
    );
}

#[tokio::test]
async fn test_passages_survive_restart() {
    let dir = TempDir::new().unwrap();
    let completion = Arc::new(RecordingCompletion::default());

    let first = service_in(&dir, completion.clone()).await;
    first
        .add_texts(vec!["The sky is blue.".to_string()])
        .await
        .unwrap();
    drop(first);

    let second = service_in(&dir, completion.clone()).await;
    second.answer("sky color?").await.unwrap();

    let prompts = completion.prompts.lock().unwrap();
    assert!(prompts[0].1.contains("The sky is blue."));
}
