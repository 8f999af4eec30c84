// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Persist/restore behaviour of the passage store

use fabstir_rag_chat::embeddings::HashedEmbeddingProvider;
use fabstir_rag_chat::rag::{RagError, RetrievalService, StorePaths, VectorStore};
use std::sync::Arc;
use tempfile::TempDir;

const DIMENSION: usize = 384;

fn passages() -> Vec<String> {
    [
        "The sky is blue.",
        "Water boils at 100C.",
        "Rust guarantees memory safety without a garbage collector.",
        "The Pacific is the largest ocean on Earth.",
        "Photosynthesis turns sunlight into chemical energy.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

async fn retrieval_in(dir: &TempDir) -> RetrievalService {
    let embedder = Arc::new(HashedEmbeddingProvider::new(DIMENSION).unwrap());
    let store = VectorStore::open(StorePaths::in_dir(dir.path()), DIMENSION)
        .await
        .unwrap();
    RetrievalService::new(embedder, Arc::new(store))
}

#[tokio::test]
async fn test_restore_reproduces_search_order() {
    let dir = TempDir::new().unwrap();
    let queries = [
        "What color is the sky?",
        "When does water boil?",
        "largest ocean",
        "memory safety",
    ];

    let original = retrieval_in(&dir).await;
    original.add_texts(passages()).await.unwrap();
    let mut before = Vec::new();
    for query in queries {
        before.push(original.retrieve(query, 3).await.unwrap());
    }
    drop(original);

    let restored = retrieval_in(&dir).await;
    assert_eq!(restored.store().len().await, passages().len());
    for (query, expected) in queries.iter().zip(before) {
        assert_eq!(restored.retrieve(query, 3).await.unwrap(), expected);
    }
}

#[tokio::test]
async fn test_retrieve_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let retrieval = retrieval_in(&dir).await;
    retrieval.add_texts(passages()).await.unwrap();

    let first = retrieval.retrieve("blue sky", 3).await.unwrap();
    let second = retrieval.retrieve("blue sky", 3).await.unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_adds_accumulate_across_restarts() {
    let dir = TempDir::new().unwrap();

    let first = retrieval_in(&dir).await;
    first
        .add_texts(vec!["The sky is blue.".to_string()])
        .await
        .unwrap();
    drop(first);

    let second = retrieval_in(&dir).await;
    let total = second
        .add_texts(vec!["Water boils at 100C.".to_string()])
        .await
        .unwrap();
    assert_eq!(total, 2);

    let texts: Vec<String> =
        serde_json::from_slice(&std::fs::read(dir.path().join("texts.json")).unwrap()).unwrap();
    assert_eq!(texts, vec!["The sky is blue.", "Water boils at 100C."]);
}

#[tokio::test]
async fn test_missing_index_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let retrieval = retrieval_in(&dir).await;
    retrieval.add_texts(passages()).await.unwrap();

    std::fs::remove_file(dir.path().join("vector_index.bin")).unwrap();

    let reopened = retrieval_in(&dir).await;
    assert!(reopened.store().is_empty().await);
    assert!(reopened.retrieve("sky", 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_undecodable_index_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let retrieval = retrieval_in(&dir).await;
    retrieval.add_texts(passages()).await.unwrap();

    std::fs::write(dir.path().join("vector_index.bin"), b"not an index").unwrap();

    let result = VectorStore::<fabstir_rag_chat::vector::FlatL2Index>::open(
        StorePaths::in_dir(dir.path()),
        DIMENSION,
    )
    .await;
    assert!(matches!(result, Err(RagError::Corrupt(_))));
}

#[tokio::test]
async fn test_dimension_change_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let retrieval = retrieval_in(&dir).await;
    retrieval.add_texts(passages()).await.unwrap();

    let result: Result<VectorStore, _> =
        VectorStore::open(StorePaths::in_dir(dir.path()), 128).await;
    assert!(matches!(result, Err(RagError::Corrupt(_))));
}

#[tokio::test]
async fn test_failed_persist_rolls_back() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"a file, not a directory").unwrap();

    // Parent of both store files is a regular file, so every write fails
    let store: VectorStore = VectorStore::new(StorePaths::in_dir(blocker.join("data")), 2).unwrap();

    let result = store
        .add(vec![vec![1.0, 0.0]], vec!["lost".to_string()])
        .await;

    assert!(matches!(result, Err(RagError::Io(_))));
    assert_eq!(store.len().await, 0);
    assert!(store.search(&[1.0, 0.0], 1).await.unwrap()[0].is_sentinel());
}

#[tokio::test]
async fn test_unwritable_text_list_keeps_previous_files() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::in_dir(dir.path());
    let store: VectorStore = VectorStore::open(paths.clone(), 2).await.unwrap();
    store
        .add(vec![vec![1.0, 0.0]], vec!["kept".to_string()])
        .await
        .unwrap();

    let index_before = std::fs::read(&paths.index_path).unwrap();
    let texts_before = std::fs::read(&paths.texts_path).unwrap();

    // The text list's temp file cannot be created
    std::fs::create_dir(dir.path().join("texts.json.tmp")).unwrap();

    let result = store
        .add(vec![vec![0.0, 1.0]], vec!["lost".to_string()])
        .await;
    assert!(matches!(result, Err(RagError::Io(_))));
    assert_eq!(store.len().await, 1);

    assert_eq!(std::fs::read(&paths.index_path).unwrap(), index_before);
    assert_eq!(std::fs::read(&paths.texts_path).unwrap(), texts_before);
    assert!(!dir.path().join("vector_index.bin.tmp").exists());

    let reopened: VectorStore = VectorStore::open(paths, 2).await.unwrap();
    assert_eq!(reopened.len().await, 1);
    assert_eq!(
        reopened.search_texts(&[0.0, 1.0], 3).await.unwrap(),
        vec!["kept".to_string()]
    );
}

#[tokio::test]
async fn test_index_ahead_of_text_list_recovers_on_open() {
    let dir = TempDir::new().unwrap();
    let retrieval = retrieval_in(&dir).await;
    retrieval
        .add_texts(vec!["The sky is blue.".to_string()])
        .await
        .unwrap();
    let texts_one = std::fs::read(dir.path().join("texts.json")).unwrap();

    retrieval
        .add_texts(vec!["Water boils at 100C.".to_string()])
        .await
        .unwrap();
    drop(retrieval);

    // Crash after the index rename, before the text list rename
    std::fs::write(dir.path().join("texts.json"), texts_one).unwrap();

    let reopened = retrieval_in(&dir).await;
    assert_eq!(reopened.store().len().await, 1);
    assert_eq!(
        reopened.retrieve("When does water boil?", 3).await.unwrap(),
        vec!["The sky is blue.".to_string()]
    );
}
