// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Downstream failures surface as distinct 5xx kinds

use axum::http::StatusCode;
use fabstir_rag_chat::completion::CompletionError;
use std::sync::Arc;
use tempfile::TempDir;

use super::helpers::{
    app_with, chat_request, hashed_embedder, json_body, send, FakeCompletion, OfflineEmbedder,
    WrongDimensionEmbedder,
};

async fn assert_failure(
    app: axum::Router,
    expected_status: StatusCode,
    expected_type: &str,
) -> serde_json::Value {
    let response = send(app, chat_request(r#"{"query": "What color is the sky?"}"#)).await;
    assert_eq!(response.status(), expected_status);

    let body = json_body(response).await;
    assert_eq!(body["errorType"], expected_type);
    assert!(body["error"].is_string());
    body
}

#[tokio::test]
async fn test_embedding_failure_is_503() {
    let dir = TempDir::new().unwrap();
    let completion = Arc::new(FakeCompletion::replying("unused"));
    let (app, _ingest) = app_with(&dir, Arc::new(OfflineEmbedder), completion.clone());

    let body = assert_failure(app, StatusCode::SERVICE_UNAVAILABLE, "embedding_unavailable").await;

    assert!(!body["error"].as_str().unwrap().contains("model offline"));
    assert!(completion.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_completion_timeout_is_504() {
    let dir = TempDir::new().unwrap();
    let (app, _ingest) = app_with(
        &dir,
        hashed_embedder(),
        Arc::new(FakeCompletion::failing(|| CompletionError::Timeout {
            timeout_secs: 60,
        })),
    );

    assert_failure(app, StatusCode::GATEWAY_TIMEOUT, "completion_timeout").await;
}

#[tokio::test]
async fn test_completion_failures_are_502() {
    let failures: [fn() -> CompletionError; 5] = [
        || CompletionError::Unauthorized,
        || CompletionError::RateLimited {
            retry_after_secs: Some(20),
        },
        || CompletionError::Api {
            status: 500,
            message: "upstream stack trace".to_string(),
        },
        || CompletionError::Transport("connection reset".to_string()),
        || CompletionError::MalformedResponse("no choices".to_string()),
    ];

    for failure in failures {
        let dir = TempDir::new().unwrap();
        let (app, _ingest) = app_with(
            &dir,
            hashed_embedder(),
            Arc::new(FakeCompletion::failing(failure)),
        );

        let body = assert_failure(app, StatusCode::BAD_GATEWAY, "completion_provider_error").await;
        assert!(!body["error"].as_str().unwrap().contains("upstream stack trace"));
    }
}

#[tokio::test]
async fn test_store_error_is_500() {
    let dir = TempDir::new().unwrap();
    let (app, _ingest) = app_with(
        &dir,
        Arc::new(WrongDimensionEmbedder),
        Arc::new(FakeCompletion::replying("unused")),
    );

    assert_failure(app, StatusCode::INTERNAL_SERVER_ERROR, "internal_error").await;
}
