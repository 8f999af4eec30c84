// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! OpenAiCompletionProvider against a local fake chat-completions server

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use fabstir_rag_chat::completion::{
    CompletionConfig, CompletionError, CompletionProvider, OpenAiCompletionProvider,
};
use serde_json::{json, Value};
use std::time::Duration;

/// Serves `router` on an ephemeral port and returns its `/v1` base URL
async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

fn provider_for(base_url: String, timeout: Duration) -> OpenAiCompletionProvider {
    OpenAiCompletionProvider::new(CompletionConfig {
        api_key: "sk-test".to_string(),
        base_url,
        timeout,
        ..Default::default()
    })
    .unwrap()
}

async fn complete_against(router: Router) -> Result<String, CompletionError> {
    let base_url = spawn_upstream(router).await;
    provider_for(base_url, Duration::from_secs(5))
        .complete("You are an intelligent assistant.", "Context:\nx\n\nUser: hi\nAI:")
        .await
}

fn respond_with(status: StatusCode, body: &'static str) -> Router {
    Router::new().route(
        "/v1/chat/completions",
        post(move || async move { (status, body) }),
    )
}

#[tokio::test]
async fn test_successful_completion_is_trimmed() {
    async fn handler(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            == Some("Bearer sk-test");
        let well_formed = body["model"] == "gpt-3.5-turbo"
            && body["max_tokens"] == 150
            && body["messages"][0]["role"] == "system"
            && body["messages"][0]["content"] == "You are an intelligent assistant."
            && body["messages"][1]["role"] == "user";

        if !authorized || !well_formed {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "bad request" })));
        }

        (
            StatusCode::OK,
            Json(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "\n  The sky is blue.  \n" } }
                ],
                "usage": { "prompt_tokens": 20, "completion_tokens": 5 }
            })),
        )
    }

    let router = Router::new().route("/v1/chat/completions", post(handler));
    let answer = complete_against(router).await.unwrap();

    assert_eq!(answer, "The sky is blue.");
}

#[tokio::test]
async fn test_unauthorized_and_forbidden() {
    for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
        let result = complete_against(respond_with(status, "invalid key")).await;
        assert!(
            matches!(result, Err(CompletionError::Unauthorized)),
            "{} should map to Unauthorized",
            status
        );
    }
}

#[tokio::test]
async fn test_rate_limited_reads_retry_after() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, "7")],
                "slow down",
            )
        }),
    );

    let result = complete_against(router).await;
    assert!(matches!(
        result,
        Err(CompletionError::RateLimited {
            retry_after_secs: Some(7)
        })
    ));
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let result = complete_against(respond_with(
        StatusCode::INTERNAL_SERVER_ERROR,
        "model overloaded",
    ))
    .await;

    match result {
        Err(CompletionError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "model overloaded");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_choices_is_malformed() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(json!({ "choices": [] })) }),
    );

    let result = complete_against(router).await;
    assert!(matches!(result, Err(CompletionError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_non_json_success_is_malformed() {
    let result = complete_against(respond_with(StatusCode::OK, "<html>oops</html>")).await;
    assert!(matches!(result, Err(CompletionError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({ "choices": [{ "message": { "content": "late" } }] }))
        }),
    );
    let base_url = spawn_upstream(router).await;

    let result = provider_for(base_url, Duration::from_millis(200))
        .complete("system", "user")
        .await;

    match result {
        Err(e) => assert!(e.is_timeout(), "expected timeout, got {:?}", e),
        Ok(answer) => panic!("expected timeout, got answer {:?}", answer),
    }
}
