// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chat::ChatError;
use crate::rag::RagError;

/// Body of every 400 from `/api/chat`
pub const QUERY_REQUIRED: &str = "Query is required";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(
        rename = "errorType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    QueryRequired,
    EmbeddingUnavailable,
    CompletionTimeout,
    CompletionProvider,
    InternalError,
}

impl ApiError {
    /// Machine-readable kind reported as `errorType`
    ///
    /// Client errors carry no kind so the 400 body stays `{"error": ...}`.
    pub fn error_type(&self) -> Option<&'static str> {
        match self {
            ApiError::QueryRequired => None,
            ApiError::EmbeddingUnavailable => Some("embedding_unavailable"),
            ApiError::CompletionTimeout => Some("completion_timeout"),
            ApiError::CompletionProvider => Some("completion_provider_error"),
            ApiError::InternalError => Some("internal_error"),
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            error_type: self.error_type().map(str::to_string),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::QueryRequired => 400,
            ApiError::InternalError => 500,
            ApiError::CompletionProvider => 502,
            ApiError::EmbeddingUnavailable => 503,
            ApiError::CompletionTimeout => 504,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::QueryRequired => write!(f, "{}", QUERY_REQUIRED),
            ApiError::EmbeddingUnavailable => write!(f, "Embedding service unavailable"),
            ApiError::CompletionTimeout => write!(f, "Completion provider timed out"),
            ApiError::CompletionProvider => write!(f, "Completion provider request failed"),
            ApiError::InternalError => write!(f, "Internal server error"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<&ChatError> for ApiError {
    fn from(error: &ChatError) -> Self {
        match error {
            ChatError::Retrieval(RagError::Embedding(_)) => ApiError::EmbeddingUnavailable,
            ChatError::Retrieval(_) => ApiError::InternalError,
            ChatError::Completion(e) if e.is_timeout() => ApiError::CompletionTimeout,
            ChatError::Completion(_) => ApiError::CompletionProvider,
        }
    }
}

// Error response wrapper
pub struct ApiErrorResponse(pub ApiError);

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(self.0.to_response())).into_response()
    }
}
