// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! POST /api/chat

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use super::errors::{ApiError, ApiErrorResponse};
use super::http_server::AppState;

/// Request body for POST /api/chat
///
/// # Example
/// ```json
/// { "query": "What color is the sky?" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: Option<String>,
}

impl ChatRequest {
    /// Decode a request from an already-parsed JSON body
    ///
    /// Only a JSON object is accepted; serde's derived struct decoder would
    /// otherwise also take a positional array.
    pub fn from_json(value: Value) -> Result<Self, ApiError> {
        if !value.is_object() {
            return Err(ApiError::QueryRequired);
        }
        serde_json::from_value(value).map_err(|e| {
            debug!("Chat request body has an invalid query: {}", e);
            ApiError::QueryRequired
        })
    }

    /// Returns the query when present and non-empty
    pub fn validate(&self) -> Result<&str, ApiError> {
        match self.query.as_deref() {
            Some(query) if !query.is_empty() => Ok(query),
            _ => Err(ApiError::QueryRequired),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
}

/// Any body that is not a JSON object with a string `query` is treated the
/// same as a missing query.
pub async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiErrorResponse> {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!("Rejected chat request body: {}", rejection.body_text());
            return Err(ApiErrorResponse(ApiError::QueryRequired));
        }
    };
    let request = ChatRequest::from_json(body).map_err(ApiErrorResponse)?;

    let query = request.validate().map_err(ApiErrorResponse)?;
    info!("Chat request received ({} chars)", query.len());

    match state.chat_service.answer(query).await {
        Ok(response) => Ok(Json(ChatResponse { response })),
        Err(e) => {
            error!("Chat request failed [{}]: {}", e.error_code(), e);
            Err(ApiErrorResponse(ApiError::from(&e)))
        }
    }
}
