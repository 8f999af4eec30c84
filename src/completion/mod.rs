// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Hosted language-model completion

pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::{CompletionConfig, OpenAiCompletionProvider};

/// Errors that can occur while requesting a completion
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Request did not finish within the client timeout
    #[error("Completion timeout after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// API key missing, invalid or lacking access
    #[error("Completion provider rejected credentials")]
    Unauthorized,

    /// Rate limited or out of quota
    #[error("Completion provider rate limited the request")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Non-success HTTP status from the provider
    #[error("Completion API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Connection-level failure before a response arrived
    #[error("Completion transport error: {0}")]
    Transport(String),

    /// Response arrived but did not contain a usable completion
    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    /// Get error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            CompletionError::Timeout { .. } => "COMPLETION_TIMEOUT",
            CompletionError::Unauthorized => "COMPLETION_UNAUTHORIZED",
            CompletionError::RateLimited { .. } => "COMPLETION_RATE_LIMITED",
            CompletionError::Api { .. } => "COMPLETION_API_ERROR",
            CompletionError::Transport(_) => "COMPLETION_TRANSPORT",
            CompletionError::MalformedResponse(_) => "COMPLETION_MALFORMED_RESPONSE",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CompletionError::Timeout { .. })
    }
}

/// Trait for hosted completion backends
///
/// One call sends a system prompt and a user prompt and returns the generated
/// text with surrounding whitespace removed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
