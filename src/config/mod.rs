// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the chatbot server and CLI

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::completion::openai::{
    CompletionConfig, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
    DEFAULT_TIMEOUT_SECS,
};
use crate::rag::{StorePaths, DEFAULT_TOP_K, MAX_TOP_K};

pub const DEFAULT_API_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 5000;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_MODEL_PATH: &str = "./models/all-MiniLM-L6-v2-onnx/model.onnx";
pub const DEFAULT_TOKENIZER_PATH: &str = "./models/all-MiniLM-L6-v2-onnx/tokenizer.json";

/// Which embedding implementation to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// all-MiniLM-L6-v2 through ONNX Runtime
    Onnx,
    /// Feature-hashing bag-of-words, no model files needed
    Hashed,
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "onnx" => Ok(EmbeddingBackend::Onnx),
            "hashed" => Ok(EmbeddingBackend::Hashed),
            other => Err(format!(
                "Unknown embedding backend '{}' (expected 'onnx' or 'hashed')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatbotConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Directory holding the persisted index and passage list
    pub data_dir: PathBuf,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_model_path: PathBuf,
    pub embedding_tokenizer_path: PathBuf,
    /// Passages retrieved per query
    pub retrieval_top_k: usize,
    pub completion: CompletionConfig,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ChatbotConfig {
    /// Load configuration from environment variables
    ///
    /// Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, String> {
        let embedding_backend = match env::var("EMBEDDING_BACKEND") {
            Ok(value) => value.parse::<EmbeddingBackend>()?,
            Err(_) => EmbeddingBackend::Onnx,
        };

        Ok(Self {
            api_host: env::var("API_HOST").unwrap_or_else(|_| DEFAULT_API_HOST.to_string()),
            api_port: env_parse("API_PORT", DEFAULT_API_PORT),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
            embedding_backend,
            embedding_model_path: env::var("EMBEDDING_MODEL_PATH")
                .unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string())
                .into(),
            embedding_tokenizer_path: env::var("EMBEDDING_TOKENIZER_PATH")
                .unwrap_or_else(|_| DEFAULT_TOKENIZER_PATH.to_string())
                .into(),
            retrieval_top_k: env_parse("RETRIEVAL_TOP_K", DEFAULT_TOP_K),
            completion: CompletionConfig {
                api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
                model: env::var("COMPLETION_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
                max_tokens: env_parse("COMPLETION_MAX_TOKENS", DEFAULT_MAX_TOKENS),
                temperature: env_parse("COMPLETION_TEMPERATURE", DEFAULT_TEMPERATURE),
                timeout: Duration::from_secs(env_parse(
                    "COMPLETION_TIMEOUT_SECS",
                    DEFAULT_TIMEOUT_SECS,
                )),
            },
        })
    }

    /// Checks everything needed to embed and retrieve (no completion calls)
    pub fn validate_retrieval(&self) -> Result<(), String> {
        if self.retrieval_top_k == 0 || self.retrieval_top_k > MAX_TOP_K {
            return Err(format!(
                "RETRIEVAL_TOP_K must be between 1 and {}",
                MAX_TOP_K
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err("DATA_DIR must not be empty".to_string());
        }
        Ok(())
    }

    /// Validate the full configuration, including the completion provider
    pub fn validate(&self) -> Result<(), String> {
        self.validate_retrieval()?;

        if self.completion.api_key.trim().is_empty() {
            return Err("OPENAI_API_KEY is required".to_string());
        }
        if self.completion.max_tokens == 0 {
            return Err("COMPLETION_MAX_TOKENS must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err("COMPLETION_TEMPERATURE must be between 0.0 and 2.0".to_string());
        }
        if self.completion.timeout.is_zero() {
            return Err("COMPLETION_TIMEOUT_SECS must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths::in_dir(&self.data_dir)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

impl Default for ChatbotConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            api_port: DEFAULT_API_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            embedding_backend: EmbeddingBackend::Onnx,
            embedding_model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            embedding_tokenizer_path: PathBuf::from(DEFAULT_TOKENIZER_PATH),
            retrieval_top_k: DEFAULT_TOP_K,
            completion: CompletionConfig::default(),
        }
    }
}
