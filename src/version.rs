// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Fabstir RAG chat server

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "flat-l2-retrieval",
    "minilm-onnx-embeddings",
    "hashed-embeddings",
    "openai-compatible-completion",
    "atomic-store-persistence",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Fabstir RAG Chat {}", VERSION_NUMBER)
}
