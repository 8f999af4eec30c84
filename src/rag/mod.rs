// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// RAG (Retrieval-Augmented Generation) module
// Persistent passage store and query-time retrieval

pub mod errors;
pub mod retrieval;
pub mod vector_store;

pub use errors::RagError;
pub use retrieval::{RetrievalService, DEFAULT_TOP_K, MAX_TOP_K};
pub use vector_store::{StorePaths, VectorStore, INDEX_FILE_NAME, TEXTS_FILE_NAME};
