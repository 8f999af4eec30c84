// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod chat;
pub mod cli;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod rag;
pub mod startup;
pub mod vector;
pub mod version;

pub use chat::{ChatError, ChatService};
pub use config::ChatbotConfig;
pub use rag::{RagError, RetrievalService, VectorStore};
