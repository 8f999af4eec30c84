// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use fabstir_rag_chat::{
    api::{start_server, AppState},
    config::ChatbotConfig,
    startup::build_chat_service,
    version,
};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    tracing::info!("Starting {}", version::get_version_string());

    let config = ChatbotConfig::from_env().map_err(|e| anyhow!(e))?;
    let chat_service = build_chat_service(&config).await?;

    let passages = chat_service.retrieval().store().len().await;
    tracing::info!(
        "Loaded {} passages from {} (top_k={})",
        passages,
        config.data_dir.display(),
        config.retrieval_top_k
    );
    if passages == 0 {
        tracing::warn!("Passage store is empty, add passages with rag-cli");
    }

    start_server(AppState::new(chat_service), &config.listen_addr()).await
}
