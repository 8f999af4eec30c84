// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ChatbotConfig;
use crate::rag::MAX_TOP_K;
use crate::startup::{build_chat_service, open_retrieval};

/// Arguments for the add command
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Passage to store (repeatable)
    #[arg(long = "text")]
    pub texts: Vec<String>,

    /// File with one passage per line
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// Arguments for the query command
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Text to search for
    pub query: String,

    /// Number of passages to return (defaults to RETRIEVAL_TOP_K)
    #[arg(long, value_parser = parse_top_k)]
    pub top_k: Option<usize>,
}

/// Parses `--top-k`, accepting 1 through `MAX_TOP_K`
pub fn parse_top_k(value: &str) -> std::result::Result<usize, String> {
    let top_k: usize = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a whole number", value))?;
    if top_k == 0 || top_k > MAX_TOP_K {
        return Err(format!("must be between 1 and {}", MAX_TOP_K));
    }
    Ok(top_k)
}

/// Arguments for the ask command
#[derive(Args, Debug)]
pub struct AskArgs {
    /// Question to answer
    pub query: String,
}

/// Snapshot printed by the stats command
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub passages: usize,
    pub dimension: usize,
    pub embedder: String,
    pub index_path: PathBuf,
    pub texts_path: PathBuf,
}

/// Reads non-empty, trimmed lines from `path`
pub fn read_passages(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Embeds and stores passages; returns (added, total)
pub async fn add_passages(config: &ChatbotConfig, args: AddArgs) -> Result<(usize, usize)> {
    let mut texts = args.texts;
    if let Some(path) = &args.file {
        texts.extend(read_passages(path)?);
    }
    if texts.is_empty() {
        bail!("Nothing to add: pass --text or --file");
    }

    let retrieval = open_retrieval(config).await?;
    let added = texts.len();
    let total = retrieval.add_texts(texts).await?;

    info!("Stored {} passages in {}", added, config.data_dir.display());
    Ok((added, total))
}

pub async fn query_passages(config: &ChatbotConfig, args: QueryArgs) -> Result<Vec<String>> {
    let top_k = args.top_k.unwrap_or(config.retrieval_top_k);
    if top_k == 0 || top_k > MAX_TOP_K {
        bail!("--top-k must be between 1 and {}", MAX_TOP_K);
    }

    let retrieval = open_retrieval(config).await?;
    Ok(retrieval.retrieve(&args.query, top_k).await?)
}

pub async fn ask(config: &ChatbotConfig, args: AskArgs) -> Result<String> {
    if args.query.is_empty() {
        bail!("Query is required");
    }

    let chat_service = build_chat_service(config).await?;
    Ok(chat_service.answer(&args.query).await?)
}

pub async fn stats(config: &ChatbotConfig) -> Result<StoreStats> {
    let retrieval = open_retrieval(config).await?;
    let store = retrieval.store();

    Ok(StoreStats {
        passages: store.len().await,
        dimension: store.dimension(),
        embedder: retrieval.embedder().name().to_string(),
        index_path: store.paths().index_path.clone(),
        texts_path: store.paths().texts_path.clone(),
    })
}
