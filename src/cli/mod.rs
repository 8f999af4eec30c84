// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod commands;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ChatbotConfig;

/// Fabstir RAG chat CLI
#[derive(Parser, Debug)]
#[command(name = "rag-cli")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Manage and query the passage store of the RAG chat server", long_about = None)]
pub struct Cli {
    /// Directory holding vector_index.bin and texts.json
    #[arg(long, env = "DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed and store passages
    Add(commands::AddArgs),

    /// Print the passages closest to a query
    Query(commands::QueryArgs),

    /// Answer a question using stored passages and the completion API
    Ask(commands::AskArgs),

    /// Show store size, dimension and file locations
    Stats,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let mut config = ChatbotConfig::from_env().map_err(|e| anyhow!(e))?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    config.validate_retrieval().map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Add(args) => {
            let (added, total) = commands::add_passages(&config, args).await?;
            println!("Added {} passages (store now holds {})", added, total);
        }
        Commands::Query(args) => {
            let passages = commands::query_passages(&config, args).await?;
            if passages.is_empty() {
                println!("No passages stored");
            }
            for (rank, passage) in passages.iter().enumerate() {
                println!("{}. {}", rank + 1, passage);
            }
        }
        Commands::Ask(args) => {
            println!("{}", commands::ask(&config, args).await?);
        }
        Commands::Stats => {
            let stats = commands::stats(&config).await?;
            println!("Passages:  {}", stats.passages);
            println!("Dimension: {}", stats.dimension);
            println!("Embedder:  {}", stats.embedder);
            println!("Index:     {}", stats.index_path.display());
            println!("Texts:     {}", stats.texts_path.display());
        }
    }

    Ok(())
}
