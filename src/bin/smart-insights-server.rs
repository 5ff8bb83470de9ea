// ABOUTME: Server binary for the Smart Insights question-answering API
// ABOUTME: Loads configuration from the environment, applies CLI overrides and serves HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Smart Insights Server Binary
//!
//! Starts the HTTP API that turns natural-language questions into SQL,
//! runs them against registered databases and writes markdown reports.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use smart_insights::{
    config::{ServerConfig, StorageUrl},
    logging,
    server::{self, ServerResources},
};
use tracing::info;

#[derive(Parser)]
#[command(name = "smart-insights-server")]
#[command(about = "Smart Insights - ask questions about your database in natural language")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override storage backend (`memory`, `sqlite:./insights.db`, `sqlite::memory:`)
    #[arg(long)]
    storage_url: Option<String>,

    /// Override the number of orchestrations allowed to run at once
    #[arg(long)]
    max_concurrent: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(storage_url) = args.storage_url {
        config.storage = StorageUrl::parse_url(&storage_url)
            .with_context(|| format!("invalid --storage-url '{storage_url}'"))?;
    }
    if let Some(max_concurrent) = args.max_concurrent {
        config.orchestration.max_concurrent = max_concurrent;
    }
    config.validate()?;

    logging::init_from_env()?;
    info!("Starting Smart Insights server");
    info!("{}", config.summary());

    let resources = Arc::new(ServerResources::new(config).await?);
    server::serve(resources).await
}
