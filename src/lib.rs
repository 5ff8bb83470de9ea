// ABOUTME: Main library entry point for the Smart Insights orchestration engine
// ABOUTME: Answers natural-language questions with LLM-generated SQL and LLM-written reports
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Smart Insights
//!
//! Ask a question about a registered database in plain language and poll for
//! the answer. Each accepted question becomes one background orchestration:
//!
//! 1. introspect the database schema
//! 2. ask an LLM for a read-only SQL query
//! 3. run the query
//! 4. ask the LLM to explain the rows as a markdown report
//!
//! Progress is appended to a response log that callers poll over HTTP.
//!
//! ## Architecture
//!
//! - **Admission**: bounds how many orchestrations run at once
//! - **LLM**: provider trait, `OpenAI`/Anthropic/Gemini/Bedrock clients and the registry
//! - **Sources**: connector trait, `PostgreSQL` driver and the pooling registry
//! - **Orchestrator**: the step pipeline and its failure policy
//! - **Storage**: configuration and response stores (memory or `SQLite`)
//! - **Routes/Server**: the axum HTTP layer
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use smart_insights::config::ServerConfig;
//! use smart_insights::server::{serve, ServerResources};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let resources = Arc::new(ServerResources::new(config).await?);
//!     serve(resources).await
//! }
//! ```

/// Bounded concurrency gate for orchestrations
pub mod admission;

/// Environment-driven configuration
pub mod config;

/// Application constants
pub mod constants;

/// Unified error handling
pub mod errors;

/// LLM providers and their registry
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Assistant and configuration data model
pub mod models;

/// Question-to-report pipeline
pub mod orchestrator;

/// Prompt templates, tag extraction and query screening
pub mod prompt;

/// Per-request progress log
pub mod response_log;

/// HTTP route handlers
pub mod routes;

/// Server assembly and lifecycle
pub mod server;

/// Domain services used by the HTTP layer
pub mod services;

/// Source database connectors and pooling
pub mod sources;

/// Configuration and response persistence
pub mod storage;
