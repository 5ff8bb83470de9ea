// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Handles environment configs, storage selection, and source pool sizing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module for the Smart Insights server
//!
//! - **Environment**: Server configuration from environment variables
//! - **Database**: Pool policy for source databases
//! - **Types**: Log level, environment and storage URL types

/// Source database pool configuration
pub mod database;
/// Environment and server configuration
pub mod environment;
/// Core configuration type definitions
pub mod types;

pub use database::SourcePoolConfig;
pub use environment::{OrchestrationConfig, ServerConfig};
pub use types::{Environment, LogLevel, StorageUrl};
