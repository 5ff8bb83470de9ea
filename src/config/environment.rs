// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Builds the ServerConfig from environment variables and validates it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::info;

use super::database::{env_parse_or, SourcePoolConfig};
use super::types::{Environment, LogLevel, StorageUrl};
use crate::constants::{llm, orchestration, server};

/// Orchestration engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Admission limit: orchestrations allowed to run at once
    pub max_concurrent: usize,
    /// Max tokens used when an LLM config does not set one
    pub default_max_tokens: u32,
    /// How long shutdown waits for admitted runs before failing them
    pub shutdown_grace_secs: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_concurrent: orchestration::DEFAULT_MAX_CONCURRENT,
            default_max_tokens: llm::DEFAULT_MAX_TOKENS,
            shutdown_grace_secs: orchestration::SHUTDOWN_GRACE_SECS,
        }
    }
}

impl OrchestrationConfig {
    /// Shutdown grace period
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Log level
    pub log_level: LogLevel,
    /// Configuration and response storage backend
    pub storage: StorageUrl,
    /// Orchestration engine settings
    pub orchestration: OrchestrationConfig,
    /// Source database pool policy
    pub source_pool: SourcePoolConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: server::DEFAULT_HOST.to_owned(),
            http_port: server::DEFAULT_HTTP_PORT,
            environment: Environment::default(),
            log_level: LogLevel::default(),
            storage: StorageUrl::default(),
            orchestration: OrchestrationConfig::default(),
            source_pool: SourcePoolConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but malformed, or if the
    /// resulting configuration fails validation
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let http_port = env::var("HTTP_PORT")
            .or_else(|_| env::var("PORT"))
            .ok()
            .map(|port| port.trim().parse::<u16>())
            .transpose()
            .context("Invalid HTTP_PORT value")?
            .unwrap_or(server::DEFAULT_HTTP_PORT);

        let storage = StorageUrl::parse_url(
            &env::var("STORAGE_URL").unwrap_or_else(|_| server::DEFAULT_STORAGE_URL.to_owned()),
        )
        .context("Invalid STORAGE_URL value")?;

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| server::DEFAULT_HOST.to_owned()),
            http_port,
            environment: Environment::from_str_or_default(
                &env::var("ENVIRONMENT").unwrap_or_default(),
            ),
            log_level: LogLevel::from_str_or_default(
                &env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned()),
            ),
            storage,
            orchestration: OrchestrationConfig {
                max_concurrent: env_parse_or(
                    "MAX_CONCURRENT_ORCHESTRATIONS",
                    orchestration::DEFAULT_MAX_CONCURRENT,
                ),
                default_max_tokens: env_parse_or("LLM_DEFAULT_MAX_TOKENS", llm::DEFAULT_MAX_TOKENS),
                shutdown_grace_secs: env_parse_or(
                    "SHUTDOWN_GRACE_SECS",
                    orchestration::SHUTDOWN_GRACE_SECS,
                ),
            },
            source_pool: SourcePoolConfig::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.orchestration.max_concurrent == 0 {
            bail!("MAX_CONCURRENT_ORCHESTRATIONS must be at least 1");
        }
        if self.orchestration.default_max_tokens == 0 {
            bail!("LLM_DEFAULT_MAX_TOKENS must be at least 1");
        }
        if self.source_pool.max_connections == 0 {
            bail!("SOURCE_POOL_MAX_CONNECTIONS must be at least 1");
        }
        if self.source_pool.min_connections > self.source_pool.max_connections {
            bail!("SOURCE_POOL_MIN_CONNECTIONS cannot exceed SOURCE_POOL_MAX_CONNECTIONS");
        }
        Ok(())
    }

    /// Human-readable configuration summary for startup logs
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Smart Insights Configuration:\n\
             - Listen: {}:{}\n\
             - Environment: {}\n\
             - Log Level: {}\n\
             - Storage: {}\n\
             - Max Concurrent Orchestrations: {}\n\
             - Default Max Tokens: {}\n\
             - Shutdown Grace: {}s\n\
             - Source Pool: max {} / min {} connections, lifetime {}s",
            self.host,
            self.http_port,
            self.environment,
            self.log_level,
            self.storage,
            self.orchestration.max_concurrent,
            self.orchestration.default_max_tokens,
            self.orchestration.shutdown_grace_secs,
            self.source_pool.max_connections,
            self.source_pool.min_connections,
            self.source_pool.max_lifetime_secs,
        )
    }
}
