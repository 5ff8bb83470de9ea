// ABOUTME: Connection pool sizing for source databases resolved by the source registry
// ABOUTME: Loads bounded max-open, idle reaping and lifetime settings from the environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::constants::source_pool;

/// Pool policy applied to every source database pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePoolConfig {
    /// Maximum number of open connections in a pool
    pub max_connections: u32,
    /// Connections kept open even when idle
    pub min_connections: u32,
    /// Idle connections above `min_connections` are closed after this many seconds
    pub idle_timeout_secs: u64,
    /// Connections are recycled after this many seconds
    pub max_lifetime_secs: u64,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
}

impl Default for SourcePoolConfig {
    fn default() -> Self {
        Self {
            max_connections: source_pool::MAX_CONNECTIONS,
            min_connections: source_pool::MIN_CONNECTIONS,
            idle_timeout_secs: source_pool::IDLE_TIMEOUT_SECS,
            max_lifetime_secs: source_pool::MAX_LIFETIME_SECS,
            acquire_timeout_secs: source_pool::ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl SourcePoolConfig {
    /// Load pool configuration from environment (or defaults)
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_connections: env_parse_or(
                "SOURCE_POOL_MAX_CONNECTIONS",
                source_pool::MAX_CONNECTIONS,
            ),
            min_connections: env_parse_or(
                "SOURCE_POOL_MIN_CONNECTIONS",
                source_pool::MIN_CONNECTIONS,
            ),
            idle_timeout_secs: env_parse_or(
                "SOURCE_POOL_IDLE_TIMEOUT_SECS",
                source_pool::IDLE_TIMEOUT_SECS,
            ),
            max_lifetime_secs: env_parse_or(
                "SOURCE_POOL_MAX_LIFETIME_SECS",
                source_pool::MAX_LIFETIME_SECS,
            ),
            acquire_timeout_secs: env_parse_or(
                "SOURCE_POOL_ACQUIRE_TIMEOUT_SECS",
                source_pool::ACQUIRE_TIMEOUT_SECS,
            ),
        }
    }

    /// Idle timeout as a `Duration`
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Max lifetime as a `Duration`
    #[must_use]
    pub const fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    /// Acquire timeout as a `Duration`
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Read and parse an environment variable, falling back on absence or parse failure
pub(crate) fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
