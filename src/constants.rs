// ABOUTME: Application constants grouped by domain
// ABOUTME: Service identity, orchestration limits, LLM defaults, and source pool sizing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped into small domain modules rather than one flat list.

/// Service identity used in logs and health output
pub mod service {
    /// Service name
    pub const NAME: &str = "smart-insights";
    /// Service version from Cargo metadata
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Server defaults
pub mod server {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8080;
    /// Default bind address
    pub const DEFAULT_HOST: &str = "0.0.0.0";
    /// Default storage backend
    pub const DEFAULT_STORAGE_URL: &str = "memory";
}

/// Orchestration limits and prompt parameters
pub mod orchestration {
    /// Default number of orchestrations allowed to run at once
    pub const DEFAULT_MAX_CONCURRENT: usize = 10;
    /// Seconds shutdown waits for admitted runs to finish
    pub const SHUTDOWN_GRACE_SECS: u64 = 30;
    /// Attempts made to store a run's terminal status
    pub const TERMINAL_WRITE_ATTEMPTS: u32 = 2;
    /// Pause between terminal status write attempts
    pub const TERMINAL_WRITE_RETRY_MS: u64 = 50;
    /// Error recorded on runs still in progress when the server stopped
    pub const INTERRUPTED_MESSAGE: &str = "Orchestration interrupted by server shutdown";
    /// Sampling temperature for SQL generation
    pub const SQL_TEMPERATURE: f32 = 0.3;
    /// Sampling temperature for report generation
    pub const REPORT_TEMPERATURE: f32 = 0.7;
    /// System prompt for SQL generation
    pub const SQL_SYSTEM_PROMPT: &str =
        "You are a PostgreSQL expert who generates SQL queries based on natural language questions.";
    /// System prompt for report generation
    pub const REPORT_SYSTEM_PROMPT: &str =
        "You are a data analyst who explains query results in a clear, concise way.";
}

/// LLM provider defaults
pub mod llm {
    /// Max tokens when neither the request nor the config sets one
    pub const DEFAULT_MAX_TOKENS: u32 = 3000;
    /// HTTP connect timeout for provider APIs
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    /// HTTP request timeout for provider APIs
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;
}

/// Source database pool sizing
pub mod source_pool {
    /// Max open connections per pool
    pub const MAX_CONNECTIONS: u32 = 25;
    /// Connections kept warm per pool
    pub const MIN_CONNECTIONS: u32 = 0;
    /// Idle connections are closed after this many seconds
    pub const IDLE_TIMEOUT_SECS: u64 = 600;
    /// Connections are recycled after this many seconds
    pub const MAX_LIFETIME_SECS: u64 = 3600;
    /// How long `acquire` waits for a free connection
    pub const ACQUIRE_TIMEOUT_SECS: u64 = 30;
    /// Default `sslmode` for source connections
    pub const DEFAULT_SSL_MODE: &str = "disable";
    /// Default schema introspected for prompts
    pub const DEFAULT_SCHEMA: &str = "public";
}
